//! Filter expressions, sorting and queries.
//!
//! The mapper never evaluates filters itself. It hands them to the backend, which either
//! translates them (MongoDB) or evaluates them (in-memory) through a [`FilterVisitor`]. The
//! mapper only inspects filters to seed upserts ([`Filter::equality_terms`]) and to map the
//! primary key field onto the store's identity field ([`Filter::rename_field`]).
//!
//! ```ignore
//! use docmap::filter::{Field, Filter, Query, SortDirection};
//!
//! let recent = Field::new("age").gte(18).and(Field::new("status").eq("active"));
//! let query = Query::builder()
//!     .filter(recent)
//!     .sort("age", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document as BsonDocument};

use crate::error::DocumentStoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Sort specification: which field to order by and in which direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. On array fields, matches when any element is equal.
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Equal to any value of the given array.
    In,
    /// Equal to none of the values of the given array.
    Nin,
}

/// A filter expression selecting documents of a collection.
///
/// [`Filter::All`] (the default) matches every document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    /// Logical AND of multiple filters (all must match).
    And(Vec<Filter>),
    /// Logical OR of multiple filters (any must match).
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
    /// Checks whether a field exists.
    Exists(String, bool),
    /// Field comparison.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Filter::All
    }

    /// Creates a field comparison.
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Filter::Field { field: field.into(), op, value: value.into() }
    }

    /// Combines this filter with another using logical AND.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut list), other) => {
                list.push(other);
                Filter::And(list)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    /// Combines this filter with another using logical OR.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut list) => {
                list.push(other);
                Filter::Or(list)
            }
            this => Filter::Or(vec![this, other]),
        }
    }

    /// Negates this filter.
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Returns the `field == value` terms that every matching document must satisfy.
    ///
    /// Only top-level equality comparisons and those nested in `And` qualify. The result seeds
    /// the document created by an upsert.
    pub fn equality_terms(&self) -> BsonDocument {
        let mut terms = BsonDocument::new();
        self.collect_equality_terms(&mut terms);
        terms
    }

    fn collect_equality_terms(&self, terms: &mut BsonDocument) {
        match self {
            Filter::Field { field, op: FieldOp::Eq, value } => {
                terms.insert(field.clone(), value.clone());
            }
            Filter::And(filters) => {
                for filter in filters {
                    filter.collect_equality_terms(terms);
                }
            }
            _ => {}
        }
    }

    /// Renames every reference to `from` into `to`.
    pub fn rename_field(self, from: &str, to: &str) -> Self {
        let rename = |name: String| if name == from { to.to_string() } else { name };

        match self {
            Filter::All => Filter::All,
            Filter::And(filters) => Filter::And(
                filters
                    .into_iter()
                    .map(|f| f.rename_field(from, to))
                    .collect(),
            ),
            Filter::Or(filters) => Filter::Or(
                filters
                    .into_iter()
                    .map(|f| f.rename_field(from, to))
                    .collect(),
            ),
            Filter::Not(filter) => Filter::Not(Box::new(filter.rename_field(from, to))),
            Filter::Exists(field, should_exist) => Filter::Exists(rename(field), should_exist),
            Filter::Field { field, op, value } => Filter::Field { field: rename(field), op, value },
        }
    }
}

/// Fluent builder for comparisons on a single field.
///
/// ```ignore
/// let adults = Field::new("age").gte(18);
/// let tagged = Field::new("tags").any_of(vec!["red", "blue"]);
/// ```
#[derive(Debug, Clone)]
pub struct Field(String);

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field(name.into())
    }

    pub fn eq(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Gte, value)
    }

    pub fn lt(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Bson>) -> Filter {
        Filter::field(self.0, FieldOp::Lte, value)
    }

    /// Matches when the field equals any of `values`.
    pub fn any_of<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::field(
            self.0,
            FieldOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches when the field equals none of `values`.
    pub fn none_of<V: Into<Bson>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::field(
            self.0,
            FieldOp::Nin,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn exists(self) -> Filter {
        Filter::Exists(self.0, true)
    }

    pub fn not_exists(self) -> Filter {
        Filter::Exists(self.0, false)
    }
}

/// A filter plus sorting and windowing, used by `find`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Filter selecting the documents.
    pub filter: Filter,
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl Query {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Query { filter, ..Query::default() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor over [`Filter`] trees, implemented by backends to evaluate or translate filters.
pub trait FilterVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error>;
    fn visit_and(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        match filter {
            Filter::All => self.visit_all(),
            Filter::And(filters) => self.visit_and(filters),
            Filter::Or(filters) => self.visit_or(filters),
            Filter::Not(filter) => self.visit_not(filter),
            Filter::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Filter::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}
