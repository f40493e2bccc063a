//! Filter evaluation, ordering and projection for in-memory documents.
//!
//! Matching follows the document store's rules: numbers compare by value regardless of their
//! BSON type, an equality against an array field matches when any element is equal, and a
//! missing field equals `null`.

use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docmap_core::{
    document::STORE_KEY_FIELD,
    error::DocumentStoreError,
    filter::{FieldOp, Filter, FilterVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.sort_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates a [`Filter`] against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn matches(document: &'a BsonDocument, filter: &Filter) -> Result<bool, DocumentStoreError> {
        DocumentEvaluator::new(document).visit(filter)
    }

    fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
        let expected = Comparable::from(value);

        match field_value {
            None => expected == Comparable::Null,
            Some(field_value) => match Comparable::from(field_value) {
                Comparable::Array(items) => {
                    items.iter().any(|item| item == &expected)
                        || Comparable::Array(items) == expected
                }
                actual => actual == expected,
            },
        }
    }

    fn compares(field_value: &Bson, value: &Bson, accept: fn(Ordering) -> bool) -> bool {
        let expected = Comparable::from(value);
        let check = |actual: &Comparable<'_>| actual.partial_cmp(&expected).is_some_and(accept);

        match Comparable::from(field_value) {
            Comparable::Array(items) => items.iter().any(check),
            actual => check(&actual),
        }
    }

    fn any_of(field_value: Option<&Bson>, values: &Bson) -> Result<bool, DocumentStoreError> {
        match values {
            Bson::Array(values) => Ok(values.iter().any(|value| Self::equals(field_value, value))),
            other => Err(DocumentStoreError::Backend(format!(
                "$in/$nin expects an array of values, got {other}"
            ))),
        }
    }
}

impl FilterVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(true)
    }

    fn visit_and(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        for filter in filters {
            if !self.visit(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        for filter in filters {
            if self.visit(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit(filter)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.document.contains_key(field) == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = self.document.get(field);

        Ok(match op {
            FieldOp::Eq => Self::equals(field_value, value),
            FieldOp::Ne => !Self::equals(field_value, value),
            FieldOp::In => Self::any_of(field_value, value)?,
            FieldOp::Nin => !Self::any_of(field_value, value)?,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let accept: fn(Ordering) -> bool = match op {
                    FieldOp::Gt => Ordering::is_gt,
                    FieldOp::Gte => Ordering::is_ge,
                    FieldOp::Lt => Ordering::is_lt,
                    _ => Ordering::is_le,
                };

                field_value.is_some_and(|field_value| Self::compares(field_value, value, accept))
            }
        })
    }
}

/// Compares two documents on the sort field. A missing field sorts as `null`.
pub(crate) fn compare_documents(left: &BsonDocument, right: &BsonDocument, sort: &Sort) -> Ordering {
    let left = left.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.get(&sort.field).map(Comparable::from).unwrap_or(Comparable::Null);

    match sort.direction {
        SortDirection::Asc => left.sort_cmp(&right),
        SortDirection::Desc => right.sort_cmp(&left),
    }
}

/// Keeps the identity field and the listed fields.
pub(crate) fn project(document: BsonDocument, fields: Option<&[String]>) -> BsonDocument {
    match fields {
        None => document,
        Some(fields) => document
            .into_iter()
            .filter(|(name, _)| name == STORE_KEY_FIELD || fields.iter().any(|field| field == name))
            .collect(),
    }
}
