//! Translation of docmap filters, sorts and projections into MongoDB syntax.

use bson::{Bson, Document, doc};

use docmap_core::{
    document::STORE_KEY_FIELD,
    error::DocumentStoreError,
    filter::{FieldOp, Filter, FilterVisitor, Sort, SortDirection},
};

/// Translates docmap filters into MongoDB query documents.
pub(crate) struct MongoFilterTranslator;

impl MongoFilterTranslator {
    pub fn translate(filter: &Filter) -> Result<Document, DocumentStoreError> {
        MongoFilterTranslator.visit(filter)
    }

    fn translate_all(&mut self, filters: &[Filter]) -> Result<Vec<Document>, DocumentStoreError> {
        filters.iter().map(|filter| self.visit(filter)).collect()
    }
}

impl FilterVisitor for MongoFilterTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_all(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(doc! {})
    }

    fn visit_and(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        if filters.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! { "$and": self.translate_all(filters)? })
    }

    fn visit_or(&mut self, filters: &[Filter]) -> Result<Self::Output, Self::Error> {
        // An empty disjunction matches nothing, and every document has an identity.
        if filters.is_empty() {
            return Ok(doc! { STORE_KEY_FIELD: { "$exists": false } });
        }

        Ok(doc! { "$or": self.translate_all(filters)? })
    }

    fn visit_not(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$nor": [self.visit(filter)?] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::In | FieldOp::Nin => {
                if !matches!(value, Bson::Array(_)) {
                    return Err(DocumentStoreError::Backend(format!(
                        "$in/$nin expects an array of values, got {value}"
                    )));
                }

                let name = if op == FieldOp::In { "$in" } else { "$nin" };
                doc! { name: value }
            }
        };

        Ok(doc! { field: condition })
    }
}

pub(crate) fn sort_document(sort: &Sort) -> Document {
    doc! {
        sort.field.as_str(): match sort.direction {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Inclusion projection. The identity field is returned by the server regardless.
pub(crate) fn projection_document(fields: &[String]) -> Document {
    fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect()
}
