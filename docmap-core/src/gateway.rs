//! Adapter between mapper-level requests and backend calls.
//!
//! The gateway owns the field mapping between models and the store: a document's primary key
//! field is stored under [`STORE_KEY_FIELD`]. Filters, updates, sorts and projections given in
//! model field names are renamed on the way in, and documents are renamed back on the way out.
//! Every backend round trip issued through the gateway emits one `debug` record.

use bson::{Bson, Document as BsonDocument};
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::{
    backend::{DocumentStream, FindAndModifyRequest, StoreBackend, execute_write},
    bulk::WriteOp,
    document::STORE_KEY_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{Field, Filter, Query, Sort},
    result::WriteResult,
    update::{UpdateExpr, UpdateOptions},
};

/// Routes the requests of one collection to a backend.
#[derive(Debug)]
pub struct StoreGateway<'a, B: StoreBackend> {
    collection: &'static str,
    key_field: &'static str,
    backend: &'a B,
}

impl<'a, B: StoreBackend> StoreGateway<'a, B> {
    pub fn new(collection: &'static str, key_field: &'static str, backend: &'a B) -> Self {
        Self { collection, key_field, backend }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn key_field(&self) -> &'static str {
        self.key_field
    }

    pub fn backend(&self) -> &'a B {
        self.backend
    }

    /// Filter selecting the document whose primary key is `key`, in model field names.
    pub fn key_filter(&self, key: Bson) -> Filter {
        Field::new(self.key_field).eq(key)
    }

    pub fn insert_op(&self, fields: BsonDocument) -> WriteOp {
        WriteOp::Insert(to_store(fields, self.key_field))
    }

    /// Replace-by-primary-key with upsert.
    pub fn save_op(&self, key: Bson, fields: BsonDocument) -> WriteOp {
        WriteOp::Replace {
            filter: self.map_filter(self.key_filter(key)),
            document: to_store(fields, self.key_field),
            upsert: true,
        }
    }

    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdate`] if `update` sets no field.
    pub fn update_op(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
    ) -> DocumentStoreResult<WriteOp> {
        if update.is_empty() {
            return Err(DocumentStoreError::InvalidUpdate(format!(
                "empty update expression for collection {}",
                self.collection
            )));
        }

        Ok(WriteOp::Update {
            filter: self.map_filter(filter),
            update: self.map_update(update),
            options,
        })
    }

    pub fn remove_op(&self, filter: Filter, multi: bool) -> WriteOp {
        WriteOp::Remove { filter: self.map_filter(filter), multi }
    }

    /// Executes one write immediately.
    pub async fn execute(&self, operation: WriteOp) -> DocumentStoreResult<WriteResult> {
        let kind = operation.kind();
        let result = execute_write(self.backend, operation, self.collection).await?;

        debug!(
            collection = self.collection,
            operation = kind,
            inserted = result.inserted,
            matched = result.matched,
            modified = result.modified,
            removed = result.removed,
            upserted = result.upserted_ids.len(),
            "Write executed"
        );

        Ok(result)
    }

    /// Sends a batch of writes, in order, through the backend's bulk path.
    pub async fn flush(&self, operations: Vec<WriteOp>) -> DocumentStoreResult<WriteResult> {
        let count = operations.len();
        let result = self.backend.bulk_write(operations, self.collection).await?;

        debug!(
            collection = self.collection,
            operations = count,
            inserted = result.inserted,
            matched = result.matched,
            modified = result.modified,
            removed = result.removed,
            "Bulk flush completed"
        );

        Ok(result)
    }

    pub async fn count(&self, filter: Filter) -> DocumentStoreResult<u64> {
        let count = self
            .backend
            .count_documents(self.map_filter(filter), self.collection)
            .await?;

        debug!(collection = self.collection, count, "Count executed");
        Ok(count)
    }

    /// Returns the matching documents in model field names.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<DocumentStream> {
        let query = Query {
            filter: self.map_filter(query.filter),
            sort: query.sort.map(|sort| self.map_sort(sort)),
            ..query
        };

        debug!(
            collection = self.collection,
            limit = ?query.limit,
            offset = ?query.offset,
            "Find issued"
        );

        let key_field = self.key_field;
        let stream = self
            .backend
            .find_documents(query, self.collection)
            .await?
            .map_ok(move |document| from_store(document, key_field));

        Ok(stream.boxed())
    }

    /// Loads the document whose primary key is `key`.
    pub async fn find_by_key(&self, key: Bson) -> DocumentStoreResult<Option<BsonDocument>> {
        let query = Query {
            filter: self.key_filter(key),
            limit: Some(1),
            ..Query::default()
        };

        self.find(query).await?.try_next().await
    }

    /// Runs a find-and-modify whose request uses model field names.
    pub async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let request = FindAndModifyRequest {
            filter: self.map_filter(request.filter),
            update: self.map_update(request.update),
            sort: request.sort.map(|sort| self.map_sort(sort)),
            fields: request.fields.map(|fields| {
                fields
                    .into_iter()
                    .map(|field| self.map_field(field))
                    .collect()
            }),
            ..request
        };

        let remove = request.remove;
        let upsert = request.upsert;
        let document = self
            .backend
            .find_and_modify(request, self.collection)
            .await?;

        debug!(
            collection = self.collection,
            remove,
            upsert,
            found = document.is_some(),
            "Find and modify executed"
        );

        Ok(document.map(|document| from_store(document, self.key_field)))
    }

    fn map_field(&self, field: String) -> String {
        if field == self.key_field {
            STORE_KEY_FIELD.to_string()
        } else {
            field
        }
    }

    fn map_filter(&self, filter: Filter) -> Filter {
        filter.rename_field(self.key_field, STORE_KEY_FIELD)
    }

    fn map_update(&self, update: UpdateExpr) -> UpdateExpr {
        update.rename_field(self.key_field, STORE_KEY_FIELD)
    }

    fn map_sort(&self, sort: Sort) -> Sort {
        Sort { field: self.map_field(sort.field), ..sort }
    }
}

/// Renames the primary key field of `fields` into the store identity field, placing it first.
pub fn to_store(mut fields: BsonDocument, key_field: &str) -> BsonDocument {
    if key_field == STORE_KEY_FIELD {
        return fields;
    }

    match fields.remove(key_field) {
        Some(key) => {
            let mut document = BsonDocument::new();
            document.insert(STORE_KEY_FIELD, key);
            document.extend(fields);
            document
        }
        None => fields,
    }
}

/// Renames the store identity field of `document` back into the primary key field.
pub fn from_store(mut document: BsonDocument, key_field: &str) -> BsonDocument {
    if key_field == STORE_KEY_FIELD {
        return document;
    }

    if let Some(key) = document.remove(STORE_KEY_FIELD) {
        document.insert(key_field, key);
    }
    document
}
