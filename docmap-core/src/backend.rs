//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the capability the mapper consumes: execute inserts, updates,
//! replacements, removes, find-and-modify, finds and counts against a named collection, and
//! return a structured result or a store error. Backends receive store-level documents: the
//! primary key is already stored under [`STORE_KEY_FIELD`](crate::document::STORE_KEY_FIELD)
//! and every filter and update refers to store field names.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the core trait for storage backends
//! - [`DynStoreBackend`]: object-safe mirror of `StoreBackend` for runtime backend selection
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Atomicity
//!
//! `update_documents` with `multi = false`, `replace_document` and `find_and_modify` must each
//! run as one indivisible operation on the store side. Multi-document updates and removes need
//! not be atomic across documents.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use futures::stream::BoxStream;
use std::{any::Any, fmt::Debug, mem};

use crate::{
    bulk::WriteOp,
    error::DocumentStoreResult,
    filter::{Filter, Query, Sort},
    result::{InsertResult, RemoveResult, UpdateResult, WriteResult},
    update::{UpdateExpr, UpdateOptions},
};

/// A lazy, finite stream of store documents.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<BsonDocument>>;

/// Store-level find-and-modify parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyRequest {
    /// Selects the candidate documents.
    pub filter: Filter,
    /// Applied to the selected document unless `remove` is set. An empty expression leaves
    /// the document untouched.
    pub update: UpdateExpr,
    /// Picks the first candidate in this order.
    pub sort: Option<Sort>,
    /// Restricts the returned fields. The identity field is always returned.
    pub fields: Option<Vec<String>>,
    /// Return the post-update state instead of the pre-update state.
    pub return_new: bool,
    /// Delete the selected document and return its pre-deletion state.
    pub remove: bool,
    /// Insert a document seeded from the filter's equality terms when nothing matches.
    pub upsert: bool,
}

/// Abstract interface for document storage backends.
///
/// All implementations must be thread-safe. Every method is one logical store round trip,
/// except [`bulk_write`](StoreBackend::bulk_write) whose default implementation issues one
/// round trip per group of operations.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::WriteConflict`](crate::error::DocumentStoreError::WriteConflict)
    /// if a document with the same identity already exists.
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<InsertResult>;

    /// Applies an atomic update to the first match (`multi = false`) or to every match.
    ///
    /// With `upsert` and no match, inserts a document built from the filter's equality terms
    /// with the update applied to it.
    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Replaces the first document matching `filter` with `replacement`, keeping its identity.
    ///
    /// With `upsert` and no match, inserts `replacement`.
    async fn replace_document(
        &self,
        filter: Filter,
        replacement: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Removes the first match (`multi = false`) or every match. Removing nothing is not an error.
    async fn remove_documents(
        &self,
        filter: Filter,
        multi: bool,
        collection: &str,
    ) -> DocumentStoreResult<RemoveResult>;

    /// Selects, then updates or removes, one document as a single indivisible operation.
    ///
    /// Returns `None` when nothing matched and nothing was upserted.
    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Returns the documents matching `query` as a lazy stream.
    async fn find_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream>;

    /// Counts the documents matching `filter`.
    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64>;

    /// Executes buffered operations in order.
    ///
    /// The default implementation sends each run of consecutive inserts as one
    /// `insert_documents` call and every other operation on its own. Execution stops at the
    /// first error. Operations already executed stay applied.
    async fn bulk_write(
        &self,
        operations: Vec<WriteOp>,
        collection: &str,
    ) -> DocumentStoreResult<WriteResult> {
        let mut result = WriteResult::default();
        let mut inserts = Vec::new();

        for operation in operations {
            match operation {
                WriteOp::Insert(document) => inserts.push(document),
                operation => {
                    if !inserts.is_empty() {
                        result.merge(
                            StoreBackend::insert_documents(self, mem::take(&mut inserts), collection)
                                .await?,
                        );
                    }
                    result.merge(execute_write(self, operation, collection).await?);
                }
            }
        }

        if !inserts.is_empty() {
            result.merge(StoreBackend::insert_documents(self, inserts, collection).await?);
        }

        Ok(result)
    }

    /// Creates a new, empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Executes a single buffered operation against `backend`.
pub async fn execute_write<B>(
    backend: &B,
    operation: WriteOp,
    collection: &str,
) -> DocumentStoreResult<WriteResult>
where
    B: StoreBackend + ?Sized,
{
    Ok(match operation {
        WriteOp::Insert(document) => {
            StoreBackend::insert_documents(backend, vec![document], collection)
                .await?
                .into()
        }
        WriteOp::Replace { filter, document, upsert } => {
            StoreBackend::replace_document(backend, filter, document, upsert, collection)
                .await?
                .into()
        }
        WriteOp::Update { filter, update, options } => {
            StoreBackend::update_documents(backend, filter, update, options, collection)
                .await?
                .into()
        }
        WriteOp::Remove { filter, multi } => {
            StoreBackend::remove_documents(backend, filter, multi, collection)
                .await?
                .into()
        }
    })
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<InsertResult>;
    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn replace_document(
        &self,
        filter: Filter,
        replacement: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn remove_documents(
        &self,
        filter: Filter,
        multi: bool,
        collection: &str,
    ) -> DocumentStoreResult<RemoveResult>;
    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>>;
    async fn find_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream>;
    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64>;
    async fn bulk_write(
        &self,
        operations: Vec<WriteOp>,
        collection: &str,
    ) -> DocumentStoreResult<WriteResult>;
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<InsertResult> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::update_documents(self, filter, update, options, collection).await
    }

    async fn replace_document(
        &self,
        filter: Filter,
        replacement: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::replace_document(self, filter, replacement, upsert, collection).await
    }

    async fn remove_documents(
        &self,
        filter: Filter,
        multi: bool,
        collection: &str,
    ) -> DocumentStoreResult<RemoveResult> {
        StoreBackend::remove_documents(self, filter, multi, collection).await
    }

    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        StoreBackend::find_and_modify(self, request, collection).await
    }

    async fn find_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream> {
        StoreBackend::find_documents(self, query, collection).await
    }

    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn bulk_write(
        &self,
        operations: Vec<WriteOp>,
        collection: &str,
    ) -> DocumentStoreResult<WriteResult> {
        StoreBackend::bulk_write(self, operations, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<InsertResult> {
        DynStoreBackend::insert_documents(&**self, documents, collection).await
    }

    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        DynStoreBackend::update_documents(&**self, filter, update, options, collection).await
    }

    async fn replace_document(
        &self,
        filter: Filter,
        replacement: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        DynStoreBackend::replace_document(&**self, filter, replacement, upsert, collection).await
    }

    async fn remove_documents(
        &self,
        filter: Filter,
        multi: bool,
        collection: &str,
    ) -> DocumentStoreResult<RemoveResult> {
        DynStoreBackend::remove_documents(&**self, filter, multi, collection).await
    }

    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        DynStoreBackend::find_and_modify(&**self, request, collection).await
    }

    async fn find_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<DocumentStream> {
        DynStoreBackend::find_documents(&**self, query, collection).await
    }

    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64> {
        DynStoreBackend::count_documents(&**self, filter, collection).await
    }

    async fn bulk_write(
        &self,
        operations: Vec<WriteOp>,
        collection: &str,
    ) -> DocumentStoreResult<WriteResult> {
        DynStoreBackend::bulk_write(&**self, operations, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::create_collection(&**self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::drop_collection(&**self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        DynStoreBackend::list_collections(&**self).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        <dyn DynStoreBackend as DynStoreBackend>::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
