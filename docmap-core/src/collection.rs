//! Typed collection handles.
//!
//! A [`TypedCollection`] is the execution context for one document type: it routes writes
//! through its [`StoreGateway`] and owns the [`WriteBuffer`] that a [`BulkScope`] activates.
//! Two handles for the same collection have independent buffers.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//!
//! let users = store.typed_collection::<User>();
//!
//! let result = users
//!     .update(
//!         Field::new("logins").lt(3),
//!         UpdateExpr::new().set(doc! { "status": "new" }),
//!         UpdateOptions::default(),
//!     )
//!     .await?;
//!
//! let newest = users
//!     .find_and_modify(FindAndModify::new(Filter::all()).sort(Sort::desc("email")).remove(true))
//!     .await?;
//! ```

use bson::Bson;
use futures::{StreamExt, stream::BoxStream};
use parking_lot::Mutex;
use std::marker::PhantomData;

use crate::{
    backend::{FindAndModifyRequest, StoreBackend},
    bulk::{BulkScope, WriteBuffer, WriteOp},
    document::{Document, DocumentExt, key_of},
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{Filter, Query, Sort},
    gateway::StoreGateway,
    instance::Instance,
    result::WriteResult,
    update::{UpdateExpr, UpdateOptions},
};

/// A lazy stream of loaded instances.
pub type InstanceStream<D> = BoxStream<'static, DocumentStoreResult<Instance<D>>>;

/// Collection-level API for a document type bound to a backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
/// * `D` - The document type
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    gateway: StoreGateway<'a, B>,
    buffer: Mutex<WriteBuffer>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(backend: &'a B) -> Self {
        Self {
            gateway: StoreGateway::new(D::collection_name(), D::primary_key_field(), backend),
            buffer: Mutex::new(WriteBuffer::new()),
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &'static str {
        self.gateway.collection()
    }

    pub(crate) fn gateway(&self) -> &StoreGateway<'a, B> {
        &self.gateway
    }

    /// Opens a bulk scope: until it is committed, every write issued through this handle is
    /// buffered instead of sent.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BulkState`] if a scope is already active on this handle.
    pub fn bulk(&self) -> DocumentStoreResult<BulkScope<'_, 'a, B>> {
        BulkScope::begin(&self.buffer, &self.gateway)
    }

    pub fn is_bulk_active(&self) -> bool {
        self.buffer.lock().is_active()
    }

    /// Buffers `operation` if a bulk scope is active, otherwise executes it.
    pub(crate) async fn submit(&self, operation: WriteOp) -> DocumentStoreResult<WriteResult> {
        let operation = self.buffer.lock().stage(operation);

        match operation {
            Some(operation) => self.gateway.execute(operation).await,
            None => Ok(WriteResult::deferred()),
        }
    }

    /// Buffers `operation`, which requires an active bulk scope.
    pub(crate) fn stage(&self, operation: WriteOp) -> DocumentStoreResult<()> {
        self.buffer.lock().push(operation)
    }

    /// Counts the documents matching `filter`.
    pub async fn count(&self, filter: Filter) -> DocumentStoreResult<u64> {
        self.gateway.count(filter).await
    }

    /// Streams the documents matching `query` as loaded instances.
    ///
    /// The stream is finite and consumed once. Call `find` again to restart.
    pub async fn find(&self, query: impl Into<Query>) -> DocumentStoreResult<InstanceStream<D>> {
        let stream = self.gateway.find(query.into()).await?;

        Ok(stream
            .map(|fields| fields.and_then(|fields| Ok(Instance::loaded(D::from_fields(fields)?))))
            .boxed())
    }

    /// Loads the document whose primary key is `key`.
    pub async fn get(&self, key: impl Into<Bson>) -> DocumentStoreResult<Option<Instance<D>>> {
        match self.gateway.find_by_key(key.into()).await? {
            Some(fields) => Ok(Some(Instance::loaded(D::from_fields(fields)?))),
            None => Ok(None),
        }
    }

    /// Inserts new documents. A key that already exists is a
    /// [`DocumentStoreError::WriteConflict`].
    pub async fn insert(&self, documents: Vec<D>) -> DocumentStoreResult<WriteResult> {
        let operations = documents
            .iter()
            .map(|document| -> DocumentStoreResult<WriteOp> {
                let fields = document.to_fields()?;
                key_of::<D>(&fields)?;
                Ok(self.gateway.insert_op(fields))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        if operations.is_empty() {
            return Ok(WriteResult::default());
        }

        let operations = {
            let mut buffer = self.buffer.lock();
            if buffer.is_active() {
                for operation in operations {
                    buffer.push(operation)?;
                }
                None
            } else {
                Some(operations)
            }
        };

        match operations {
            Some(operations) => self.gateway.flush(operations).await,
            None => Ok(WriteResult::deferred()),
        }
    }

    /// Applies `update` to the documents matching `filter`.
    ///
    /// With `options.multi` every match is updated, otherwise only the first. With
    /// `options.upsert` and no match, a document is created from the filter's equality terms
    /// with the update applied.
    pub async fn update(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
    ) -> DocumentStoreResult<WriteResult> {
        let operation = self.gateway.update_op(filter, update, options)?;
        self.submit(operation).await
    }

    /// Removes every document matching `filter`, or at most one when `multi` is false.
    pub async fn remove(&self, filter: Filter, multi: bool) -> DocumentStoreResult<WriteResult> {
        self.submit(self.gateway.remove_op(filter, multi)).await
    }

    /// Selects one document and updates or removes it in a single store operation.
    ///
    /// Returns `None` when nothing matched and nothing was upserted. A remove returns the
    /// pre-deletion state, an upsert returns the created document, and an update returns the
    /// pre-update state unless [`FindAndModify::return_new`] is set. Fields left out of a
    /// projection take their default value on the returned instance.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BulkState`] while a bulk scope is active, since the call
    /// needs its result immediately. Returns [`DocumentStoreError::InvalidUpdate`] when `remove`
    /// is combined with an update or an upsert, or when an upsert has no update.
    pub async fn find_and_modify(
        &self,
        request: FindAndModify,
    ) -> DocumentStoreResult<Option<Instance<D>>> {
        if self.is_bulk_active() {
            return Err(DocumentStoreError::BulkState(format!(
                "find_and_modify cannot run inside a bulk scope on collection {}",
                self.name()
            )));
        }

        let request = request.validate()?;
        match self.gateway.find_and_modify(request).await? {
            Some(fields) => Ok(Some(Instance::loaded(D::from_fields(fields)?))),
            None => Ok(None),
        }
    }
}

/// Parameters of [`TypedCollection::find_and_modify`], in model field names.
///
/// ```ignore
/// let request = FindAndModify::new(Field::new("pk").lt(10))
///     .update(UpdateExpr::new().set(doc! { "score": 0 }))
///     .sort(Sort::desc("pk"))
///     .fields(["score"])
///     .return_new(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModify {
    request: FindAndModifyRequest,
}

impl FindAndModify {
    pub fn new(filter: Filter) -> Self {
        Self {
            request: FindAndModifyRequest { filter, ..FindAndModifyRequest::default() },
        }
    }

    pub fn update(mut self, update: UpdateExpr) -> Self {
        self.request.update = update;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.request.sort = Some(sort);
        self
    }

    /// Restricts the fields populated on the returned instance.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn return_new(mut self, return_new: bool) -> Self {
        self.request.return_new = return_new;
        self
    }

    pub fn remove(mut self, remove: bool) -> Self {
        self.request.remove = remove;
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.request.upsert = upsert;
        self
    }

    fn validate(self) -> DocumentStoreResult<FindAndModifyRequest> {
        let request = self.request;

        if request.remove && (request.upsert || !request.update.is_empty()) {
            return Err(DocumentStoreError::InvalidUpdate(
                "find_and_modify cannot combine remove with an update or an upsert".to_string(),
            ));
        }

        if request.upsert && request.update.is_empty() {
            return Err(DocumentStoreError::InvalidUpdate(
                "find_and_modify upsert requires a non-empty update".to_string(),
            ));
        }

        Ok(request)
    }
}

impl From<FindAndModify> for FindAndModifyRequest {
    fn from(value: FindAndModify) -> Self {
        value.request
    }
}
