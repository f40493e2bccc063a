//! In-memory document instances and their write operations.
//!
//! An [`Instance`] wraps a typed document together with whether it has been persisted yet. Every
//! write method takes the collection handle it runs on: outside a bulk scope the write goes to
//! the store immediately, inside one it is buffered and the instance is left untouched.
//!
//! Atomic operators keep the instance and the stored document consistent without reloading.
//! The local result of the operator is computed first, and an operator the document type cannot
//! hold is rejected before anything is sent. The operator then goes out as one single-document
//! update keyed by the primary key, and once the store reports the document matched (or was
//! upserted) the precomputed result replaces the local document.

use bson::{Bson, Document as BsonDocument};
use std::ops::{Deref, DerefMut};

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::{Document, DocumentExt, key_of},
    error::{DocumentStoreError, DocumentStoreResult},
    result::WriteResult,
    update::{AtomicOp, UpdateExpr, UpdateOptions},
};

/// A typed document plus its transient persistence state.
///
/// Fields are read and assigned through `Deref`/`DerefMut`. Assignments stay local until the
/// next [`save`](Instance::save).
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<D: Document> {
    document: D,
    is_new: bool,
}

impl<D: Document> Instance<D> {
    /// Wraps a document that has not been persisted.
    pub fn new(document: D) -> Self {
        Self { document, is_new: true }
    }

    pub(crate) fn loaded(document: D) -> Self {
        Self { document, is_new: false }
    }

    /// Whether this instance was created locally and not yet saved.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn into_inner(self) -> D {
        self.document
    }

    /// Returns the primary key value.
    pub fn primary_key(&self) -> DocumentStoreResult<Bson> {
        self.document.primary_key()
    }

    /// Persists the instance and returns its primary key.
    ///
    /// With `force_insert`, the document is inserted and an existing document with the same key
    /// is a [`DocumentStoreError::WriteConflict`]. Without it, the document replaces the stored
    /// one with the same key, or is inserted if there is none.
    ///
    /// Inside a bulk scope the write is buffered and `is_new` is left as is.
    pub async fn save<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        force_insert: bool,
    ) -> DocumentStoreResult<Bson> {
        let fields = self.document.to_fields()?;
        let key = key_of::<D>(&fields)?;
        let gateway = collection.gateway();

        let operation = if force_insert {
            gateway.insert_op(fields)
        } else {
            gateway.save_op(key.clone(), fields)
        };

        if collection.submit(operation).await?.acknowledged {
            self.is_new = false;
        }

        Ok(key)
    }

    /// Buffers an upsert-by-primary-key of this instance in the collection's active bulk scope.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BulkState`] when no bulk scope is active.
    pub fn bulk_save<B: StoreBackend>(
        &self,
        collection: &TypedCollection<'_, B, D>,
    ) -> DocumentStoreResult<()> {
        let fields = self.document.to_fields()?;
        let key = key_of::<D>(&fields)?;

        collection.stage(collection.gateway().save_op(key, fields))
    }

    /// Overwrites every local field with the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if the document no longer exists.
    pub async fn reload<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
    ) -> DocumentStoreResult<()> {
        let key = self.primary_key()?;

        match collection.gateway().find_by_key(key.clone()).await? {
            Some(fields) => {
                self.document = D::from_fields(fields)?;
                self.is_new = false;
                Ok(())
            }
            None => Err(DocumentStoreError::NotFound(
                key.to_string(),
                collection.name().to_string(),
            )),
        }
    }

    /// Removes the stored document. Removing a document that does not exist succeeds with a
    /// zero count. The local instance is left intact.
    pub async fn delete<B: StoreBackend>(
        &self,
        collection: &TypedCollection<'_, B, D>,
    ) -> DocumentStoreResult<WriteResult> {
        let gateway = collection.gateway();
        let filter = gateway.key_filter(self.primary_key()?);

        collection.submit(gateway.remove_op(filter, false)).await
    }

    /// Sends `update` to the stored document and applies it locally once the store reports a
    /// match or an upsert.
    ///
    /// With `upsert`, a missing document is created from the primary key and the update.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidUpdate`] without touching the store when the
    /// updated fields no longer deserialize into `D`.
    pub async fn update_one<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        update: UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<WriteResult> {
        let next = self.updated(&update)?;
        let gateway = collection.gateway();
        let filter = gateway.key_filter(self.primary_key()?);
        let operation = gateway.update_op(filter, update, UpdateOptions::single().upsert(upsert))?;

        let result = collection.submit(operation).await?;

        if result.acknowledged && result.affected() > 0 {
            self.document = next;
            self.is_new = false;
        }

        Ok(result)
    }

    /// Sets each field to the given value.
    pub async fn set<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::Set, fields).await
    }

    /// Removes each field. The values are ignored.
    pub async fn unset<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::Unset, fields).await
    }

    /// Adds the given delta to each numeric field. An absent field takes the delta.
    pub async fn inc<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::Inc, fields).await
    }

    /// Appends the value to each array field.
    pub async fn push<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::Push, fields).await
    }

    /// Removes every element equal to the value from each array field.
    pub async fn pull<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::Pull, fields).await
    }

    /// Appends the value to each array field unless an equal element is already present.
    pub async fn add_to_set<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.atomic(collection, AtomicOp::AddToSet, fields).await
    }

    async fn atomic<B: StoreBackend>(
        &mut self,
        collection: &TypedCollection<'_, B, D>,
        op: AtomicOp,
        fields: BsonDocument,
    ) -> DocumentStoreResult<WriteResult> {
        self.update_one(collection, op.expression(fields), false).await
    }

    fn updated(&self, update: &UpdateExpr) -> DocumentStoreResult<D> {
        let mut fields = self.document.to_fields()?;
        update.apply(&mut fields)?;

        D::from_fields(fields).map_err(|err| {
            DocumentStoreError::InvalidUpdate(format!("updated document does not fit its type: {err}"))
        })
    }
}

impl<D: Document> From<D> for Instance<D> {
    fn from(document: D) -> Self {
        Instance::new(document)
    }
}

impl<D: Document> Deref for Instance<D> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.document
    }
}

impl<D: Document> DerefMut for Instance<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.document
    }
}
