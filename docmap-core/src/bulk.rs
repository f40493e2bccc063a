//! Buffered bulk writes.
//!
//! A [`WriteBuffer`] belongs to a collection handle. While it is active, every write produced
//! through that handle is staged instead of sent. [`BulkScope`] is the guard returned by
//! [`TypedCollection::bulk`](crate::collection::TypedCollection::bulk): committing it flushes
//! the staged writes in order, and dropping it without a commit discards them.
//!
//! ```ignore
//! let scope = users.bulk()?;
//! for mut user in batch {
//!     user.bulk_save(&users)?;
//! }
//! scope.commit().await?;
//! ```

use bson::Document as BsonDocument;
use parking_lot::Mutex;
use std::mem;
use tracing::{debug, warn};

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    filter::Filter,
    gateway::StoreGateway,
    result::WriteResult,
    update::{UpdateExpr, UpdateOptions},
};

/// A write waiting in a buffer, expressed in store field names.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new document. Fails on an existing identity.
    Insert(BsonDocument),
    /// Replace the document matching `filter`.
    Replace {
        filter: Filter,
        document: BsonDocument,
        upsert: bool,
    },
    /// Apply an atomic update to the documents matching `filter`.
    Update {
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
    },
    /// Remove the first or every document matching `filter`.
    Remove { filter: Filter, multi: bool },
}

impl WriteOp {
    /// Short operation name used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Insert(_) => "insert",
            WriteOp::Replace { .. } => "replace",
            WriteOp::Update { .. } => "update",
            WriteOp::Remove { .. } => "remove",
        }
    }
}

/// Ordered staging area for writes.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    active: bool,
    pending: Vec<WriteOp>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Activates the buffer with no pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BulkState`] if the buffer is already active.
    pub fn begin(&mut self) -> DocumentStoreResult<()> {
        if self.active {
            return Err(DocumentStoreError::BulkState(
                "a bulk scope is already active on this collection".to_string(),
            ));
        }

        self.active = true;
        self.pending.clear();

        Ok(())
    }

    /// Stages `operation` if the buffer is active. Otherwise hands it back for immediate execution.
    pub fn stage(&mut self, operation: WriteOp) -> Option<WriteOp> {
        if self.active {
            self.pending.push(operation);
            None
        } else {
            Some(operation)
        }
    }

    /// Stages `operation`, which is only allowed while the buffer is active.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BulkState`] if the buffer is inactive.
    pub fn push(&mut self, operation: WriteOp) -> DocumentStoreResult<()> {
        if !self.active {
            return Err(DocumentStoreError::BulkState(format!(
                "cannot buffer a {} outside of a bulk scope",
                operation.kind()
            )));
        }

        self.pending.push(operation);
        Ok(())
    }

    /// Deactivates the buffer and returns the pending writes in append order.
    pub fn take(&mut self) -> Vec<WriteOp> {
        self.active = false;
        mem::take(&mut self.pending)
    }

    /// Deactivates the buffer and drops the pending writes. Returns how many were dropped.
    pub fn discard(&mut self) -> usize {
        self.take().len()
    }
}

/// Guard over an active [`WriteBuffer`].
///
/// Exactly one of [`commit`](BulkScope::commit), [`abort`](BulkScope::abort) or the drop glue
/// finalizes the scope. Dropping an uncommitted scope discards its pending writes, which covers
/// early returns through `?`, panics and cancelled futures.
#[must_use = "dropping a bulk scope discards its pending writes"]
pub struct BulkScope<'c, 'a, B: StoreBackend> {
    buffer: &'c Mutex<WriteBuffer>,
    gateway: &'c StoreGateway<'a, B>,
    finished: bool,
}

impl<'c, 'a, B: StoreBackend> BulkScope<'c, 'a, B> {
    pub(crate) fn begin(
        buffer: &'c Mutex<WriteBuffer>,
        gateway: &'c StoreGateway<'a, B>,
    ) -> DocumentStoreResult<Self> {
        buffer.lock().begin()?;
        debug!(collection = gateway.collection(), "Bulk scope opened");

        Ok(Self { buffer, gateway, finished: false })
    }

    /// Number of writes staged so far.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Deactivates the buffer, then sends every staged write in append order.
    ///
    /// The buffer is inactive again even when the flush fails. Writes executed before the
    /// failing one stay applied.
    pub async fn commit(mut self) -> DocumentStoreResult<WriteResult> {
        self.finished = true;
        let operations = self.buffer.lock().take();

        debug!(
            collection = self.gateway.collection(),
            operations = operations.len(),
            "Committing bulk scope"
        );

        if operations.is_empty() {
            return Ok(WriteResult::default());
        }

        self.gateway.flush(operations).await
    }

    /// Discards every staged write. Returns how many were dropped.
    pub fn abort(mut self) -> usize {
        self.finished = true;
        let dropped = self.buffer.lock().discard();

        debug!(collection = self.gateway.collection(), dropped, "Bulk scope aborted");
        dropped
    }
}

impl<B: StoreBackend> Drop for BulkScope<'_, '_, B> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let dropped = self.buffer.lock().discard();
        if dropped > 0 {
            warn!(
                collection = self.gateway.collection(),
                dropped, "Bulk scope dropped without commit, pending writes discarded"
            );
        }
    }
}

impl<B: StoreBackend> std::fmt::Debug for BulkScope<'_, '_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkScope")
            .field("collection", &self.gateway.collection())
            .field("finished", &self.finished)
            .finish()
    }
}
