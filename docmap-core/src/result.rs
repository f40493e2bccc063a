//! Outcomes of write operations.
//!
//! Backends report per-operation results ([`InsertResult`], [`UpdateResult`],
//! [`RemoveResult`]). The mapper normalizes them into a [`WriteResult`], which is also what a
//! bulk flush returns once the results of every batched operation are merged.

use bson::Bson;

/// Backend outcome of an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    pub inserted_count: u64,
    pub inserted_ids: Vec<Bson>,
}

/// Backend outcome of an update or replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    /// Identity of the document created by an upsert, if one was created.
    pub upserted_id: Option<Bson>,
}

/// Backend outcome of a remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveResult {
    pub removed: u64,
}

/// Normalized outcome of one or more writes.
///
/// Counts are unsigned and never exceed the number of documents the filters could match.
/// A multi-document write that fails part way reports what it reached through these counts.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResult {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub removed: u64,
    pub upserted_ids: Vec<Bson>,
    /// `false` when the write was queued in a bulk scope rather than executed.
    pub acknowledged: bool,
}

impl WriteResult {
    /// The result of a write that was buffered instead of sent.
    pub fn deferred() -> Self {
        Self { acknowledged: false, ..Self::default() }
    }

    /// The identity of the first document created by an upsert.
    pub fn upserted_id(&self) -> Option<&Bson> {
        self.upserted_ids.first()
    }

    /// Number of documents touched: matched, upserted, inserted or removed.
    pub fn affected(&self) -> u64 {
        self.matched + self.upserted_ids.len() as u64 + self.inserted + self.removed
    }

    /// Folds another result into this one.
    pub fn merge(&mut self, other: impl Into<WriteResult>) {
        let other = other.into();

        self.inserted += other.inserted;
        self.matched += other.matched;
        self.modified += other.modified;
        self.removed += other.removed;
        self.upserted_ids.extend(other.upserted_ids);
        self.acknowledged &= other.acknowledged;
    }
}

impl Default for WriteResult {
    fn default() -> Self {
        Self {
            inserted: 0,
            matched: 0,
            modified: 0,
            removed: 0,
            upserted_ids: Vec::new(),
            acknowledged: true,
        }
    }
}

impl From<InsertResult> for WriteResult {
    fn from(result: InsertResult) -> Self {
        Self { inserted: result.inserted_count, ..Self::default() }
    }
}

impl From<UpdateResult> for WriteResult {
    fn from(result: UpdateResult) -> Self {
        Self {
            matched: result.matched,
            modified: result.modified,
            upserted_ids: result.upserted_id.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl From<RemoveResult> for WriteResult {
    fn from(result: RemoveResult) -> Self {
        Self { removed: result.removed, ..Self::default() }
    }
}
