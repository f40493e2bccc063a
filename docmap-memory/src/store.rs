//! In-memory storage implementation for document stores.
//!
//! Documents are kept per collection in insertion order behind one async-aware read-write
//! lock. Every write takes the write lock for its whole duration, which makes each
//! single-document update, replace and find-and-modify indivisible, and lets
//! [`bulk_write`](StoreBackend::bulk_write) run a whole flush under one acquisition.

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::trace;
use uuid::Uuid;

use docmap_core::{
    backend::{DocumentStream, FindAndModifyRequest, StoreBackend, StoreBackendBuilder},
    bulk::WriteOp,
    document::STORE_KEY_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{Filter, Query},
    result::{InsertResult, RemoveResult, UpdateResult, WriteResult},
    update::{UpdateExpr, UpdateOptions, values_equal},
};

use crate::evaluator::{DocumentEvaluator, compare_documents, project};

type StoreMap = HashMap<String, Vec<BsonDocument>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// shared across async tasks. Clones share the same underlying data.
///
/// Finds scan every document of a collection. Documents inserted without an identity get a
/// random UUID string.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::InMemoryStore;
/// use docmap::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_documents(vec![doc! { "_id": 1, "name": "Alice" }], "users").await?;
/// assert_eq!(store.count_documents(Filter::all(), "users").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Mutable view over one collection while the write lock is held.
struct CollectionState<'s> {
    name: &'s str,
    documents: &'s mut Vec<BsonDocument>,
}

impl<'s> CollectionState<'s> {
    fn open(store: &'s mut StoreMap, name: &'s str) -> Self {
        let documents = store.entry(name.to_string()).or_default();
        Self { name, documents }
    }

    fn positions(&self, filter: &Filter) -> DocumentStoreResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::matches(document, filter)? {
                positions.push(position);
            }
        }

        Ok(positions)
    }

    fn contains_id(&self, id: &Bson) -> bool {
        self.documents
            .iter()
            .any(|document| document.get(STORE_KEY_FIELD).is_some_and(|stored| values_equal(stored, id)))
    }

    fn conflict(&self, id: &Bson) -> DocumentStoreError {
        DocumentStoreError::WriteConflict(id.to_string(), self.name.to_string())
    }

    /// Inserts all documents or none of them.
    fn insert(&mut self, documents: Vec<BsonDocument>) -> DocumentStoreResult<InsertResult> {
        let mut prepared = Vec::with_capacity(documents.len());
        let mut inserted_ids = Vec::with_capacity(documents.len());

        for mut document in documents {
            let id = ensure_id(&mut document);

            if self.contains_id(&id) || inserted_ids.iter().any(|staged| values_equal(staged, &id)) {
                return Err(self.conflict(&id));
            }

            inserted_ids.push(id);
            prepared.push(document);
        }

        self.documents.extend(prepared);

        Ok(InsertResult {
            inserted_count: inserted_ids.len() as u64,
            inserted_ids,
        })
    }

    /// Builds the document an upsert creates from the filter's equality terms.
    fn upsert_seed(&self, filter: &Filter, update: &UpdateExpr) -> DocumentStoreResult<BsonDocument> {
        let mut seed = filter.equality_terms();
        update.apply(&mut seed)?;
        Ok(seed)
    }

    fn insert_upserted(&mut self, mut document: BsonDocument) -> DocumentStoreResult<Bson> {
        let id = ensure_id(&mut document);

        if self.contains_id(&id) {
            return Err(self.conflict(&id));
        }

        self.documents.push(document);
        Ok(id)
    }

    /// Applies `update` to a copy of the stored document, refusing identity changes.
    fn updated(&self, position: usize, update: &UpdateExpr) -> DocumentStoreResult<(BsonDocument, bool)> {
        let current = &self.documents[position];
        let mut next = current.clone();
        let changed = update.apply(&mut next)?;

        if !same_id(next.get(STORE_KEY_FIELD), current.get(STORE_KEY_FIELD)) {
            return Err(DocumentStoreError::InvalidUpdate(format!(
                "update would change the identity of a document in collection {}",
                self.name
            )));
        }

        Ok((next, changed))
    }

    fn update(
        &mut self,
        filter: &Filter,
        update: &UpdateExpr,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        let mut positions = self.positions(filter)?;
        if !options.multi {
            positions.truncate(1);
        }

        if positions.is_empty() {
            if !options.upsert {
                return Ok(UpdateResult::default());
            }

            let seed = self.upsert_seed(filter, update)?;
            let id = self.insert_upserted(seed)?;

            return Ok(UpdateResult { matched: 0, modified: 0, upserted_id: Some(id) });
        }

        // Every document is updated on a copy first, so a failing update leaves none applied.
        let updated = positions
            .iter()
            .map(|&position| -> DocumentStoreResult<_> { Ok((position, self.updated(position, update)?)) })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let matched = updated.len() as u64;
        let mut modified = 0;

        for (position, (document, changed)) in updated {
            if changed {
                self.documents[position] = document;
                modified += 1;
            }
        }

        Ok(UpdateResult { matched, modified, upserted_id: None })
    }

    fn replace(
        &mut self,
        filter: &Filter,
        mut replacement: BsonDocument,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateResult> {
        let Some(&position) = self.positions(filter)?.first() else {
            if !upsert {
                return Ok(UpdateResult::default());
            }

            if !replacement.contains_key(STORE_KEY_FIELD) {
                if let Some(id) = filter.equality_terms().get(STORE_KEY_FIELD) {
                    replacement.insert(STORE_KEY_FIELD, id.clone());
                }
            }

            let id = self.insert_upserted(replacement)?;
            return Ok(UpdateResult { matched: 0, modified: 0, upserted_id: Some(id) });
        };

        let current = &self.documents[position];
        let id = current.get(STORE_KEY_FIELD).cloned().unwrap_or(Bson::Null);

        match replacement.get(STORE_KEY_FIELD) {
            Some(new_id) if !values_equal(new_id, &id) => {
                return Err(DocumentStoreError::InvalidUpdate(format!(
                    "replacement would change the identity {id} in collection {}",
                    self.name
                )));
            }
            Some(_) => {}
            None => {
                let mut with_id = BsonDocument::new();
                with_id.insert(STORE_KEY_FIELD, id);
                with_id.extend(replacement);
                replacement = with_id;
            }
        }

        let modified = u64::from(*current != replacement);
        self.documents[position] = replacement;

        Ok(UpdateResult { matched: 1, modified, upserted_id: None })
    }

    fn remove(&mut self, filter: &Filter, multi: bool) -> DocumentStoreResult<RemoveResult> {
        let mut positions = self.positions(filter)?;
        if !multi {
            positions.truncate(1);
        }

        for &position in positions.iter().rev() {
            self.documents.remove(position);
        }

        Ok(RemoveResult { removed: positions.len() as u64 })
    }

    fn find_and_modify(&mut self, request: FindAndModifyRequest) -> DocumentStoreResult<Option<BsonDocument>> {
        let mut positions = self.positions(&request.filter)?;
        if let Some(sort) = &request.sort {
            let documents = &*self.documents;
            positions.sort_by(|&a, &b| compare_documents(&documents[a], &documents[b], sort));
        }

        let fields = request.fields.as_deref();

        let Some(&position) = positions.first() else {
            if !request.upsert || request.remove {
                return Ok(None);
            }

            let mut created = self.upsert_seed(&request.filter, &request.update)?;
            let id = ensure_id(&mut created);
            self.insert_upserted(created.clone())?;

            trace!(collection = self.name, id = %id, "Upserted through find and modify");
            return Ok(Some(project(created, fields)));
        };

        if request.remove {
            let removed = self.documents.remove(position);
            return Ok(Some(project(removed, fields)));
        }

        if request.update.is_empty() {
            return Ok(Some(project(self.documents[position].clone(), fields)));
        }

        let (next, _) = self.updated(position, &request.update)?;
        let previous = std::mem::replace(&mut self.documents[position], next);

        let returned = if request.return_new {
            self.documents[position].clone()
        } else {
            previous
        };

        Ok(Some(project(returned, fields)))
    }

    fn apply(&mut self, operation: WriteOp) -> DocumentStoreResult<WriteResult> {
        Ok(match operation {
            WriteOp::Insert(document) => self.insert(vec![document])?.into(),
            WriteOp::Replace { filter, document, upsert } => self.replace(&filter, document, upsert)?.into(),
            WriteOp::Update { filter, update, options } => self.update(&filter, &update, options)?.into(),
            WriteOp::Remove { filter, multi } => self.remove(&filter, multi)?.into(),
        })
    }
}

/// Returns the document's identity, assigning a random one when it has none.
/// Identities compare like filter equality, so `Int32(1)` and `Int64(1)` name the same document.
fn same_id(left: Option<&Bson>, right: Option<&Bson>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => values_equal(left, right),
        (left, right) => left == right,
    }
}

fn ensure_id(document: &mut BsonDocument) -> Bson {
    match document.get(STORE_KEY_FIELD) {
        Some(id) => id.clone(),
        None => {
            let id = Bson::String(Uuid::new_v4().to_string());
            let mut with_id = BsonDocument::new();
            with_id.insert(STORE_KEY_FIELD, id.clone());
            with_id.extend(std::mem::take(document));
            *document = with_id;
            id
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(
        &self,
        documents: Vec<BsonDocument>,
        collection: &str,
    ) -> DocumentStoreResult<InsertResult> {
        let mut store = self.store.write().await;
        CollectionState::open(&mut store, collection).insert(documents)
    }

    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let mut store = self.store.write().await;
        CollectionState::open(&mut store, collection).update(&filter, &update, options)
    }

    async fn replace_document(
        &self,
        filter: Filter,
        replacement: BsonDocument,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let mut store = self.store.write().await;
        CollectionState::open(&mut store, collection).replace(&filter, replacement, upsert)
    }

    async fn remove_documents(
        &self,
        filter: Filter,
        multi: bool,
        collection: &str,
    ) -> DocumentStoreResult<RemoveResult> {
        let mut store = self.store.write().await;
        CollectionState::open(&mut store, collection).remove(&filter, multi)
    }

    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<BsonDocument>> {
        let mut store = self.store.write().await;
        CollectionState::open(&mut store, collection).find_and_modify(request)
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(documents) => documents,
            None => return Ok(stream::empty().boxed()),
        };

        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::matches(document, &query.filter)? {
                matched.push(document);
            }
        }

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| compare_documents(a, b, sort));
        }

        let results = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(stream::iter(results).boxed())
    }

    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(0);
        };

        let mut count = 0;
        for document in documents {
            if DocumentEvaluator::matches(document, &filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn bulk_write(&self, operations: Vec<WriteOp>, collection: &str) -> DocumentStoreResult<WriteResult> {
        let mut store = self.store.write().await;
        let mut state = CollectionState::open(&mut store, collection);

        trace!(collection, operations = operations.len(), "Applying bulk write");

        let mut result = WriteResult::default();
        for operation in operations {
            result.merge(state.apply(operation)?);
        }

        Ok(result)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`].
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
