use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions,
        FindOptions, ReturnDocument,
    },
};
use tracing::debug;

use docmap_core::{
    backend::{DocumentStream, FindAndModifyRequest, StoreBackend, StoreBackendBuilder},
    document::STORE_KEY_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    filter::{Filter, Query},
    result::{InsertResult, RemoveResult, UpdateResult},
    update::{UpdateExpr, UpdateOptions},
};

use crate::filter::{MongoFilterTranslator, projection_document, sort_document};

/// Server error code of a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Maps a driver error, turning duplicate key violations into write conflicts.
///
/// `keys` are the identities of the documents sent, in order, used to name the conflicting one.
fn store_error(error: MongoError, collection: &str, keys: &[Bson]) -> DocumentStoreError {
    let conflict = |index: usize, message: &str| {
        DocumentStoreError::WriteConflict(
            keys.get(index)
                .map(ToString::to_string)
                .unwrap_or_else(|| message.to_string()),
            collection.to_string(),
        )
    };

    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => conflict(0, &e.message),
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY => conflict(0, &e.message),
        ErrorKind::InsertMany(e) => match e
            .write_errors
            .as_ref()
            .and_then(|errors| errors.iter().find(|e| e.code == DUPLICATE_KEY))
        {
            Some(e) => conflict(e.index, &e.message),
            None => DocumentStoreError::Backend(error.to_string()),
        },
        _ => DocumentStoreError::Backend(error.to_string()),
    }
}

/// Identity values named by a filter's equality terms, used to report conflicts on upserts.
fn filter_keys(filter: &Filter) -> Vec<Bson> {
    filter
        .equality_terms()
        .get(STORE_KEY_FIELD)
        .cloned()
        .into_iter()
        .collect()
}

/// Query that finds a document just upserted through `filter`. A pinned identity names it
/// exactly; otherwise the filter itself is reused.
fn upserted_query(filter: &Filter, query: Document) -> Document {
    match filter_keys(filter).pop() {
        Some(key) => doc! { STORE_KEY_FIELD: key },
        None => query,
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DocumentStoreResult<InsertResult> {
        let keys = documents
            .iter()
            .map(|document| document.get(STORE_KEY_FIELD).cloned().unwrap_or(Bson::Null))
            .collect::<Vec<_>>();

        let result = self
            .get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| store_error(e, collection, &keys))?;

        let mut inserted = result.inserted_ids.into_iter().collect::<Vec<_>>();
        inserted.sort_by_key(|(index, _)| *index);

        Ok(InsertResult {
            inserted_count: inserted.len() as u64,
            inserted_ids: inserted.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn update_documents(
        &self,
        filter: Filter,
        update: UpdateExpr,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let keys = filter_keys(&filter);
        let query = MongoFilterTranslator::translate(&filter)?;
        let target = self.get_collection(collection);

        let result = if options.multi {
            target
                .update_many(query, update.to_document())
                .upsert(options.upsert)
                .await
        } else {
            target
                .update_one(query, update.to_document())
                .upsert(options.upsert)
                .await
        }
        .map_err(|e| store_error(e, collection, &keys))?;

        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn replace_document(
        &self,
        filter: Filter,
        replacement: Document,
        upsert: bool,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let keys = filter_keys(&filter);
        let result = self
            .get_collection(collection)
            .replace_one(MongoFilterTranslator::translate(&filter)?, replacement)
            .upsert(upsert)
            .await
            .map_err(|e| store_error(e, collection, &keys))?;

        Ok(UpdateResult {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn remove_documents(&self, filter: Filter, multi: bool, collection: &str) -> DocumentStoreResult<RemoveResult> {
        let query = MongoFilterTranslator::translate(&filter)?;
        let target = self.get_collection(collection);

        let result = if multi {
            target.delete_many(query).await
        } else {
            target.delete_one(query).await
        }
        .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(RemoveResult { removed: result.deleted_count })
    }

    async fn find_and_modify(
        &self,
        request: FindAndModifyRequest,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let target = self.get_collection(collection);
        let query = MongoFilterTranslator::translate(&request.filter)?;
        let sort = request.sort.as_ref().map(sort_document);
        let projection = request.fields.as_deref().map(projection_document);

        if request.remove {
            let mut options = FindOneAndDeleteOptions::default();
            options.sort = sort;
            options.projection = projection;

            return target
                .find_one_and_delete(query)
                .with_options(options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()));
        }

        let mut find_options = FindOneOptions::default();
        find_options.sort = sort.clone();
        find_options.projection = projection.clone();

        if request.update.is_empty() {
            return target
                .find_one(query)
                .with_options(find_options)
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()));
        }

        let mut options = FindOneAndUpdateOptions::default();
        options.sort = sort;
        options.projection = projection;
        options.upsert = Some(request.upsert);
        options.return_document = Some(if request.return_new {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        });

        let keys = filter_keys(&request.filter);
        let document = target
            .find_one_and_update(query.clone(), request.update.to_document())
            .with_options(options)
            .await
            .map_err(|e| store_error(e, collection, &keys))?;

        if document.is_some() || !request.upsert || request.return_new {
            return Ok(document);
        }

        // There was no pre-update state, so the document was just upserted: read it back.
        debug!(collection, "Reading back document upserted by find and modify");

        target
            .find_one(upserted_query(&request.filter, query))
            .with_options(find_options)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn find_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<DocumentStream> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(sort_document(sort));
        }

        let cursor = self
            .get_collection(collection)
            .find(MongoFilterTranslator::translate(&query.filter)?)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(cursor
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
            .boxed())
    }

    async fn count_documents(&self, filter: Filter, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoFilterTranslator::translate(&filter)?)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: &str) -> Self {
        self.app_name = Some(app_name.to_string());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        debug!(database = %self.database, "MongoDB client configured");

        Ok(MongoDbStore::new(client, self.database))
    }
}
