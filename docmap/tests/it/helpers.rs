use docmap::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Document)]
#[document(collection = "test_docs")]
#[serde(default)]
pub struct TestDoc {
    #[document(primary_key)]
    pub test_pk: i64,
    pub test_int: Option<i64>,
    pub test_str: Option<String>,
    pub test_list: Vec<i64>,
}

/// A fully populated document whose values all derive from `n`
pub fn test_doc(n: i64) -> TestDoc {
    TestDoc {
        test_pk: n,
        test_int: Some(n),
        test_str: Some(n.to_string()),
        test_list: vec![n],
    }
}

/// A document with only its primary key set
pub fn bare_doc(n: i64) -> TestDoc {
    TestDoc { test_pk: n, ..Default::default() }
}

/// Create a new store on an empty in-memory backend
pub async fn create_test_store() -> DocumentStore<InMemoryStore> {
    let backend = InMemoryStore::builder()
        .build()
        .await
        .expect("In-memory backend should build");

    DocumentStore::new(backend)
}

/// Save documents `0..limit` through one bulk scope
pub async fn feed_data<B: StoreBackend>(
    docs: &TypedCollection<'_, B, TestDoc>,
    limit: i64,
) -> DocumentStoreResult<WriteResult> {
    let scope = docs.bulk()?;
    for n in 0..limit {
        Instance::new(test_doc(n)).bulk_save(docs)?;
    }
    scope.commit().await
}

/// Buffer documents `0..limit`, then bail out before committing
pub async fn feed_data_and_fail<B: StoreBackend>(
    docs: &TypedCollection<'_, B, TestDoc>,
    limit: i64,
) -> DocumentStoreResult<WriteResult> {
    let scope = docs.bulk()?;
    for n in 0..limit {
        Instance::new(test_doc(n)).bulk_save(docs)?;
    }
    assert_eq!(scope.pending(), limit as usize);

    Err(DocumentStoreError::Backend("feed interrupted".to_string()))
}

/// Load every document of the collection, ordered by primary key
pub async fn load_all<B: StoreBackend>(docs: &TypedCollection<'_, B, TestDoc>) -> Vec<Instance<TestDoc>> {
    docs.find(Query::builder().sort("test_pk", SortDirection::Asc).build())
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap()
}
