use super::helpers::*;
use docmap::{memory::InMemoryStore, prelude::*};

#[tokio::test]
async fn test_dyn_store_operations() {
    let store: DynDocumentStore = create_test_store().await.into_dyn();
    let docs: DynTypedCollection<'_, TestDoc> = store.typed_collection();

    feed_data(&docs, 10).await.unwrap();
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 10);

    let mut entry = docs.get(4_i64).await.unwrap().unwrap();
    entry.inc(&docs, doc! { "test_int": 1 }).await.unwrap();
    assert_eq!(entry.test_int, Some(5));

    let removed = docs
        .find_and_modify(FindAndModify::new(Field::new("test_int").eq(5)).remove(true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.test_pk, 4);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 9);

    assert!(store.backend_as::<InMemoryStore>().is_some());

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_collection_management() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    assert_eq!(docs.name(), "test_docs");

    store.create_collection("audit").await.unwrap();
    feed_data(&docs, 3).await.unwrap();

    let mut names = store.list_collections().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["audit".to_string(), "test_docs".to_string()]);

    store.drop_collection("test_docs").await.unwrap();
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 0);
    assert_eq!(store.list_collections().await.unwrap(), vec!["audit".to_string()]);

    // Dropping an unknown collection is not an error
    store.drop_collection("missing").await.unwrap();
}
