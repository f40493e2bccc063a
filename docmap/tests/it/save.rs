use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_save_force_insert_and_replace() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    for n in 0..10 {
        let mut entry = Instance::new(bare_doc(n));
        assert!(entry.is_new());

        let key = entry.save(&docs, true).await.unwrap();
        assert_eq!(key, Bson::Int64(n));
        assert!(!entry.is_new());
        assert_eq!(docs.count(Field::new("test_pk").eq(n)).await.unwrap(), 1);
    }

    // Inserting an existing key conflicts and leaves the stored document alone
    let mut entry = Instance::new(TestDoc { test_pk: 1, test_int: Some(2), ..Default::default() });
    let err = entry.save(&docs, true).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::WriteConflict(_, ref collection) if collection == "test_docs"));
    assert!(entry.is_new());

    let stored = docs.get(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.document(), &bare_doc(1));

    // Without force_insert the stored document is replaced
    let key = entry.save(&docs, false).await.unwrap();
    assert_eq!(key, Bson::Int64(1));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 10);

    entry.test_int = None;
    entry.reload(&docs).await.unwrap();
    assert_eq!(entry.test_int, Some(2));
}

#[tokio::test]
async fn test_force_insert_conflicts_across_integer_widths() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    // The upsert seeds the key from an Int32 literal
    docs.update(
        Field::new("test_pk").eq(101),
        UpdateExpr::new().set(doc! { "test_int": 1 }),
        UpdateOptions::default().upsert(true),
    )
    .await
    .unwrap();

    let mut entry = Instance::new(test_doc(101));
    let err = entry.save(&docs, true).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::WriteConflict(..)));
    assert!(entry.is_new());
    assert_eq!(docs.count(Field::new("test_pk").eq(101)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_save_upserts_a_new_key() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let mut entry = Instance::new(test_doc(7));
    entry.save(&docs, false).await.unwrap();

    let loaded = docs.get(7_i64).await.unwrap().expect("saved document should load");
    assert!(!loaded.is_new());
    assert_eq!(loaded.document(), entry.document());
}

#[tokio::test]
async fn test_local_assignments_persist_on_save() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let mut entry = Instance::new(test_doc(3));
    entry.save(&docs, true).await.unwrap();

    entry.test_str = Some("changed".to_string());
    entry.test_list.push(30);
    entry.save(&docs, false).await.unwrap();

    let loaded = docs.get(3_i64).await.unwrap().unwrap();
    assert_eq!(loaded.test_str.as_deref(), Some("changed"));
    assert_eq!(loaded.test_list, vec![3, 30]);
}

#[tokio::test]
async fn test_reload_missing_document() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let mut entry = Instance::new(bare_doc(42));
    let err = entry.reload(&docs).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::NotFound(_, _)));
    assert!(entry.is_new());
}

#[tokio::test]
async fn test_delete() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 10).await.unwrap();

    for entry in load_all(&docs).await {
        if entry.test_pk < 5 {
            let result = entry.delete(&docs).await.unwrap();
            assert_eq!(result.removed, 1);
        }
    }
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);

    // Deleting a document that is already gone is not an error
    let result = Instance::new(bare_doc(0)).delete(&docs).await.unwrap();
    assert_eq!(result.removed, 0);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_insert_many() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let result = docs.insert((0..5).map(test_doc).collect()).await.unwrap();
    assert_eq!(result.inserted, 5);

    // One duplicate rejects the whole batch
    let err = docs.insert(vec![test_doc(10), test_doc(4)]).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::WriteConflict(_, _)));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);

    let result = docs.insert(Vec::new()).await.unwrap();
    assert_eq!(result.affected(), 0);
}

#[tokio::test]
async fn test_find_with_query_window() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 20).await.unwrap();

    let query = Query::builder()
        .filter(Field::new("test_pk").gte(5))
        .sort("test_pk", SortDirection::Desc)
        .offset(2)
        .limit(3)
        .build();

    let keys = docs
        .find(query)
        .await
        .unwrap()
        .map_ok(|entry| entry.test_pk)
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(keys, vec![17, 16, 15]);
}
