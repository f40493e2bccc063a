use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_update() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 100).await.unwrap();

    let result = docs
        .update(
            Field::new("test_pk").gt(-1),
            UpdateExpr::new().set(doc! { "test_int": 1000 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(docs.count(Field::new("test_int").eq(1000)).await.unwrap(), 100);
    assert_eq!(result.modified, 100);

    let result = docs
        .update(
            Field::new("test_pk").gt(-1),
            UpdateExpr::new().set(doc! { "test_int": 2000 }),
            UpdateOptions::default().multi(false),
        )
        .await
        .unwrap();
    assert_eq!(docs.count(Field::new("test_int").eq(2000)).await.unwrap(), 1);
    assert_eq!(result.modified, 1);

    let result = docs
        .update(
            Field::new("test_pk").eq(101_i64),
            UpdateExpr::new().set(doc! { "test_int": 3000 }),
            UpdateOptions::default().upsert(true),
        )
        .await
        .unwrap();
    assert_eq!(result.upserted_id(), Some(&Bson::Int64(101)));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 101);

    let upserted = docs.get(101_i64).await.unwrap().unwrap();
    assert_eq!(upserted.test_int, Some(3000));
}

#[tokio::test]
async fn test_update_counts_only_changed_documents() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 10).await.unwrap();

    let result = docs
        .update(
            Field::new("test_pk").lt(5),
            UpdateExpr::new().set(doc! { "test_int": 3_i64 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    // Document 3 already held the value
    assert_eq!(result.matched, 5);
    assert_eq!(result.modified, 4);
}

#[tokio::test]
async fn test_update_with_no_match() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 10).await.unwrap();

    let result = docs
        .update(
            Field::new("test_pk").gt(100),
            UpdateExpr::new().inc(doc! { "test_int": 1 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.affected(), 0);
    assert!(result.upserted_id().is_none());
}

#[tokio::test]
async fn test_update_combines_operators() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 3).await.unwrap();

    docs.update(
        Field::new("test_pk").eq(2),
        UpdateExpr::new()
            .inc(doc! { "test_int": 10 })
            .push(doc! { "test_list": 7 })
            .unset(doc! { "test_str": "" }),
        UpdateOptions::single(),
    )
    .await
    .unwrap();

    let stored = docs.get(2_i64).await.unwrap().unwrap();
    assert_eq!(stored.test_int, Some(12));
    assert_eq!(stored.test_list, vec![2, 7]);
    assert_eq!(stored.test_str, None);
}

#[tokio::test]
async fn test_empty_update_is_rejected() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let err = docs
        .update(Filter::all(), UpdateExpr::new(), UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));
}

#[tokio::test]
async fn test_update_from_store_syntax() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 5).await.unwrap();

    let update = UpdateExpr::try_from(doc! { "$set": { "test_str": "x" }, "$addToSet": { "test_list": 0 } }).unwrap();
    let result = docs
        .update(Field::new("test_pk").lte(1), update, UpdateOptions::default())
        .await
        .unwrap();
    assert_eq!(result.modified, 2);

    let first = docs.get(0_i64).await.unwrap().unwrap();
    let second = docs.get(1_i64).await.unwrap().unwrap();
    assert_eq!(first.test_list, vec![0]);
    assert_eq!(second.test_list, vec![1, 0]);
    assert_eq!(second.test_str.as_deref(), Some("x"));
}
