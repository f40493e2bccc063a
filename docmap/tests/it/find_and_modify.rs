use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_find_and_modify() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 100).await.unwrap();

    // Pre-update state of the highest match, restricted to one field
    let entry = docs
        .find_and_modify(
            FindAndModify::new(Field::new("test_pk").lt(10))
                .update(UpdateExpr::new().set(doc! { "test_int": 1000 }))
                .sort(Sort::desc("test_pk"))
                .fields(["test_int"]),
        )
        .await
        .unwrap()
        .expect("a document should match");
    assert_eq!(entry.test_pk, 9);
    assert_eq!(entry.test_int, Some(9));
    assert_eq!(entry.test_str, None);
    assert!(!entry.is_new());
    assert_eq!(docs.count(Field::new("test_int").eq(1000)).await.unwrap(), 1);

    // Upsert creates the document and returns it
    let entry = docs
        .find_and_modify(
            FindAndModify::new(Field::new("test_pk").eq(101_i64))
                .update(UpdateExpr::new().set(doc! { "test_int": 101 }))
                .sort(Sort::desc("test_pk"))
                .fields(["test_int"])
                .upsert(true),
        )
        .await
        .unwrap()
        .expect("upsert should return the created document");
    assert_eq!(entry.test_pk, 101);
    assert_eq!(entry.test_int, Some(101));
    assert_eq!(docs.count(Field::new("test_pk").eq(101)).await.unwrap(), 1);

    // Post-update state
    let entry = docs
        .find_and_modify(
            FindAndModify::new(Field::new("test_pk").lt(10))
                .update(UpdateExpr::new().set(doc! { "test_int": 2000 }))
                .sort(Sort::desc("test_pk"))
                .return_new(true),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.test_pk, 9);
    assert_eq!(entry.test_int, Some(2000));
    assert_eq!(entry.test_str.as_deref(), Some("9"));

    // Remove returns the removed document
    let entry = docs
        .find_and_modify(FindAndModify::new(Filter::all()).sort(Sort::desc("test_pk")).remove(true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.test_pk, 101);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 100);
}

#[tokio::test]
async fn test_find_and_modify_without_match() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 5).await.unwrap();

    let updated = docs
        .find_and_modify(
            FindAndModify::new(Field::new("test_pk").gt(10))
                .update(UpdateExpr::new().inc(doc! { "test_int": 1 })),
        )
        .await
        .unwrap();
    assert!(updated.is_none());

    let removed = docs
        .find_and_modify(FindAndModify::new(Field::new("test_pk").gt(10)).remove(true))
        .await
        .unwrap();
    assert!(removed.is_none());
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_find_and_modify_select() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 5).await.unwrap();

    let entry = docs
        .find_and_modify(FindAndModify::new(Filter::all()).sort(Sort::asc("test_int")))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(entry.document(), &test_doc(0));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_find_and_modify_rejects_conflicting_requests() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 5).await.unwrap();

    let err = docs
        .find_and_modify(
            FindAndModify::new(Filter::all())
                .update(UpdateExpr::new().set(doc! { "test_int": 1 }))
                .remove(true),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));

    let err = docs
        .find_and_modify(FindAndModify::new(Field::new("test_pk").eq(50)).upsert(true))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));

    assert_eq!(docs.count(Filter::all()).await.unwrap(), 5);
}
