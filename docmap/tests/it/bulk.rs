use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_bulk_commit_flushes_in_order() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let result = feed_data(&docs, 10).await.unwrap();

    assert!(result.acknowledged);
    assert_eq!(result.upserted_ids.len(), 10);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 10);
    assert!(!docs.is_bulk_active());
}

#[tokio::test]
async fn test_bulk_failure_discards_pending_writes() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let err = feed_data_and_fail(&docs, 10).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::Backend(_)));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 0);
    assert!(!docs.is_bulk_active());

    // The handle accepts a new scope afterwards
    feed_data(&docs, 3).await.unwrap();
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_writes_inside_scope_are_deferred() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let scope = docs.bulk().unwrap();
    assert!(docs.is_bulk_active());

    let mut entry = Instance::new(test_doc(1));
    let key = entry.save(&docs, true).await.unwrap();
    assert_eq!(key, Bson::Int64(1));
    assert!(entry.is_new());

    let result = docs
        .update(
            Field::new("test_pk").eq(1),
            UpdateExpr::new().set(doc! { "test_int": 5 }),
            UpdateOptions::default(),
        )
        .await
        .unwrap();
    assert!(!result.acknowledged);
    assert_eq!(result.affected(), 0);

    // Atomic operators in a scope leave the instance untouched
    let result = entry.inc(&docs, doc! { "test_int": 100 }).await.unwrap();
    assert!(!result.acknowledged);
    assert_eq!(entry.test_int, Some(1));

    assert_eq!(scope.pending(), 3);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 0);

    let result = scope.commit().await.unwrap();
    assert_eq!(result.inserted, 1);
    assert_eq!(result.matched, 2);

    let stored = docs.get(1_i64).await.unwrap().unwrap();
    assert_eq!(stored.test_int, Some(105));
}

#[tokio::test]
async fn test_nested_bulk_is_rejected() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let scope = docs.bulk().unwrap();
    let err = docs.bulk().unwrap_err();
    assert!(matches!(err, DocumentStoreError::BulkState(_)));

    // The outer scope is unaffected
    Instance::new(test_doc(1)).bulk_save(&docs).unwrap();
    scope.commit().await.unwrap();
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_bulk_save_requires_a_scope() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let err = Instance::new(test_doc(1)).bulk_save(&docs).unwrap_err();

    assert!(matches!(err, DocumentStoreError::BulkState(_)));
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_and_modify_inside_scope_is_rejected() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 3).await.unwrap();

    let scope = docs.bulk().unwrap();
    let err = docs
        .find_and_modify(FindAndModify::new(Filter::all()).remove(true))
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::BulkState(_)));
    assert_eq!(scope.abort(), 0);

    assert_eq!(docs.count(Filter::all()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_abort_and_drop_discard() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let scope = docs.bulk().unwrap();
    docs.insert(vec![test_doc(1), test_doc(2)]).await.unwrap();
    assert_eq!(scope.abort(), 2);
    assert!(!docs.is_bulk_active());

    {
        let _scope = docs.bulk().unwrap();
        docs.remove(Filter::all(), true).await.unwrap();
    }
    assert!(!docs.is_bulk_active());
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_handles_have_independent_buffers() {
    let store = create_test_store().await;
    let buffered = store.typed_collection::<TestDoc>();
    let direct = store.typed_collection::<TestDoc>();

    let scope = buffered.bulk().unwrap();
    Instance::new(test_doc(1)).bulk_save(&buffered).unwrap();

    let result = Instance::new(test_doc(2)).save(&direct, true).await;
    assert!(result.is_ok());
    assert!(!direct.is_bulk_active());
    assert_eq!(direct.count(Filter::all()).await.unwrap(), 1);

    scope.commit().await.unwrap();
    assert_eq!(direct.count(Filter::all()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_flush_stops_at_the_first_failure() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let scope = docs.bulk().unwrap();
    docs.insert(vec![test_doc(1)]).await.unwrap();
    docs.insert(vec![test_doc(1)]).await.unwrap();
    docs.insert(vec![test_doc(2)]).await.unwrap();

    let err = scope.commit().await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::WriteConflict(_, _)));
    assert!(!docs.is_bulk_active());

    // Writes before the failing one stay applied, writes after it never ran
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 1);
    assert!(docs.get(2_i64).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_commit() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let result = docs.bulk().unwrap().commit().await.unwrap();

    assert!(result.acknowledged);
    assert_eq!(result.affected(), 0);
}
