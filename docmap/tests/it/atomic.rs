use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_update_one() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 100).await.unwrap();

    for mut entry in load_all(&docs).await {
        let pk = entry.test_pk;

        if pk < 10 {
            entry.set(&docs, doc! { "test_int": pk * pk }).await.unwrap();
            assert_eq!(entry.test_int, Some(pk * pk));
        } else if pk < 20 {
            entry.unset(&docs, doc! { "test_int": true }).await.unwrap();
            assert_eq!(entry.test_int, None);
        } else if pk < 30 {
            let old = entry.test_int.unwrap();
            entry.inc(&docs, doc! { "test_int": 2 }).await.unwrap();
            assert_eq!(entry.test_int, Some(old + 2));
        } else if pk < 40 {
            entry.push(&docs, doc! { "test_list": 1000 }).await.unwrap();
            assert!(entry.test_list.contains(&1000));
        } else if pk < 50 {
            entry.pull(&docs, doc! { "test_list": pk }).await.unwrap();
            assert!(!entry.test_list.contains(&pk));
        } else {
            entry.add_to_set(&docs, doc! { "test_list": pk * pk }).await.unwrap();
            assert!(entry.test_list.contains(&(pk * pk)));
        }
    }

    let mut counts = [0; 6];
    for entry in load_all(&docs).await {
        let pk = entry.test_pk;

        if entry.test_int == Some(pk * pk) {
            counts[0] += 1;
        } else if entry.test_int.is_none() {
            counts[1] += 1;
        } else if entry.test_int == Some(pk + 2) {
            counts[2] += 1;
        } else if entry.test_list.contains(&1000) {
            counts[3] += 1;
        } else if entry.test_list.is_empty() {
            counts[4] += 1;
        } else if entry.test_list.contains(&(pk * pk)) {
            counts[5] += 1;
        }
    }
    assert_eq!(counts, [10, 10, 10, 10, 10, 50]);

    // Nothing stored under this key, so the local value is left alone
    let mut entry = Instance::new(TestDoc { test_pk: 101, test_int: Some(101), ..Default::default() });
    let result = entry.set(&docs, doc! { "test_int": 12 }).await.unwrap();
    assert_eq!(result.matched, 0);
    assert_eq!(entry.test_int, Some(101));

    let result = entry
        .update_one(&docs, UpdateExpr::new().set(doc! { "test_int": 12 }), true)
        .await
        .unwrap();
    assert_eq!(result.affected(), 1);
    assert_eq!(entry.test_int, Some(12));
    assert!(!entry.is_new());

    // A fresh instance whose key is stored picks up the change
    let mut entry = Instance::new(bare_doc(1));
    entry.set(&docs, doc! { "test_int": -1 }).await.unwrap();
    assert_eq!(entry.test_int, Some(-1));
}

#[tokio::test]
async fn test_local_and_stored_state_agree() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 3).await.unwrap();

    let mut entry = docs.get(1_i64).await.unwrap().unwrap();
    entry.push(&docs, doc! { "test_list": { "$each": [5, 6] } }).await.unwrap();
    entry.add_to_set(&docs, doc! { "test_list": 5 }).await.unwrap();
    entry.pull(&docs, doc! { "test_list": 1 }).await.unwrap();
    entry.inc(&docs, doc! { "test_int": -4 }).await.unwrap();

    let stored = docs.get(1_i64).await.unwrap().unwrap();
    assert_eq!(entry.document(), stored.document());
    assert_eq!(stored.test_list, vec![5, 6]);
    assert_eq!(stored.test_int, Some(-3));
}

#[tokio::test]
async fn test_inc_on_absent_field() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let mut entry = Instance::new(bare_doc(8));
    entry.save(&docs, true).await.unwrap();
    entry.inc(&docs, doc! { "test_int": 3 }).await.unwrap();

    assert_eq!(entry.test_int, Some(3));
    assert_eq!(docs.get(8_i64).await.unwrap().unwrap().test_int, Some(3));
}

#[tokio::test]
async fn test_failed_operator_leaves_instance_unchanged() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 2).await.unwrap();

    let mut entry = docs.get(0_i64).await.unwrap().unwrap();
    let err = entry.inc(&docs, doc! { "test_str": 1 }).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));
    assert_eq!(entry.document(), &test_doc(0));
    assert_eq!(docs.get(0_i64).await.unwrap().unwrap().document(), &test_doc(0));
}

#[tokio::test]
async fn test_operator_the_type_cannot_hold_is_rejected() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 2).await.unwrap();

    let mut entry = docs.get(0_i64).await.unwrap().unwrap();
    let err = entry.set(&docs, doc! { "test_int": "not a number" }).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)));
    assert_eq!(entry.test_int, Some(0));
    assert_eq!(docs.get(0_i64).await.unwrap().unwrap().document(), &test_doc(0));
    assert_eq!(docs.count(Field::new("test_int").eq("not a number")).await.unwrap(), 0);
}
