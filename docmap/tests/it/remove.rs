use super::helpers::*;
use docmap::prelude::*;

#[tokio::test]
async fn test_remove() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 100).await.unwrap();

    let result = docs.remove(Field::new("test_pk").lt(50), true).await.unwrap();
    assert_eq!(result.removed, 50);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 50);

    let result = docs.remove(Field::new("test_pk").gte(50), false).await.unwrap();
    assert_eq!(result.removed, 1);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 49);
}

#[tokio::test]
async fn test_remove_with_compound_filter() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();
    feed_data(&docs, 20).await.unwrap();

    let filter = Field::new("test_pk")
        .lt(5)
        .or(Field::new("test_pk").any_of([10, 11, 12]))
        .and(Field::new("test_pk").ne(0));

    let result = docs.remove(filter, true).await.unwrap();
    assert_eq!(result.removed, 7);
    assert_eq!(docs.count(Filter::all()).await.unwrap(), 13);
}

#[tokio::test]
async fn test_remove_nothing() {
    let store = create_test_store().await;
    let docs = store.typed_collection::<TestDoc>();

    let result = docs.remove(Filter::all(), true).await.unwrap();

    assert_eq!(result.removed, 0);
    assert!(result.acknowledged);
}
