/*
    Common operations over every supported value type

    Tests:
    1. fetch-or-add, fetch and compare-exchange for each primitive and a custom type
    2. operations on unknown keys
    3. type mismatches between primitives sharing a representation
*/

use crate::core_client::ClientDataStore;
use crate::core_store::ResultCode;
use crate::core_types::{DataStoreType, Name, Text};
use crate::test_utils::*;
use std::fmt::Debug;

async fn exercise<T>(client: &ClientDataStore, key: &str, initial: T, next: T)
where
    T: DataStoreType + Clone + PartialEq + Debug + Sync,
{
    assert_value(client.fetch_or_add(key, &initial).await, ResultCode::Added, &initial);
    assert_value(client.fetch_or_add(key, &next).await, ResultCode::Fetched, &initial);
    assert_value(client.fetch_as::<T>(key), ResultCode::Fetched, &initial);

    let exchanged = client.compare_exchange(key, &initial, &next).await;
    assert_eq!(exchanged.version(), Some(2));
    assert_value(exchanged, ResultCode::Exchanged, &next);

    // Stale expected value yields the current one
    assert_value(client.compare_exchange(key, &initial, &next).await, ResultCode::Fetched, &next);
    assert_value(client.fetch_as::<T>(key), ResultCode::Fetched, &next);
}

#[tokio::test]
async fn test_common_operations_for_all_types() {
    let cluster = TestCluster::builder().clients(1).build().await;
    let client = cluster.client(0);

    exercise(client, "Int8", i8::MIN, i8::MAX).await;
    exercise(client, "Int16", -300i16, 300i16).await;
    exercise(client, "Int32", -70_000i32, 70_000i32).await;
    exercise(client, "Int64", i64::MIN, i64::MAX).await;
    exercise(client, "UInt8", 0u8, u8::MAX).await;
    exercise(client, "UInt16", 1u16, u16::MAX).await;
    exercise(client, "UInt32", 2u32, u32::MAX).await;
    exercise(client, "UInt64", 3u64, u64::MAX).await;
    exercise(client, "Float", 1.5f32, -2.25f32).await;
    exercise(client, "Double", 0.125f64, 1e300f64).await;
    exercise(client, "Bool", false, true).await;
    exercise(client, "Name", Name::new("Alpha"), Name::new("Beta")).await;
    exercise(client, "String", "first".to_string(), "second".to_string()).await;
    exercise(client, "Text", Text::new("Hello"), Text::new("World")).await;
    exercise(
        client,
        "Custom",
        CustomTypeTest::new(1, 2, 3.0),
        CustomTypeTest::new(-1, -2, -3.0),
    )
    .await;

    assert_eq!(client.cache_size(), 15);
}

#[tokio::test]
async fn test_unknown_key() {
    let cluster = TestCluster::builder().clients(1).build().await;
    let client = cluster.client(0);

    assert_code(client.fetch_as::<u32>("Missing"), ResultCode::NotFound);
    assert_code(client.compare_exchange("Missing", &1u32, &2u32).await, ResultCode::NotFound);
    assert_eq!(client.cache_size(), 0);
}

#[tokio::test]
async fn test_type_mismatch_between_integer_types() {
    let cluster = TestCluster::builder().clients(2).build().await;
    let (a, b) = (cluster.client(0), cluster.client(1));

    assert_code(a.fetch_or_add("Value", &8u8).await, ResultCode::Added);

    // Same wrapper shape, different declared type
    assert_code(a.fetch_or_add("Value", &8i16).await, ResultCode::TypeMismatch);
    assert_code(a.fetch_as::<u16>("Value"), ResultCode::TypeMismatch);
    assert_code(a.compare_exchange("Value", &8i8, &9i8).await, ResultCode::TypeMismatch);

    // The other client learned the key through replication
    assert_code(b.fetch_as::<i16>("Value"), ResultCode::TypeMismatch);
    assert_value(b.fetch_as::<u8>("Value"), ResultCode::Fetched, &8);
}

#[tokio::test]
async fn test_type_mismatch_reported_by_server() {
    let cluster = TestCluster::builder().clients(2).replication(false).build().await;
    let (a, b) = (cluster.client(0), cluster.client(1));

    assert_code(a.fetch_or_add("Value", &String::from("text")).await, ResultCode::Added);

    // b has no cached view; only the server knows the type
    assert_code(b.fetch_or_add("Value", &Name::new("text")).await, ResultCode::TypeMismatch);
    assert_eq!(b.cache_size(), 0);
}
