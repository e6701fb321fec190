use bson::doc;
use docbridge::prelude::*;

#[tokio::test]
async fn test_dispatchers_wait_for_the_connection() {
    let bootstrap = Bootstrap::<InMemoryStore>::new();
    let (dispatcher, mut callbacks) = bootstrap.dispatcher();

    assert_eq!(
        dispatcher.count(doc! { "collection": "players" }, None).await.unwrap_err(),
        BridgeError::NotConnected
    );

    bootstrap.connect(InMemoryStore::builder(), "local").await.unwrap();

    assert!(dispatcher.is_connected());
    let envelope = dispatcher
        .count(doc! { "collection": "players" }, None)
        .await
        .unwrap();
    assert_eq!(envelope.reply(), Some(&Reply::Counted(0)));
    assert_eq!(callbacks.run_pending(), 0);
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let bootstrap = Bootstrap::new();

    bootstrap.connect(InMemoryStore::builder(), "local").await.unwrap();
    let err = bootstrap.connect(InMemoryStore::builder(), "local").await.unwrap_err();

    assert_eq!(err, BridgeError::AlreadyConnected);
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
}

#[tokio::test]
async fn test_dispatchers_share_one_store() {
    let bootstrap = Bootstrap::new();
    bootstrap.connect(InMemoryStore::builder(), "local").await.unwrap();

    let (writer, _) = bootstrap.dispatcher();
    let (reader, _) = bootstrap.dispatcher();

    writer
        .insert_one(doc! { "collection": "players", "document": { "name": "a" } }, None)
        .await
        .unwrap();

    let counted = reader
        .count(doc! { "collection": "players" }, None)
        .await
        .unwrap();
    assert_eq!(counted.reply(), Some(&Reply::Counted(1)));
}

#[tokio::test]
async fn test_policy_applies_to_new_dispatchers() {
    let bootstrap = Bootstrap::<InMemoryStore>::new().with_policy(FailurePolicy::callback_only());
    let (dispatcher, _) = bootstrap.dispatcher();

    assert_eq!(dispatcher.policy(), FailurePolicy::callback_only());
    assert!(bootstrap.connection().handle().is_err());
}

#[test]
fn test_config_rejects_unset_values() {
    let err = BridgeConfig::from_lookup("MONGODB", |key| match key {
        "MONGODB_URL" => Some("unknown".to_string()),
        _ => Some("game".to_string()),
    })
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(err.to_string().contains("MONGODB_URL"));
}
