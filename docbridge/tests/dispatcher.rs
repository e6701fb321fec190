//! End-to-end tests of the dispatcher against the in-memory store.

use std::sync::{Arc, Mutex};

use bson::{Bson, Document, doc, oid::ObjectId};
use docbridge::prelude::*;
use serde_json::json;

type Seen = Arc<Mutex<Vec<ResultEnvelope>>>;

fn connected() -> (Dispatcher<InMemoryStore>, CallbackLoop) {
    Dispatcher::with_callback_loop(Arc::new(ConnectionState::connected(InMemoryStore::new())))
}

fn recorder() -> (Seen, Option<Callback>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    (seen, callback(move |envelope| sink.lock().unwrap().push(envelope)))
}

fn delivered(seen: &Seen) -> Vec<Vec<Bson>> {
    seen.lock()
        .unwrap()
        .iter()
        .cloned()
        .map(ResultEnvelope::into_args)
        .collect()
}

async fn seed(dispatcher: &Dispatcher<InMemoryStore>, documents: Vec<Document>) -> Vec<String> {
    let envelope = dispatcher
        .insert(InsertParams::new("players", documents), None)
        .await
        .unwrap();

    match envelope.reply() {
        Some(Reply::Inserted { ids, .. }) => ids.clone(),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_insert_returns_distinct_ids_usable_as_filters() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    dispatcher
        .insert(
            doc! { "collection": "players", "documents": [{ "name": "a" }, { "name": "b" }] },
            cb,
        )
        .await
        .unwrap();
    assert_eq!(callbacks.run_pending(), 1);

    let args = delivered(&seen).remove(0);
    assert_eq!(args[0], Bson::Boolean(true));
    assert_eq!(args[1], Bson::Int64(2));

    let ids = match &args[2] {
        Bson::Array(ids) => ids.clone(),
        other => panic!("expected id array, got {other:?}"),
    };
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    for (id, name) in ids.iter().zip(["a", "b"]) {
        let hex = id.as_str().unwrap();
        assert!(ObjectId::parse_str(hex).is_ok());

        let found = dispatcher
            .find(doc! { "collection": "players", "query": { "_id": hex } }, None)
            .await
            .unwrap();

        assert_eq!(
            found.reply(),
            Some(&Reply::Documents(vec![doc! { "_id": hex, "name": name }]))
        );
    }
}

#[tokio::test]
async fn test_insert_one_has_the_insert_shape() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    dispatcher
        .insert_one(doc! { "collection": "players", "document": { "name": "a" } }, cb)
        .await
        .unwrap();
    callbacks.run_pending();

    let args = delivered(&seen).remove(0);
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], Bson::Boolean(true));
    assert_eq!(args[1], Bson::Int64(1));
    assert!(matches!(&args[2], Bson::Array(ids) if ids.len() == 1));
}

#[tokio::test]
async fn test_insert_keeps_caller_supplied_ids() {
    let (dispatcher, _callbacks) = connected();
    let oid = ObjectId::new();

    let ids = seed(&dispatcher, vec![doc! { "_id": oid, "name": "a" }, doc! { "_id": "custom" }]).await;

    assert_eq!(ids, vec![oid.to_hex(), "custom".to_string()]);
}

#[tokio::test]
async fn test_update_reports_modified_count() {
    let (dispatcher, mut callbacks) = connected();
    seed(&dispatcher, vec![doc! { "name": "a" }, doc! { "name": "b" }]).await;
    let (seen, cb) = recorder();

    dispatcher
        .update(
            doc! { "collection": "players", "query": { "name": "a" }, "update": { "$set": { "level": 2 } } },
            cb,
        )
        .await
        .unwrap();
    callbacks.run_pending();

    assert_eq!(delivered(&seen), vec![vec![Bson::Boolean(true), Bson::Int64(1)]]);
}

#[tokio::test]
async fn test_update_one_touches_a_single_document() {
    let (dispatcher, _callbacks) = connected();
    seed(&dispatcher, vec![doc! { "name": "a" }, doc! { "name": "a" }]).await;

    let one = dispatcher
        .update_one(
            UpdateParams::new("players", doc! { "name": "a" }, doc! { "$inc": { "level": 1 } }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(one.reply(), Some(&Reply::Modified(1)));

    let many = dispatcher
        .update(
            UpdateParams::new("players", doc! { "name": "a" }, doc! { "$inc": { "level": 1 } }),
            None,
        )
        .await
        .unwrap();
    assert_eq!(many.reply(), Some(&Reply::Modified(2)));
}

#[tokio::test]
async fn test_update_by_hex_id() {
    let (dispatcher, _callbacks) = connected();
    let ids = seed(&dispatcher, vec![doc! { "name": "a" }, doc! { "name": "b" }]).await;
    let target = ids[1].clone();

    let updated = dispatcher
        .update_one(
            doc! {
                "collection": "players",
                "query": { "_id": { "$in": [target] } },
                "update": { "$set": { "name": "c" } },
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.reply(), Some(&Reply::Modified(1)));

    let counted = dispatcher
        .count(CountParams::new("players", doc! { "name": "c" }), None)
        .await
        .unwrap();
    assert_eq!(counted.reply(), Some(&Reply::Counted(1)));
}

#[tokio::test]
async fn test_count_on_empty_collection_is_zero() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    dispatcher
        .count(doc! { "collection": "players" }, cb)
        .await
        .unwrap();
    callbacks.run_pending();

    assert_eq!(delivered(&seen), vec![vec![Bson::Boolean(true), Bson::Int64(0)]]);
}

#[tokio::test]
async fn test_find_one_matches_find_with_limit_one() {
    let (dispatcher, _callbacks) = connected();
    seed(
        &dispatcher,
        vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }],
    )
    .await;

    let one = dispatcher
        .find_one(doc! { "collection": "players", "query": { "n": { "$gte": 2 } } }, None)
        .await
        .unwrap();
    let limited = dispatcher
        .find(
            doc! { "collection": "players", "query": { "n": { "$gte": 2 } }, "limit": 1 },
            None,
        )
        .await
        .unwrap();

    assert_eq!(one, limited);
    assert!(matches!(one.reply(), Some(Reply::Documents(docs)) if docs.len() == 1));
}

#[tokio::test]
async fn test_find_with_zero_limit_returns_everything() {
    let (dispatcher, _callbacks) = connected();
    seed(&dispatcher, vec![doc! { "n": 1 }, doc! { "n": 2 }]).await;

    let found = dispatcher
        .find(doc! { "collection": "players", "limit": 0 }, None)
        .await
        .unwrap();

    assert!(matches!(found.reply(), Some(Reply::Documents(docs)) if docs.len() == 2));
}

#[tokio::test]
async fn test_find_options_reach_the_store() {
    let (dispatcher, _callbacks) = connected();
    seed(&dispatcher, vec![doc! { "n": 1 }, doc! { "n": 3 }, doc! { "n": 2 }]).await;

    let found = dispatcher
        .find(
            doc! {
                "collection": "players",
                "options": { "sort": { "n": -1 }, "projection": { "_id": 0, "n": 1 } },
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        found.reply(),
        Some(&Reply::Documents(vec![doc! { "n": 3 }, doc! { "n": 2 }, doc! { "n": 1 }]))
    );
}

#[tokio::test]
async fn test_delete_and_delete_one() {
    let (dispatcher, _callbacks) = connected();
    seed(&dispatcher, vec![doc! { "team": "x" }, doc! { "team": "x" }, doc! { "team": "x" }]).await;

    let one = dispatcher
        .delete_one(DeleteParams::new("players", doc! { "team": "x" }), None)
        .await
        .unwrap();
    assert_eq!(one.reply(), Some(&Reply::Deleted(1)));

    let rest = dispatcher
        .delete(DeleteParams::new("players", doc! { "team": "x" }), None)
        .await
        .unwrap();
    assert_eq!(rest.reply(), Some(&Reply::Deleted(2)));
}

#[tokio::test]
async fn test_operations_before_connect_fail_without_callback() {
    let connection = Arc::new(ConnectionState::<InMemoryStore>::new());
    let (dispatcher, mut callbacks) = Dispatcher::with_callback_loop(connection);
    let (seen, cb) = recorder();

    assert!(!dispatcher.is_connected());

    let err = dispatcher
        .insert(doc! { "collection": "players", "documents": [{}] }, cb)
        .await
        .unwrap_err();

    assert_eq!(err, BridgeError::NotConnected);
    assert_eq!(err.to_string(), "Database connection not established");
    assert_eq!(callbacks.run_pending(), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_precondition_failures_skip_the_callback() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    let err = dispatcher.count(Bson::Null, cb).await.unwrap_err();
    assert_eq!(err, BridgeError::InvalidParams { operation: "count" });

    let (_, cb) = recorder();
    let err = dispatcher.find(doc! { "query": {} }, cb).await.unwrap_err();
    assert_eq!(err.to_string(), "find: invalid collection undefined");

    let (_, cb) = recorder();
    let err = dispatcher
        .delete(doc! { "collection": "system.users" }, cb)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidCollection { operation: "delete", .. }));

    let (_, cb) = recorder();
    let err = dispatcher
        .update_one(doc! { "collection": "players", "query": {} }, cb)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidField { operation: "updateOne", field: "update", .. }));

    assert_eq!(callbacks.run_pending(), 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_callback_runs_on_a_later_turn_exactly_once() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    dispatcher
        .count(doc! { "collection": "players" }, cb)
        .await
        .unwrap();

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(callbacks.pending(), 1);

    assert_eq!(callbacks.run_pending(), 1);
    assert_eq!(callbacks.run_pending(), 0);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_spawned_loop_delivers() {
    let (dispatcher, callbacks) = connected();
    let (sender, receiver) = tokio::sync::oneshot::channel();

    let runner = tokio::spawn(callbacks.run());

    dispatcher
        .count(
            doc! { "collection": "players" },
            callback(move |envelope| {
                let _ = sender.send(envelope.into_args());
            }),
        )
        .await
        .unwrap();

    assert_eq!(receiver.await.unwrap(), vec![Bson::Boolean(true), Bson::Int64(0)]);

    drop(dispatcher);
    runner.await.unwrap();
}

#[tokio::test]
async fn test_store_failure_is_returned_and_delivered() {
    let (dispatcher, mut callbacks) = connected();
    seed(&dispatcher, vec![doc! { "name": "a" }]).await;
    let (seen, cb) = recorder();

    let err = dispatcher
        .update(
            doc! { "collection": "players", "query": {}, "update": { "name": "b" } },
            cb,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Store { operation: "update", .. }));
    assert_eq!(err.kind(), ErrorKind::StoreOperation);

    callbacks.run_pending();
    let args = delivered(&seen).remove(0);
    assert_eq!(
        args,
        vec![
            Bson::Boolean(false),
            Bson::Document(doc! {
                "operation": "update",
                "kind": "store_operation",
                "message": err.to_string(),
            }),
        ]
    );
}

#[tokio::test]
async fn test_inc_overflow_fails_the_update() {
    let (dispatcher, mut callbacks) = connected();
    seed(&dispatcher, vec![doc! { "n": i64::MAX }]).await;
    let (seen, cb) = recorder();

    let err = dispatcher
        .update(
            doc! { "collection": "players", "query": {}, "update": { "$inc": { "n": 1_i64 } } },
            cb,
        )
        .await
        .unwrap_err();

    assert!(matches!(&err, BridgeError::Store { operation: "update", message } if message.contains("overflow")));

    callbacks.run_pending();
    assert!(seen.lock().unwrap()[0].error().is_some());

    let found = dispatcher
        .find(doc! { "collection": "players" }, None)
        .await
        .unwrap();
    assert!(matches!(found.reply(), Some(Reply::Documents(docs)) if docs[0].get_i64("n").unwrap() == i64::MAX));
}

#[tokio::test]
async fn test_callback_only_policy_returns_the_failed_envelope() {
    let (dispatcher, mut callbacks) = connected();
    let dispatcher = dispatcher.with_policy(FailurePolicy::callback_only());
    let oid = ObjectId::new();
    let (seen, cb) = recorder();

    dispatcher
        .insert(InsertParams::new("players", vec![doc! { "_id": oid }]), None)
        .await
        .unwrap();

    let envelope = dispatcher
        .insert(InsertParams::new("players", vec![doc! { "_id": oid }]), cb)
        .await
        .unwrap();

    assert!(!envelope.is_success());
    assert!(envelope.error().unwrap().to_string().contains("E11000"));

    callbacks.run_pending();
    assert_eq!(seen.lock().unwrap().as_slice(), &[envelope]);
}

#[tokio::test]
async fn test_call_routes_by_procedure_name() {
    let (dispatcher, mut callbacks) = connected();
    let (seen, cb) = recorder();

    let connected = dispatcher
        .call("isConnected".parse().unwrap(), Bson::Null, None)
        .await
        .unwrap();
    assert_eq!(connected, ProcedureOutput::Connected(true));

    let params = OperationParams::from_json(&json!({
        "collection": "players",
        "document": { "name": "a", "score": 10 },
    }))
    .unwrap();

    let output = dispatcher
        .call("insertOne".parse().unwrap(), params, cb)
        .await
        .unwrap();
    assert!(matches!(output, ProcedureOutput::Completed(envelope) if envelope.is_success()));

    callbacks.run_pending();
    let args = seen.lock().unwrap().remove(0).into_json_args();
    assert_eq!(args[0], json!(true));
    assert_eq!(args[1], json!(1));
    assert!(args[2].as_array().is_some_and(|ids| ids.len() == 1 && ids[0].is_string()));
}

#[tokio::test]
async fn test_every_procedure_is_callable() {
    let (dispatcher, _callbacks) = connected();

    for procedure in Procedure::ALL {
        let params = doc! {
            "collection": "players",
            "documents": [{ "n": 1 }],
            "document": { "n": 2 },
            "query": {},
            "update": { "$set": { "seen": true } },
        };

        assert!(dispatcher.call(procedure, params, None).await.is_ok(), "{procedure} failed");
    }
}
