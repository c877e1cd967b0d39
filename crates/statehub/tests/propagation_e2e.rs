//! End-to-end propagation scenarios through the public surface.
//!
//! Covered properties:
//!
//! 1. A subscriber is notified exactly once per batch that touches a key it
//!    tracks, and never for batches touching only untracked keys.
//! 2. Two subscribers tracking the same key are both notified by either
//!    one's write.
//! 3. Detach is idempotent and silences the handle.
//! 4. Initialize/set/get round-trips.
//! 5. Pending values delay notification until resolution; failures and
//!    timeouts abort the batch atomically.
//! 6. The write-origin trace records every batch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use statehub::{CommitError, CommitOptions, GlobalStore, SubscriberHandle, Update};

fn counting(store: &GlobalStore, label: &str) -> (Arc<SubscriberHandle>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    let handle = store.attach_labeled(label, move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    (handle, count)
}

fn ready(key: &str, value: Value) -> (String, Update) {
    (key.to_string(), Update::Ready(value))
}

#[tokio::test]
async fn tracked_key_notifies_exactly_once_per_batch() {
    let store = GlobalStore::with_initial([("k".to_string(), json!(0))]);
    let (handle, renders) = counting(&store, "reader");
    store.view(&handle).read("k");

    store.set_state(&handle, [ready("k", json!(1))]).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    store.set_state(&handle, [ready("k", json!(2))]).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 2);

    // A batch with several tracked keys still notifies once.
    store.view(&handle).read("j");
    store
        .set_state(&handle, [ready("k", json!(3)), ready("j", json!(4))])
        .await
        .unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn untracked_batch_notifies_nothing() {
    let store = GlobalStore::new();
    let (handle, renders) = counting(&store, "reader");
    store.view(&handle).read("k");

    store.set_state(&handle, [ready("other", json!(1))]).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 0);
    assert_eq!(store.get_state().get("other"), Some(&json!(1)));
}

#[tokio::test]
async fn shared_key_notifies_both_readers() {
    let store = GlobalStore::with_initial([("k".to_string(), json!(0))]);
    let (h1, r1) = counting(&store, "first");
    let (h2, r2) = counting(&store, "second");
    store.view(&h1).read("k");
    store.view(&h2).read("k");

    store.set_state(&h1, [ready("k", json!(1))]).await.unwrap();
    assert_eq!(r1.load(Ordering::SeqCst), 1);
    assert_eq!(r2.load(Ordering::SeqCst), 1);

    store.set_state(&h2, [ready("k", json!(2))]).await.unwrap();
    assert_eq!(r1.load(Ordering::SeqCst), 2);
    assert_eq!(r2.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mixed_batch_reaches_each_interested_reader() {
    let store = GlobalStore::with_initial([
        ("x".to_string(), json!(0)),
        ("y".to_string(), json!(0)),
    ]);
    let (h1, r1) = counting(&store, "x-reader");
    let (h2, r2) = counting(&store, "y-reader");
    store.view(&h1).read("x");
    store.view(&h2).read("y");

    store
        .set_state(&h1, [ready("x", json!(10)), ready("y", json!(20))])
        .await
        .unwrap();

    assert_eq!(r1.load(Ordering::SeqCst), 1);
    assert_eq!(r2.load(Ordering::SeqCst), 1);
    let state = store.get_state();
    assert_eq!(state["x"], json!(10));
    assert_eq!(state["y"], json!(20));
}

#[tokio::test]
async fn detach_twice_is_safe_and_silences() {
    let store = GlobalStore::with_initial([("k".to_string(), json!(0))]);
    let (reader, renders) = counting(&store, "reader");
    let (writer, _) = counting(&store, "writer");
    store.view(&reader).read("k");

    store.detach(reader.id());
    store.detach(reader.id());

    store.set_state(&writer, [ready("k", json!(1))]).await.unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initialize_and_set_state_round_trip() {
    let store = GlobalStore::new();
    store.initialize([("a".to_string(), json!(1))]);
    assert_eq!(store.get_state(), HashMap::from([("a".to_string(), json!(1))]));

    let handle = store.attach(|| {});
    store.set_state(&handle, [ready("a", json!(2))]).await.unwrap();
    assert_eq!(store.get_state(), HashMap::from([("a".to_string(), json!(2))]));
}

#[tokio::test]
async fn pending_value_notifies_after_resolution_only() {
    let store = GlobalStore::with_initial([("a".to_string(), json!(0))]);
    let (reader, renders) = counting(&store, "reader");
    store.view(&reader).read("a");

    let (tx, rx) = tokio::sync::oneshot::channel::<Value>();
    let commit = {
        let store = store.clone();
        let reader = Arc::clone(&reader);
        tokio::spawn(async move {
            store
                .set_state(
                    &reader,
                    [(
                        "a".to_string(),
                        Update::pending(async move {
                            rx.await.map_err(|e| Box::new(e) as statehub::BoxError)
                        }),
                    )],
                )
                .await
        })
    };

    // Resolution has not happened: no notification, no write.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(renders.load(Ordering::SeqCst), 0);
    assert_eq!(store.get_state()["a"], json!(0));

    tx.send(json!(5)).unwrap();
    commit.await.unwrap().unwrap();

    assert_eq!(store.get_state()["a"], json!(5));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_pending_value_aborts_the_whole_batch() {
    let store = GlobalStore::with_initial([("a".to_string(), json!(0))]);
    let (reader, renders) = counting(&store, "reader");
    store.view(&reader).read("a");
    store.view(&reader).read("b");

    let err = store
        .set_state(
            &reader,
            [
                ready("a", json!(1)),
                (
                    "b".to_string(),
                    Update::pending(async { Err::<Value, _>("fetch failed".into()) }),
                ),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CommitError::PendingValue { ref key, .. } if key == "b"));
    // Atomic: the ready key did not land either, and nobody re-rendered.
    assert_eq!(store.get_state()["a"], json!(0));
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_pending_value_times_out() {
    let store = GlobalStore::new();
    let handle = store.attach(|| {});

    let err = store
        .set_state_with(
            &handle,
            [(
                "slow".to_string(),
                Update::pending(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!(1))
                }),
            )],
            CommitOptions::with_timeout(Duration::from_millis(10)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CommitError::Timeout { ref key, .. } if key == "slow"));
    assert!(store.get_state().get("slow").is_none());
}

#[tokio::test]
async fn concurrent_pending_values_all_land_before_notification() {
    let store = GlobalStore::new();
    let (reader, renders) = counting(&store, "reader");
    store.view(&reader).read("x");
    store.view(&reader).read("y");

    store
        .set_state(
            &reader,
            [
                (
                    "x".to_string(),
                    Update::pending(async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(json!("slow"))
                    }),
                ),
                (
                    "y".to_string(),
                    Update::pending(async { Ok(json!("fast")) }),
                ),
            ],
        )
        .await
        .unwrap();

    // One notification, with both keys already visible when it fired.
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    let state = store.get_state();
    assert_eq!(state["x"], json!("slow"));
    assert_eq!(state["y"], json!("fast"));
}

#[tokio::test]
async fn trace_sink_captures_every_batch() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = statehub::WriteTraceConfig::enabled_file(file.path()).with_backtrace(false);
    let sink = statehub::WriteTraceSink::from_config(&config).unwrap().unwrap();
    let store = GlobalStore::new().with_trace_sink(sink);

    let handle = store.attach_labeled("settings", || {});
    store
        .set_state(&handle, [ready("a", json!(1)), ready("b", json!(2))])
        .await
        .unwrap();
    store.view(&handle).write("c", json!(3));

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let records: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["label"], "settings");
    assert_eq!(records[0]["keys"], json!(["a", "b"]));
    assert_eq!(records[1]["keys"], json!(["c"]));
}
