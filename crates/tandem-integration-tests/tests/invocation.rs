//! Integration tests for invocation and completion delivery.
//!
//! Runtime faults arrive through the completion callback, the callback fires
//! exactly once per call, and concurrent calls complete independently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tandem_bridge::{BridgeError, ErrorKind, HostLoop, HostValue};
use tandem_test::{
    ASYNC_LAMBDA, DELAYED_CLASS, STARTUP_CLASS, THROWING_CLASS, THROWING_SYNC_CLASS,
    call_and_wait, init_test_logging, script_bridge, script_builder,
};

#[tokio::test]
async fn test_guest_exception_reaches_callback() {
    init_test_logging();
    let bridge = script_bridge().unwrap();
    // Construction succeeds; the fault only happens when the method runs.
    let func = bridge.func(THROWING_CLASS).unwrap();

    let err = call_and_wait(&func, HostValue::Null).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RuntimeError));
    assert_eq!(err.to_string(), "Test error");
    let BridgeError::Runtime { exception_type, .. } = &err else {
        panic!("expected a runtime error, got {err:?}");
    };
    assert_eq!(exception_type.as_deref(), Some("System.Exception"));

    let value = err.to_host_value();
    assert_eq!(
        value.get("exceptionType").and_then(HostValue::as_str),
        Some("System.Exception")
    );
}

#[tokio::test]
async fn test_sync_guest_exception_reaches_callback() {
    let bridge = script_bridge().unwrap();
    let func = bridge.func(THROWING_SYNC_CLASS).unwrap();
    assert!(!func.is_asynchronous());
    let err = func.invoke(HostValue::Null).await.unwrap_err();
    assert_eq!(err.to_string(), "Sync error");
}

#[tokio::test]
async fn test_callback_fires_exactly_once() {
    let bridge = script_bridge().unwrap();
    let func = bridge.func(ASYNC_LAMBDA).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));

    let (tx, rx) = tokio::sync::oneshot::channel();
    let counter = Arc::clone(&fired);
    func.call("once", move |result| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(result);
    });
    assert_eq!(rx.await.unwrap().unwrap(), HostValue::from("Hello, once"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_complete_independently() {
    let bridge = script_bridge().unwrap();
    let func = bridge.func(DELAYED_CLASS).unwrap();

    let names: Vec<String> = (0..16).map(|i| format!("caller-{i}")).collect();
    let results = join_all(names.iter().map(|name| func.invoke(name.as_str()))).await;

    for (name, result) in names.iter().zip(results) {
        assert_eq!(result.unwrap(), HostValue::from(format!("Hello, {name}")));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_functions_share_a_bridge_across_tasks() {
    let bridge = script_bridge().unwrap();
    let greeter = bridge.func(STARTUP_CLASS).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let greeter = greeter.clone();
            tokio::spawn(async move { greeter.call_async(format!("task {i}")).await })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(
            handle.await.unwrap().unwrap(),
            HostValue::from(format!("Hello, task {i}"))
        );
    }
}

#[tokio::test]
async fn test_host_loop_runs_completions_when_pumped() {
    let host = HostLoop::new();
    let bridge = script_builder().dispatch(host.clone()).build().unwrap();
    let func = bridge.func(DELAYED_CLASS).unwrap();
    let thrower = bridge.func(THROWING_CLASS).unwrap();

    let delivered = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b"] {
        let delivered = Arc::clone(&delivered);
        func.call(name, move |result| {
            delivered.lock().unwrap().push(result.map_err(|e| e.to_string()));
        });
    }
    let errors = Arc::clone(&delivered);
    thrower.call(HostValue::Null, move |result| {
        errors.lock().unwrap().push(result.map_err(|e| e.to_string()));
    });

    assert_eq!(host.outstanding(), 3);
    assert!(delivered.lock().unwrap().is_empty());

    host.run_until_idle().await;
    assert_eq!(host.outstanding(), 0);

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 3);
    assert!(delivered.contains(&Ok(HostValue::from("Hello, a"))));
    assert!(delivered.contains(&Ok(HostValue::from("Hello, b"))));
    assert!(delivered.contains(&Err("Test error".to_owned())));
}

#[tokio::test]
async fn test_host_loop_survives_a_panicking_callback() {
    let host = HostLoop::new();
    let bridge = script_builder().dispatch(host.clone()).build().unwrap();
    let func = bridge.func(STARTUP_CLASS).unwrap();

    func.call("boom", |_| panic!("callback failed"));
    let pumped = std::panic::AssertUnwindSafe(host.run_until_idle())
        .catch_unwind()
        .await;
    assert!(pumped.is_err());
    assert_eq!(host.outstanding(), 0);

    let (tx, rx) = std::sync::mpsc::channel();
    func.call("again", move |result| {
        let _ = tx.send(result);
    });
    tokio::time::timeout(Duration::from_secs(10), host.run_until_idle())
        .await
        .unwrap();
    assert_eq!(
        rx.try_recv().unwrap().unwrap(),
        HostValue::from("Hello, again")
    );
}

#[test]
fn test_call_without_a_runtime() {
    let bridge = script_bridge().unwrap();
    let func = bridge.func(DELAYED_CLASS).unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    func.call("worker", move |result| {
        let _ = tx.send(result);
    });
    let result = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
    assert_eq!(result, HostValue::from("Hello, worker"));
}
