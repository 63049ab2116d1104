//! End-to-end bridge lifecycle scenarios.

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use serde_json::json;

use cadbridge::{Bridge, BridgeConfig, BridgeError, EntityKind};

use crate::common::{HostLoop, MockDesign, ProbeHandle};

fn test_config() -> BridgeConfig {
    BridgeConfig {
        default_task_timeout_ms: 5_000,
        max_queue_depth: 64,
        scheduler_tick_interval_ms: 5,
        max_tasks_per_tick: 0,
    }
}

#[test]
fn submit_execute_wait_roundtrip() {
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    bridge.register_handler("create_box", |doc: &mut MockDesign, registry, params| {
        doc.features_created += 1;
        let id = registry.register(
            EntityKind::Body,
            ProbeHandle::live(),
            params["name"].as_str(),
        );
        Ok(json!({ "body_id": id }))
    });

    let host = HostLoop::spawn(bridge);
    let handle = host.handle();

    let result = handle
        .execute("create_box", json!({"name": "plate", "width": 4.0}))
        .expect("execute");
    assert!(result.success);
    assert_eq!(result.payload.expect("payload")["body_id"], "plate");
}

#[test]
fn handler_fault_is_isolated_from_following_task() {
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    bridge.register_handler("create_box", |_doc, _registry, _params| {
        anyhow::bail!("profile self-intersects")
    });
    bridge.register_handler("create_cylinder", |_doc, _registry, _params| {
        Ok(json!({"body_id": "body_0"}))
    });

    let host = HostLoop::spawn(bridge);
    let handle = host.handle();

    let failing = handle.submit("create_box", json!({})).expect("submit");
    let following = handle.submit("create_cylinder", json!({})).expect("submit");

    let result = handle.wait(failing).expect("result");
    assert!(!result.success);
    assert_eq!(result.error.expect("error").kind, "execution_error");

    // The loop is not stuck: the next task still executes and succeeds.
    let result = handle.wait(following).expect("result");
    assert!(result.success);
}

#[test]
fn shutdown_resolves_pending_and_rejects_new_submissions() {
    // No host loop: nothing ever drains the queue.
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    let handle = bridge.handle();

    let pending = handle.submit("never_runs", json!({})).expect("submit");
    bridge.shutdown();

    let result = handle.wait(pending).expect("result");
    assert!(!result.success);
    assert_eq!(result.error.expect("error").kind, "shutdown");

    let err = handle.submit("too_late", json!({})).unwrap_err();
    assert!(matches!(err, BridgeError::Shutdown));
}

#[test]
fn poller_drives_ticks_through_the_host() {
    // The tick driver only *requests* scheduling; the host thread performs
    // the actual drain, exactly as a real cooperative host would.
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    bridge.register_handler("ping", |_doc, _registry, _params| Ok(json!("pong")));
    let handle = bridge.handle();

    let (tick_tx, tick_rx) = mpsc::channel::<()>();
    assert!(bridge.start(move || tick_tx.send(()).is_ok()));

    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let host_done = done.clone();
    let host = thread::spawn(move || {
        while !host_done.load(Ordering::SeqCst) {
            if tick_rx.recv_timeout(Duration::from_millis(50)).is_ok() {
                bridge.tick();
            }
        }
        bridge
    });

    let result = handle.execute("ping", json!({})).expect("execute");
    assert_eq!(result.payload.expect("payload"), json!("pong"));

    done.store(true, Ordering::SeqCst);
    let mut bridge = host.join().expect("host thread");
    bridge.shutdown();
}

#[test]
fn dropping_the_bridge_shuts_it_down() {
    let bridge = Bridge::new(test_config(), MockDesign::default());
    let handle = bridge.handle();
    let pending = handle.submit("never_runs", json!({})).expect("submit");

    drop(bridge);

    let result = handle.wait(pending).expect("result");
    assert_eq!(result.error.expect("error").kind, "shutdown");
}

#[test]
fn concurrent_producers_all_get_their_own_result() {
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    bridge.register_handler("echo", |_doc, _registry, params| Ok(params.clone()));

    let host = HostLoop::spawn(bridge);
    let producers: Vec<_> = (0..8)
        .map(|n| {
            let handle = host.handle();
            thread::spawn(move || {
                for i in 0..20 {
                    let tag = n * 100 + i;
                    let result = handle
                        .execute("echo", json!({ "tag": tag }))
                        .expect("execute");
                    assert!(result.success);
                    // Each waiter observes exactly its own result.
                    assert_eq!(result.payload.expect("payload")["tag"], tag);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer thread");
    }
}

#[test]
fn poller_stops_when_driver_reports_host_gone() {
    let mut bridge = Bridge::new(test_config(), MockDesign::default());
    let requests = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let counter = requests.clone();
    bridge.start(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        false
    });

    thread::sleep(Duration::from_millis(60));
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    bridge.shutdown();
}
