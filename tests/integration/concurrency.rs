//! Concurrency properties: FIFO execution, single-occupancy, caller
//! timeouts that abandon but never abort.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

use cadbridge::{Bridge, BridgeConfig, BridgeError};

use crate::common::{HostLoop, MockDesign};

fn test_config(max_queue_depth: usize) -> BridgeConfig {
    BridgeConfig {
        default_task_timeout_ms: 5_000,
        max_queue_depth,
        scheduler_tick_interval_ms: 5,
        max_tasks_per_tick: 0,
    }
}

#[test]
fn tasks_execute_in_submission_order() {
    // Generous depth: producers can outpace the host loop between ticks.
    let mut bridge = Bridge::new(test_config(1024), MockDesign::default());

    let executed = Arc::new(Mutex::new(Vec::new()));
    let sink = executed.clone();
    bridge.register_handler("record", move |_doc, _registry, params| {
        sink.lock().push(params["seq"].as_u64().expect("seq"));
        Ok(json!(null))
    });

    let host = HostLoop::spawn(bridge);

    // The lock makes "the order in which submit returned" exact even with
    // eight producers racing.
    let submitted = Arc::new(Mutex::new(Vec::new()));
    let sequence = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..8)
        .map(|_| {
            let handle = host.handle();
            let submitted = submitted.clone();
            let sequence = sequence.clone();
            thread::spawn(move || {
                let mut ids = Vec::new();
                for _ in 0..25 {
                    let mut order = submitted.lock();
                    let seq = sequence.fetch_add(1, Ordering::SeqCst) as u64;
                    let id = handle
                        .submit("record", json!({ "seq": seq }))
                        .expect("submit");
                    order.push(seq);
                    drop(order);
                    ids.push(id);
                }
                ids
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    for producer in producers {
        all_ids.extend(producer.join().expect("producer thread"));
    }
    let handle = host.handle();
    for id in all_ids {
        handle.wait(id).expect("result");
    }

    assert_eq!(*executed.lock(), *submitted.lock());
}

#[test]
fn at_most_one_task_runs_at_a_time() {
    let mut bridge = Bridge::new(test_config(64), MockDesign::default());

    let occupancy = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let gauge = occupancy.clone();
    let high_water = peak.clone();
    bridge.register_handler("linger", move |_doc, _registry, _params| {
        let current = gauge.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(current, Ordering::SeqCst);
        // Widen the window so overlap would be caught.
        thread::sleep(Duration::from_millis(5));
        gauge.fetch_sub(1, Ordering::SeqCst);
        Ok(json!(null))
    });

    let host = HostLoop::spawn(bridge);
    let producers: Vec<_> = (0..6)
        .map(|_| {
            let handle = host.handle();
            thread::spawn(move || {
                for _ in 0..5 {
                    let result = handle.execute("linger", json!({})).expect("execute");
                    assert!(result.success);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer thread");
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn caller_timeout_abandons_but_does_not_abort() {
    let mut bridge = Bridge::new(test_config(64), MockDesign::default());

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = completions.clone();
    bridge.register_handler("slow", move |_doc, _registry, _params| {
        thread::sleep(Duration::from_millis(300));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!("finally"))
    });

    let host = HostLoop::spawn(bridge);
    let handle = host.handle();

    let id = handle.submit("slow", json!({})).expect("submit");

    let started = Instant::now();
    let err = handle
        .wait_with_timeout(id, Duration::from_millis(100))
        .unwrap_err();
    let waited = started.elapsed();

    assert!(matches!(err, BridgeError::TaskTimeout { .. }));
    assert!(waited >= Duration::from_millis(100));
    assert!(waited < Duration::from_millis(250), "wait took {waited:?}");

    // The handler still ran to completion in the background, and its result
    // stayed fetchable for late interest.
    let result = handle.wait_unbounded(id).expect("late result");
    assert!(result.success);
    assert_eq!(result.payload.expect("payload"), json!("finally"));
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn submitting_beyond_queue_depth_fails_fast() {
    // No host loop: tasks pile up in the queue.
    let mut bridge = Bridge::new(test_config(3), MockDesign::default());
    bridge.register_handler("noop", |_doc, _registry, _params| Ok(json!(null)));
    let handle = bridge.handle();

    for _ in 0..3 {
        handle.submit("noop", json!({})).expect("submit");
    }

    let started = Instant::now();
    let err = handle.submit("noop", json!({})).unwrap_err();
    assert!(matches!(err, BridgeError::QueueFull { depth: 3 }));
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn bounded_batches_preserve_order_across_ticks() {
    let mut bridge = Bridge::new(
        BridgeConfig {
            max_tasks_per_tick: 2,
            ..test_config(64)
        },
        MockDesign::default(),
    );

    let executed = Arc::new(Mutex::new(Vec::new()));
    let sink = executed.clone();
    bridge.register_handler("record", move |_doc, _registry, params| {
        sink.lock().push(params["seq"].as_u64().expect("seq"));
        Ok(json!(null))
    });

    let host = HostLoop::spawn(bridge);
    let handle = host.handle();

    let ids: Vec<_> = (0..9u64)
        .map(|seq| {
            handle
                .submit("record", json!({ "seq": seq }))
                .expect("submit")
        })
        .collect();
    for id in ids {
        handle.wait(id).expect("result");
    }

    assert_eq!(*executed.lock(), (0..9).collect::<Vec<_>>());
}
