//! Waiter ordering and cancellation behaviour.

use admission_gate::infrastructure::mocks::{sample_payload, CountingCodec, RecordingSink};
use admission_gate::{AdmissionGate, GateError, JsonCodec, WindowMode};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type TestGate = AdmissionGate<CountingCodec<JsonCodec>, RecordingSink>;

fn build_gate(mode: WindowMode) -> TestGate {
    AdmissionGate::builder(CountingCodec::new(JsonCodec::new()), RecordingSink::new())
        .with_capacity(1)
        .with_interval(Duration::from_secs(1))
        .with_window_mode(mode)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_waiters_admitted_in_arrival_order() {
    let gate = Arc::new(build_gate(WindowMode::Concurrency));
    let order = Arc::new(Mutex::new(Vec::new()));

    let holder = gate.acquire().await.unwrap();

    let mut waiters = Vec::new();
    for name in ["A", "B", "C"] {
        let gate = Arc::clone(&gate);
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let permit = gate.acquire().await.unwrap();
            order.lock().unwrap().push(name);
            permit.release();
        }));
        // Make sure each waiter is queued before the next one arrives
        tokio::task::yield_now().await;
    }

    holder.release();
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    gate.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_quota_waiters_served_one_per_window_in_order() {
    let gate = Arc::new(build_gate(WindowMode::Quota));
    gate.submit(sample_payload().as_bytes(), "first").await.unwrap();

    let mut waiters = Vec::new();
    for name in ["A", "B", "C"] {
        let gate = Arc::clone(&gate);
        waiters.push(tokio::spawn(async move {
            gate.submit(sample_payload().as_bytes(), name).await
        }));
        tokio::task::yield_now().await;
    }
    for waiter in waiters {
        waiter.await.unwrap().unwrap();
    }

    let signatures: Vec<_> = gate
        .sink()
        .records()
        .into_iter()
        .map(|record| record.signature)
        .collect();
    assert_eq!(signatures, vec!["first", "A", "B", "C"]);
    assert_eq!(gate.scheduler_state().ticks, 3);

    gate.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_waiter_does_not_block_queue() {
    let gate = Arc::new(build_gate(WindowMode::Quota));
    gate.submit(sample_payload().as_bytes(), "first").await.unwrap();

    let impatient = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            gate.submit_with_cancel(
                sample_payload().as_bytes(),
                "impatient",
                tokio::time::sleep(Duration::from_millis(200)),
            )
            .await
        })
    };
    tokio::task::yield_now().await;

    let patient = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.submit(sample_payload().as_bytes(), "patient").await })
    };

    assert!(matches!(
        impatient.await.unwrap(),
        Err(GateError::OperationCancelled)
    ));
    patient.await.unwrap().unwrap();

    assert_eq!(gate.codec().calls(), 2);
    assert_eq!(gate.sink().count(), 2);
    assert_eq!(gate.metrics().cancelled(), 1);

    gate.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dropped_submit_future_takes_no_permit() {
    let gate = build_gate(WindowMode::Quota);
    gate.submit(sample_payload().as_bytes(), "first").await.unwrap();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(100),
        gate.submit(sample_payload().as_bytes(), "dropped"),
    )
    .await;
    assert!(timed_out.is_err());

    // After the reset the pool is full again and the dropped submission left no trace
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gate.available_permits(), 1);
    assert_eq!(gate.codec().calls(), 1);

    gate.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_wait_takes_nothing() {
    let gate = build_gate(WindowMode::Concurrency);

    let result = gate
        .submit_with_cancel(sample_payload().as_bytes(), "sig", std::future::ready(()))
        .await;

    assert!(matches!(result, Err(GateError::OperationCancelled)));
    assert_eq!(gate.available_permits(), 1);
    assert_eq!(gate.window_count(), 0);
    assert_eq!(gate.codec().calls(), 0);

    gate.shutdown().await.unwrap();
}
