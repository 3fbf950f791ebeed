//! Ten workers submitting two documents each through a 5-per-second gate.
//!
//! Documents are written under `./out`. Run with `RUST_LOG=admission_gate=debug`
//! to see each window reset.

use admission_gate::infrastructure::mocks::sample_payload;
use admission_gate::{AdmissionGate, FileSink, IntervalUnit, JsonCodec};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let gate = Arc::new(AdmissionGate::per_unit(
        IntervalUnit::Seconds,
        5,
        JsonCodec::new(),
        FileSink::new("out"),
    )?);

    println!("=== Concurrent Submit Example ===\n");
    println!("Limit: 5 documents per second, 10 workers x 2 documents\n");

    let start = Instant::now();
    let mut workers = Vec::new();
    for worker in 0..10 {
        let gate = Arc::clone(&gate);
        workers.push(tokio::spawn(async move {
            for round in 0..2 {
                let signature = format!("worker-{worker}-round-{round}");
                match gate.submit(sample_payload().as_bytes(), &signature).await {
                    Ok(ack) => println!(
                        "[{:>5} ms] {signature} -> {}",
                        start.elapsed().as_millis(),
                        ack.location.display()
                    ),
                    Err(err) => eprintln!("{signature} failed: {err}"),
                }
            }
        }));
    }

    for worker in workers {
        worker.await?;
    }
    gate.shutdown().await?;

    let snapshot = gate.metrics().snapshot();
    println!("\n=== Example Complete ===");
    println!(
        "persisted={} failed={} resets={} elapsed={:?}",
        snapshot.persisted,
        snapshot.decode_failed + snapshot.persist_failed,
        snapshot.resets,
        start.elapsed()
    );

    Ok(())
}
