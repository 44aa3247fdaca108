//! Basic circuit breaker usage.
//!
//! This example shows how to:
//! - Build a manager over the default in-process store
//! - Protect a flaky operation with a breaker
//! - Watch the circuit trip, cool down, and recover
//!
//! Run with: cargo run --example basic_call

use fusebox::{BreakerConfig, CallError, Manager, ManagerConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("gateway refused the connection")]
struct GatewayError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing so breaker events show up on stderr
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Basic Call Example ===\n");

    let manager = Manager::builder(ManagerConfig::default()).build();

    let config = BreakerConfig::default()
        .with_failure_threshold(3)
        .with_success_threshold(2)
        .with_timeout(Duration::from_secs(2));
    let breaker = manager.breaker_with("payments", Some(config), None)?;

    // A gateway that fails its first five calls, then recovers.
    let attempts = AtomicU32::new(0);
    let charge = || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 5 {
                Err(GatewayError)
            } else {
                Ok(format!("receipt-{attempt}"))
            }
        }
    };

    for i in 1..=12 {
        let state = breaker.state().await?;
        print!("Call #{i:2} [{state}] -> ");

        match breaker.call(&charge).await {
            Ok(receipt) => println!("charged: {receipt}"),
            Err(CallError::Open { name, .. }) => {
                println!("rejected: circuit '{name}' is open");
            }
            Err(CallError::Operation(e)) => println!("failed: {e}"),
            Err(e) => println!("error: {e}"),
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    let metrics = breaker.metrics().await?;
    println!(
        "\nFinal state: {}, {} successes / {} failures recorded",
        breaker.state().await?,
        metrics.total_successes,
        metrics.total_failures
    );

    Ok(())
}
