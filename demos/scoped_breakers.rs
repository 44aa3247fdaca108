//! Polymorphic scoping: independent breakers per tenant and account.
//!
//! This example shows how to:
//! - Bind the context ("who") and boundary ("what") sides of a scope
//! - Trip one tenant's breaker without affecting another's
//! - Observe the events each breaker emits
//!
//! Run with: cargo run --example scoped_breakers

use fusebox::{CallError, Manager, ManagerConfig, ScopeRef};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("mail provider timed out")]
struct MailError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    println!("=== Scoped Breakers Example ===\n");

    let manager = Manager::builder(ManagerConfig::default())
        .on_event(Arc::new(|event| {
            println!("  [event] {} for '{}'", event.kind(), event.name());
        }))
        .build();

    // Two tenants, same breaker name, same store: distinct identities.
    let tenant_a = manager
        .for_context(ScopeRef::new("tenant", "acme"))?
        .breaker("mailer")?;
    let tenant_b = manager
        .for_context(ScopeRef::new("tenant", "globex"))?
        .breaker("mailer")?;

    println!("Tripping the breaker for tenant 'acme'...");
    for _ in 0..5 {
        let _ = tenant_a.call(|| async { Err::<(), _>(MailError) }).await;
    }

    println!("\nacme:   {}", tenant_a.state().await?);
    println!("globex: {}\n", tenant_b.state().await?);

    match tenant_a.call(|| async { Ok::<_, MailError>(()) }).await {
        Err(CallError::Open { .. }) => println!("acme is rejected while open"),
        other => println!("unexpected: {other:?}"),
    }
    tenant_b.call(|| async { Ok::<_, MailError>(()) }).await?;
    println!("globex still delivers mail\n");

    // A dual scope isolates further: same tenant, per external account.
    let account_scoped = manager
        .for_context(ScopeRef::new("tenant", "acme"))?
        .for_boundary(ScopeRef::new("account", "smtp-eu-1"))?
        .breaker("mailer")?;
    println!(
        "dual-scoped breaker starts fresh: {}",
        account_scoped.state().await?
    );

    Ok(())
}
