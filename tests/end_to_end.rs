//! End-to-end flows through the public API.

use fusebox::{
    BreakerConfig, BreakerEvent, CallError, CircuitState, Clock, ErrorFilter, ManualClock, Manager,
    ManagerConfig, ScopeRef, StoreConfig,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("downstream unavailable")]
struct DownstreamError;

#[derive(Debug, Error)]
#[error("validation failed")]
struct ValidationError;

struct World {
    manager: Manager,
    clock: Arc<ManualClock>,
    events: Arc<Mutex<Vec<BreakerEvent>>>,
}

fn world(config: ManagerConfig) -> World {
    let clock = ManualClock::starting_at(1_000_000);
    let events: Arc<Mutex<Vec<BreakerEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let manager = Manager::builder(config)
        .with_clock(clock.clone())
        .with_error_filter(ErrorFilter::new().ignore_type::<ValidationError>())
        .on_event(Arc::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }))
        .build();
    World {
        manager,
        clock,
        events,
    }
}

impl World {
    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

async fn fail(breaker: &fusebox::CircuitBreaker) {
    let result = breaker
        .call(|| async { Err::<(), _>(DownstreamError) })
        .await;
    assert!(result.is_err());
}

async fn succeed(breaker: &fusebox::CircuitBreaker) {
    breaker
        .call(|| async { Ok::<_, DownstreamError>(()) })
        .await
        .unwrap();
}

#[tokio::test]
async fn sudden_outage_trips_then_probing_recovers() {
    let w = world(ManagerConfig::default());
    let breaker = w.manager.breaker("payments").unwrap();

    // Four failures leave the circuit closed; the fifth trips it.
    for _ in 0..4 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
    fail(&breaker).await;
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Open);
    assert_eq!(breaker.metrics().await.unwrap().consecutive_failures, 5);
    assert!(w.kinds().contains(&"opened"));

    // After the cooldown, a probe half-opens; two successes close.
    w.clock.advance(60);
    succeed(&breaker).await;
    assert_eq!(breaker.state().await.unwrap(), CircuitState::HalfOpen);
    assert_eq!(breaker.metrics().await.unwrap().consecutive_successes, 1);

    succeed(&breaker).await;
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
    let metrics = breaker.metrics().await.unwrap();
    assert_eq!(metrics.consecutive_successes, 0);
    assert_eq!(metrics.consecutive_failures, 0);

    let kinds = w.kinds();
    assert!(kinds.contains(&"half_opened"));
    assert!(kinds.contains(&"closed"));
}

#[tokio::test]
async fn half_open_failure_reopens_and_propagates_the_error() {
    let w = world(ManagerConfig::default());
    let breaker = w.manager.breaker("payments").unwrap();

    for _ in 0..5 {
        fail(&breaker).await;
    }
    w.clock.advance(60);

    let result = breaker
        .call(|| async { Err::<(), _>(DownstreamError) })
        .await;
    match result {
        Err(CallError::Operation(e)) => assert_eq!(e.to_string(), "downstream unavailable"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Open);
}

#[tokio::test]
async fn ignored_errors_never_count() {
    let w = world(ManagerConfig::default());
    let breaker = w.manager.breaker("payments").unwrap();

    for _ in 0..10 {
        let result = breaker
            .call(|| async { Err::<(), _>(ValidationError) })
            .await;
        assert!(matches!(result, Err(CallError::Operation(_))));
    }

    assert_eq!(breaker.state().await.unwrap(), CircuitState::Closed);
    assert_eq!(breaker.metrics().await.unwrap().total_failures, 0);
    assert!(!w.kinds().contains(&"request_failed"));
}

#[tokio::test]
async fn scope_isolation_holds_for_context_boundary_and_both() {
    let w = world(ManagerConfig::default());

    let trip = |scoped: Manager| async move {
        let breaker = scoped.breaker("x").unwrap();
        for _ in 0..5 {
            fail(&breaker).await;
        }
        breaker
    };

    // Context isolation.
    let tripped = trip(w.manager.for_context(ScopeRef::new("user", "u1")).unwrap()).await;
    let other = w
        .manager
        .for_context(ScopeRef::new("user", "u2"))
        .unwrap()
        .breaker("x")
        .unwrap();
    assert_eq!(tripped.state().await.unwrap(), CircuitState::Open);
    assert_eq!(other.state().await.unwrap(), CircuitState::Closed);
    assert_eq!(other.metrics().await.unwrap().total_failures, 0);

    // Boundary isolation.
    let tripped = trip(
        w.manager
            .for_boundary(ScopeRef::new("account", "a1"))
            .unwrap(),
    )
    .await;
    let other = w
        .manager
        .for_boundary(ScopeRef::new("account", "a2"))
        .unwrap()
        .breaker("x")
        .unwrap();
    assert_eq!(tripped.state().await.unwrap(), CircuitState::Open);
    assert_eq!(other.state().await.unwrap(), CircuitState::Closed);

    // Dual scope is distinct from either single-sided scope.
    let dual = w
        .manager
        .for_context(ScopeRef::new("user", "u1"))
        .unwrap()
        .for_boundary(ScopeRef::new("account", "a1"))
        .unwrap()
        .breaker("x")
        .unwrap();
    assert_eq!(dual.state().await.unwrap(), CircuitState::Closed);
}

#[tokio::test]
async fn rolling_window_forgets_stale_bursts() {
    use std::time::Duration;

    let config = ManagerConfig::default().with_defaults(
        BreakerConfig::default()
            .with_strategy("rolling_window")
            .with_percentage_threshold(50.0)
            .with_minimum_throughput(5)
            .with_sampling_duration(Duration::from_secs(120)),
    );
    let w = world(config);
    let breaker = w.manager.breaker("reports").unwrap();

    // A burst of failures inside the window trips the breaker.
    for _ in 0..5 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state().await.unwrap(), CircuitState::Open);

    // The decision procedure forgets the burst once the window slides
    // past it: the very metrics that tripped above stop satisfying the
    // strategy, even though the lifetime rate is still 100%.
    use fusebox::strategy::RollingWindow;
    use fusebox::TripStrategy;

    let metrics = breaker.metrics().await.unwrap();
    assert!(RollingWindow.should_open(&metrics, breaker.config(), w.clock.now()));

    w.clock.advance(121);
    assert!(!RollingWindow.should_open(&metrics, breaker.config(), w.clock.now()));
}

#[tokio::test]
async fn cache_store_shares_state_between_breaker_values() {
    let repository = Arc::new(fusebox::InMemoryRepository::new());
    let config = ManagerConfig::default()
        .with_store("shared", StoreConfig::cache().with_prefix("fb"))
        .with_default_store("shared");
    let clock = ManualClock::starting_at(5_000);
    let manager = Manager::builder(config)
        .with_clock(clock)
        .with_cache_repository(repository)
        .build();

    let first = manager.breaker("payments").unwrap();
    let second = manager.breaker("payments").unwrap();

    for _ in 0..5 {
        fail(&first).await;
    }

    // Both handles observe the same record.
    assert_eq!(second.state().await.unwrap(), CircuitState::Open);
    assert_eq!(second.metrics().await.unwrap().consecutive_failures, 5);
}
