//! PostgreSQL-backed store driver.
//!
//! One row per identity in the breakers table, plus an append-only
//! events table recording every transition and outcome with JSON
//! metadata. All mutations run inside a transaction; the find-or-create
//! step relies on the unique index over `(context_type, context_id,
//! boundary_type, boundary_id, name)` so concurrent creators converge on
//! a single row. The schema the driver expects (migrations are the
//! host's responsibility):
//!
//! ```sql
//! CREATE TABLE circuit_breakers (
//!     id               BIGSERIAL PRIMARY KEY, -- or UUID / TEXT, per key kind
//!     context_type     TEXT,
//!     context_id       TEXT,
//!     boundary_type    TEXT,
//!     boundary_id      TEXT,
//!     name             TEXT NOT NULL,
//!     state            TEXT NOT NULL DEFAULT 'closed',
//!     consecutive_successes BIGINT NOT NULL DEFAULT 0,
//!     consecutive_failures  BIGINT NOT NULL DEFAULT 0,
//!     total_successes  BIGINT NOT NULL DEFAULT 0,
//!     total_failures   BIGINT NOT NULL DEFAULT 0,
//!     last_success_at  TIMESTAMPTZ,
//!     last_failure_at  TIMESTAMPTZ,
//!     opened_at        TIMESTAMPTZ,
//!     closed_at        TIMESTAMPTZ,
//!     created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE UNIQUE INDEX circuit_breakers_identity
//!     ON circuit_breakers (context_type, context_id, boundary_type, boundary_id, name)
//!     NULLS NOT DISTINCT;
//! CREATE INDEX ON circuit_breakers (context_type, context_id);
//! CREATE INDEX ON circuit_breakers (boundary_type, boundary_id);
//! CREATE INDEX ON circuit_breakers (state);
//! CREATE INDEX ON circuit_breakers (opened_at);
//!
//! CREATE TABLE circuit_breaker_events (
//!     id                 BIGSERIAL PRIMARY KEY, -- or UUID / TEXT, per key kind
//!     circuit_breaker_id BIGINT NOT NULL
//!         REFERENCES circuit_breakers (id) ON DELETE CASCADE,
//!     event_type         TEXT NOT NULL,
//!     metadata           JSONB,
//!     created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! CREATE INDEX ON circuit_breaker_events (circuit_breaker_id);
//! CREATE INDEX ON circuit_breaker_events (event_type);
//! CREATE INDEX ON circuit_breaker_events (created_at);
//! CREATE INDEX ON circuit_breaker_events (circuit_breaker_id, event_type);
//! ```

use crate::core::error::StoreError;
use crate::core::scope::{BreakerKey, IdentifierKind};
use crate::core::state::{CircuitState, Metrics};
use crate::core::traits::StateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};

/// Binds the five identity columns in declaration order:
/// `$1` name, `$2..$3` context, `$4..$5` boundary.
macro_rules! bind_identity {
    ($query:expr, $key:expr) => {
        $query
            .bind(&$key.name)
            .bind($key.scope.context.as_ref().map(|r| r.kind.as_str()))
            .bind($key.scope.context.as_ref().map(|r| r.id.as_str()))
            .bind($key.scope.boundary.as_ref().map(|r| r.kind.as_str()))
            .bind($key.scope.boundary.as_ref().map(|r| r.id.as_str()))
    };
}

/// Generates a fresh application-side identifier, `None` when the
/// database generates it.
fn generate_id(kind: IdentifierKind) -> Option<String> {
    match kind {
        IdentifierKind::Integer => None,
        IdentifierKind::Ulid => Some(ulid::Ulid::new().to_string()),
        IdentifierKind::Uuid => Some(uuid::Uuid::new_v4().to_string()),
    }
}

/// SQL expression for an id bound as text at placeholder `n`.
fn id_param(kind: IdentifierKind, n: usize) -> String {
    match kind {
        IdentifierKind::Integer => format!("${n}::bigint"),
        IdentifierKind::Ulid => format!("${n}"),
        IdentifierKind::Uuid => format!("${n}::uuid"),
    }
}

/// Durable table names, configurable for hosts with naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// One row per breaker identity.
    pub circuit_breakers: String,
    /// Append-only transition/outcome log.
    pub circuit_breaker_events: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            circuit_breakers: "circuit_breakers".to_string(),
            circuit_breaker_events: "circuit_breaker_events".to_string(),
        }
    }
}

/// PostgreSQL-backed store driver.
#[derive(Debug)]
pub struct DurableStore {
    pool: PgPool,
    tables: TableNames,
    key_kind: IdentifierKind,
}

impl DurableStore {
    /// Creates a durable store over `pool` with default table names and
    /// integer primary keys.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tables: TableNames::default(),
            key_kind: IdentifierKind::default(),
        }
    }

    /// Sets the table names.
    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    /// Sets the primary-key kind.
    pub fn with_key_kind(mut self, kind: IdentifierKind) -> Self {
        self.key_kind = kind;
        self
    }

    fn identity_predicate(&self) -> &'static str {
        "name = $1 \
         AND context_type IS NOT DISTINCT FROM $2 \
         AND context_id IS NOT DISTINCT FROM $3 \
         AND boundary_type IS NOT DISTINCT FROM $4 \
         AND boundary_id IS NOT DISTINCT FROM $5"
    }

    /// Finds the row for `key`, returning its id as text, without
    /// creating it.
    async fn find_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &BreakerKey,
    ) -> Result<Option<String>, StoreError> {
        let query = format!(
            "SELECT id::text FROM {} WHERE {}",
            self.tables.circuit_breakers,
            self.identity_predicate()
        );
        let id = bind_identity!(sqlx::query_scalar(&query), key)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(id)
    }

    /// Finds or creates the row for `key`.
    ///
    /// Insert races are resolved by the unique identity index: the loser
    /// hits `ON CONFLICT DO NOTHING` and reads the winner's row.
    async fn find_or_create_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &BreakerKey,
    ) -> Result<String, StoreError> {
        if let Some(id) = self.find_row(tx, key).await? {
            return Ok(id);
        }

        let conflict = "ON CONFLICT (context_type, context_id, boundary_type, boundary_id, name) \
                        DO NOTHING RETURNING id::text";
        let inserted: Option<String> = match generate_id(self.key_kind) {
            Some(id) => {
                let query = format!(
                    "INSERT INTO {} (id, context_type, context_id, boundary_type, boundary_id, name) \
                     VALUES ({}, $2, $3, $4, $5, $1) {}",
                    self.tables.circuit_breakers,
                    id_param(self.key_kind, 6),
                    conflict
                );
                bind_identity!(sqlx::query_scalar(&query), key)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            None => {
                let query = format!(
                    "INSERT INTO {} (context_type, context_id, boundary_type, boundary_id, name) \
                     VALUES ($2, $3, $4, $5, $1) {}",
                    self.tables.circuit_breakers, conflict
                );
                bind_identity!(sqlx::query_scalar(&query), key)
                    .fetch_optional(&mut **tx)
                    .await?
            }
        };

        match inserted {
            Some(id) => Ok(id),
            None => match self.find_row(tx, key).await? {
                Some(id) => Ok(id),
                None => Err(StoreError::CorruptRecord {
                    key: key.identity(),
                    reason: "row vanished between conflicting insert and re-read".to_string(),
                }),
            },
        }
    }

    async fn append_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        row_id: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> Result<(), StoreError> {
        match generate_id(self.key_kind) {
            Some(event_id) => {
                let query = format!(
                    "INSERT INTO {} (id, circuit_breaker_id, event_type, metadata) \
                     VALUES ({}, {}, $2, $3)",
                    self.tables.circuit_breaker_events,
                    id_param(self.key_kind, 4),
                    id_param(self.key_kind, 1),
                );
                sqlx::query(&query)
                    .bind(row_id)
                    .bind(event_type)
                    .bind(metadata)
                    .bind(event_id)
                    .execute(&mut **tx)
                    .await?;
            }
            None => {
                let query = format!(
                    "INSERT INTO {} (circuit_breaker_id, event_type, metadata) \
                     VALUES ({}, $2, $3)",
                    self.tables.circuit_breaker_events,
                    id_param(self.key_kind, 1),
                );
                sqlx::query(&query)
                    .bind(row_id)
                    .bind(event_type)
                    .bind(metadata)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }

    /// Records one outcome and appends the matching event, atomically.
    async fn record_outcome(
        &self,
        key: &BreakerKey,
        now: i64,
        success: bool,
    ) -> Result<Metrics, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row_id = self.find_or_create_row(&mut tx, key).await?;

        let assignments = if success {
            "consecutive_successes = consecutive_successes + 1, \
             consecutive_failures = 0, \
             total_successes = total_successes + 1, \
             last_success_at = $2"
        } else {
            "consecutive_failures = consecutive_failures + 1, \
             consecutive_successes = 0, \
             total_failures = total_failures + 1, \
             last_failure_at = $2"
        };
        let query = format!(
            "UPDATE {} SET {}, updated_at = NOW() WHERE id = {} \
             RETURNING consecutive_successes, consecutive_failures, \
                       total_successes, total_failures, last_success_at, last_failure_at",
            self.tables.circuit_breakers,
            assignments,
            id_param(self.key_kind, 1),
        );
        let row = sqlx::query(&query)
            .bind(&row_id)
            .bind(to_datetime(now))
            .fetch_one(&mut *tx)
            .await?;
        let metrics = metrics_from_row(&row)?;

        let event_type = if success { "success" } else { "failure" };
        let metadata = serde_json::json!({
            "consecutive_successes": metrics.consecutive_successes,
            "consecutive_failures": metrics.consecutive_failures,
            "total_successes": metrics.total_successes,
            "total_failures": metrics.total_failures,
        });
        self.append_event(&mut tx, &row_id, event_type, metadata)
            .await?;

        tx.commit().await?;
        Ok(metrics)
    }

    /// Sets the state and appends the transition event, atomically.
    async fn transition(
        &self,
        key: &BreakerKey,
        state: CircuitState,
        extra_assignments: &str,
        stamp: Option<i64>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row_id = self.find_or_create_row(&mut tx, key).await?;

        let query = format!(
            "UPDATE {} SET state = $2{}, updated_at = NOW() WHERE id = {}",
            self.tables.circuit_breakers,
            extra_assignments,
            id_param(self.key_kind, 1),
        );
        let partial = sqlx::query(&query).bind(&row_id).bind(state.as_str());
        let partial = match stamp {
            Some(now) => partial.bind(to_datetime(now)),
            None => partial,
        };
        partial.execute(&mut *tx).await?;

        let event_type = match state {
            CircuitState::Open => "opened",
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_opened",
        };
        self.append_event(&mut tx, &row_id, event_type, serde_json::Value::Null)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for DurableStore {
    async fn state(&self, key: &BreakerKey) -> Result<CircuitState, StoreError> {
        let query = format!(
            "SELECT state FROM {} WHERE {}",
            self.tables.circuit_breakers,
            self.identity_predicate()
        );
        let state: Option<String> = bind_identity!(sqlx::query_scalar(&query), key)
            .fetch_optional(&self.pool)
            .await?;
        match state {
            Some(token) => token.parse().map_err(|_| StoreError::CorruptRecord {
                key: key.identity(),
                reason: format!("unrecognized state token '{token}'"),
            }),
            None => Ok(CircuitState::Closed),
        }
    }

    async fn metrics(&self, key: &BreakerKey) -> Result<Metrics, StoreError> {
        let query = format!(
            "SELECT consecutive_successes, consecutive_failures, \
                    total_successes, total_failures, last_success_at, last_failure_at \
             FROM {} WHERE {}",
            self.tables.circuit_breakers,
            self.identity_predicate()
        );
        let row: Option<PgRow> = bind_identity!(sqlx::query(&query), key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => metrics_from_row(&row),
            None => Ok(Metrics::new()),
        }
    }

    async fn record_success(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        self.record_outcome(key, now, true).await
    }

    async fn record_failure(&self, key: &BreakerKey, now: i64) -> Result<Metrics, StoreError> {
        self.record_outcome(key, now, false).await
    }

    async fn transition_to_open(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError> {
        self.transition(key, CircuitState::Open, ", opened_at = $3", Some(now))
            .await
    }

    async fn transition_to_half_open(&self, key: &BreakerKey) -> Result<(), StoreError> {
        self.transition(key, CircuitState::HalfOpen, "", None).await
    }

    async fn transition_to_closed(&self, key: &BreakerKey, now: i64) -> Result<(), StoreError> {
        self.transition(
            key,
            CircuitState::Closed,
            ", consecutive_successes = 0, consecutive_failures = 0, closed_at = $3",
            Some(now),
        )
        .await
    }

    async fn reset(&self, key: &BreakerKey) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(row_id) = self.find_row(&mut tx, key).await? else {
            // Nothing to reset; resetting an unknown key must not create it.
            tx.commit().await?;
            return Ok(());
        };

        let query = format!(
            "UPDATE {} SET state = 'closed', \
             consecutive_successes = 0, consecutive_failures = 0, \
             total_successes = 0, total_failures = 0, \
             last_success_at = NULL, last_failure_at = NULL, \
             opened_at = NULL, closed_at = NULL, updated_at = NOW() \
             WHERE id = {}",
            self.tables.circuit_breakers,
            id_param(self.key_kind, 1),
        );
        sqlx::query(&query)
            .bind(&row_id)
            .execute(&mut *tx)
            .await?;

        self.append_event(&mut tx, &row_id, "reset", serde_json::Value::Null)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn to_datetime(now: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(now, 0).unwrap_or_default()
}

fn metrics_from_row(row: &PgRow) -> Result<Metrics, StoreError> {
    Ok(Metrics {
        consecutive_successes: row.try_get::<i64, _>("consecutive_successes")? as u32,
        consecutive_failures: row.try_get::<i64, _>("consecutive_failures")? as u32,
        total_successes: row.try_get::<i64, _>("total_successes")? as u64,
        total_failures: row.try_get::<i64, _>("total_failures")? as u64,
        last_success_at: row
            .try_get::<Option<DateTime<Utc>>, _>("last_success_at")?
            .map(|at| at.timestamp()),
        last_failure_at: row
            .try_get::<Option<DateTime<Utc>>, _>("last_failure_at")?
            .map(|at| at.timestamp()),
    })
}
