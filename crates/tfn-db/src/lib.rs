//! tfn-db
//!
//! PostgreSQL implementation of every store trait. Atomicity lives here:
//! - attendance identity: `uq_attendance_identity` unique constraint
//! - batch insert: one transaction, rolled back on the first violation
//! - bill numbers: counter row incremented in the bill's own transaction
//! - subscription transitions: `update ... where status = any($from)`

use anyhow::{anyhow, Context};
use sqlx::postgres::{PgPool, PgPoolOptions};

mod attendance;
mod bills;
mod notifications;
mod subscriptions;

pub const ENV_DB_URL: &str = "TIFFIN_DATABASE_URL";

/// Connect to Postgres using TIFFIN_DATABASE_URL.
pub async fn connect_from_env(max_connections: u32) -> anyhow::Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, max_connections).await
}

pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_attendance_table: bool,
    pub next_bill_seq: Option<i64>,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> anyhow::Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'attendance'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let next_bill_seq = if exists {
        sqlx::query_as::<_, (i64,)>("select value + 1 from counters where name = 'bill_number'")
            .fetch_optional(pool)
            .await
            .context("status counter query failed")?
            .map(|(v,)| v)
    } else {
        None
    };

    Ok(DbStatus {
        ok: one == 1,
        has_attendance_table: exists,
        next_bill_seq,
    })
}

/// Every store trait over one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// A stored value that no longer parses is data corruption, not bad input.
fn decode<T>(r: tfn_schemas::Result<T>, column: &str) -> tfn_schemas::Result<T> {
    r.map_err(|e| tfn_schemas::TiffinError::Internal(anyhow!("column {column} holds an invalid value: {e}")))
}

fn to_u32(v: i32, column: &str) -> tfn_schemas::Result<u32> {
    u32::try_from(v)
        .map_err(|_| tfn_schemas::TiffinError::Internal(anyhow!("column {column} is negative: {v}")))
}

fn to_u64(v: i64, column: &str) -> tfn_schemas::Result<u64> {
    u64::try_from(v)
        .map_err(|_| tfn_schemas::TiffinError::Internal(anyhow!("column {column} is negative: {v}")))
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
