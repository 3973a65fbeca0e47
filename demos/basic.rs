//! Basic example showing how to wrap a driver with sql-driver-tracing.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sql_driver_tracing::driver::*;
use sql_driver_tracing::prelude::*;
use sql_driver_tracing::{DriverError, LoggingMetrics, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A toy driver keeping a single table of names in memory.
#[derive(Clone, Default)]
struct MemoryDriver {
    names: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn open(&self, _name: &str) -> Result<Box<dyn Conn>> {
        Ok(Box::new(MemoryConn {
            names: self.names.clone(),
        }))
    }
}

struct MemoryConn {
    names: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Conn for MemoryConn {
    async fn prepare(&self, _query: &str) -> Result<Box<dyn Stmt>> {
        Err(DriverError::Skip)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn Tx>> {
        Ok(Box::new(MemoryTx))
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        Some(self as &dyn Pinger)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        Some(self as &dyn ExecerContext)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        Some(self as &dyn QueryerContext)
    }
}

#[async_trait]
impl Pinger for MemoryConn {
    async fn ping(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ExecerContext for MemoryConn {
    async fn exec_context(
        &self,
        _ctx: &Context,
        _query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn ExecResult>> {
        let mut names = self.names.lock();
        names.extend(args.iter().map(|a| a.value.to_string()));
        Ok(Box::new(MemoryResult {
            id: names.len() as i64,
            affected: args.len() as i64,
        }))
    }
}

#[async_trait]
impl QueryerContext for MemoryConn {
    async fn query_context(
        &self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        Ok(Box::new(MemoryRows {
            names: self.names.lock().clone().into_iter(),
        }))
    }
}

struct MemoryResult {
    id: i64,
    affected: i64,
}

impl ExecResult for MemoryResult {
    fn last_insert_id(&self) -> Result<i64> {
        Ok(self.id)
    }

    fn rows_affected(&self) -> Result<i64> {
        Ok(self.affected)
    }
}

struct MemoryRows {
    names: std::vec::IntoIter<String>,
}

#[async_trait]
impl Rows for MemoryRows {
    fn columns(&self) -> Vec<String> {
        vec!["name".into()]
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<()> {
        let name = self.names.next().ok_or(DriverError::EndOfRows)?;
        dest[0] = Value::Text(name);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MemoryTx;

#[async_trait]
impl Tx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sql_driver_tracing=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Option 1: Using the extension trait with defaults
    // let traced = MemoryDriver::default().with_tracing();

    // Option 2: Through a registry, keeping the plain driver available too
    let registry = Registry::new();
    registry.register("memory", Arc::new(MemoryDriver::default()))?;
    let name = registry.register_traced(
        "memory",
        TraceOptions::new()
            .with_query(true)
            .with_query_params(true)
            .with_transaction(true)
            .with_rows_affected(true),
    )?;

    // Option 3: With a metrics sink
    let traced = TracedDriver::new(
        registry.driver("memory").ok_or("memory driver missing")?,
        TraceOptions::all(),
    )
    .with_metrics(Arc::new(LoggingMetrics));
    traced.open("memory://").await?.close().await?;

    let request = tracing::info_span!("request", user = "demo");
    let ctx = Context::background().with_span(request.clone());

    let conn = registry.open(&name, "memory://").await?;
    tracing::info!(driver = %name, "Connection opened with tracing enabled");

    if let Some(execer) = conn.as_execer_context() {
        let res = execer
            .exec_context(
                &ctx,
                "INSERT INTO people (name) VALUES (?), (?)",
                &[
                    NamedValue::positional(1, "ada"),
                    NamedValue::positional(2, "grace"),
                ],
            )
            .await?;
        tracing::info!(rows = res.rows_affected()?, "Inserted people");
    }

    if let Some(queryer) = conn.as_queryer_context() {
        let mut rows = queryer
            .query_context(&ctx, "SELECT name FROM people", &[])
            .await?;
        let mut dest = vec![Value::Null];
        while rows.next(&mut dest).await.is_ok() {
            tracing::info!(name = %dest[0], "Row");
        }
        rows.close().await?;
    }

    let tx = conn
        .as_begin_tx()
        .map(|b| b.begin_tx(&ctx, TxOptions::default()));
    match tx {
        Some(begin) => begin.await?.commit().await?,
        // MemoryConn has no ConnBeginTx, so begin() is the only way in.
        None => conn.begin().await?.rollback().await?,
    }

    conn.close().await?;
    Ok(())
}
