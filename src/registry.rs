//! Named driver registry with traced variants.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::TraceOptions;
use crate::connection::TracedDriver;
use crate::driver::{Conn, Driver};
use crate::error::{DriverError, RegistryError};
use crate::metrics::{MetricsSink, NoopMetrics};

/// Number of derived names tried per base driver.
pub const MAX_SLOTS: usize = 100;

/// A set of drivers addressable by name.
///
/// Construct one and pass it by reference; there is no process-wide instance.
///
/// # Example
///
/// ```rust,ignore
/// let registry = Registry::new();
/// registry.register("postgres", Arc::new(PgDriver))?;
/// let name = registry.register_traced("postgres", TraceOptions::all())?;
/// let conn = registry.open(&name, "postgres://localhost/app").await?;
/// ```
#[derive(Default)]
pub struct Registry {
    drivers: Mutex<BTreeMap<String, Arc<dyn Driver>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `driver` available under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut drivers = self.drivers.lock();
        if drivers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        tracing::debug!(driver = %name, "Registered driver");
        drivers.insert(name, driver);
        Ok(())
    }

    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.lock().get(name).cloned()
    }

    /// Sorted names of all registered drivers.
    pub fn drivers(&self) -> Vec<String> {
        self.drivers.lock().keys().cloned().collect()
    }

    /// Open a connection through the driver registered as `name`.
    pub async fn open(&self, name: &str, dsn: &str) -> Result<Box<dyn Conn>, DriverError> {
        let driver = self
            .driver(name)
            .ok_or_else(|| DriverError::other(RegistryError::UnknownDriver(name.to_string())))?;
        driver.open(dsn).await
    }

    /// Register a traced wrapper of the driver named `base` and return the
    /// derived name it is available under.
    ///
    /// The same base may be registered several times with different options;
    /// each registration claims the next free `{base}-sqltrace-{n}` slot.
    pub fn register_traced(
        &self,
        base: &str,
        options: TraceOptions,
    ) -> Result<String, RegistryError> {
        self.register_traced_with_metrics(base, options, Arc::new(NoopMetrics))
    }

    pub fn register_traced_with_metrics(
        &self,
        base: &str,
        options: TraceOptions,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<String, RegistryError> {
        let mut drivers = self.drivers.lock();
        let parent = drivers
            .get(base)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownDriver(base.to_string()))?;

        let name = (0..MAX_SLOTS)
            .map(|slot| format!("{base}-sqltrace-{slot}"))
            .find(|name| !drivers.contains_key(name))
            .ok_or_else(|| RegistryError::SlotsExhausted {
                base: base.to_string(),
                attempts: MAX_SLOTS,
            })?;

        let traced = TracedDriver::new(parent, options).with_metrics(metrics);
        tracing::debug!(driver = %base, traced = %name, "Registered traced driver");
        drivers.insert(name.clone(), Arc::new(traced));
        Ok(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
