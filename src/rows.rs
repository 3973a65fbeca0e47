//! Traced row cursors.

use std::sync::Arc;

use async_trait::async_trait;

use crate::compose::{self, compose};
use crate::context::Context;
use crate::driver::{
    Rows, RowsColumnTypeDatabaseTypeName, RowsColumnTypeScanType, RowsNextResultSet, Value,
    ValueKind,
};
use crate::error::{DriverError, Result};
use crate::span::{start_span, Telemetry};

pub(crate) mod caps {
    pub const SCAN_TYPE: u8 = 1;
    pub const DATABASE_TYPE_NAME: u8 = 1 << 1;
    pub const NEXT_RESULT_SET: u8 = 1 << 2;
}

pub(crate) fn rows_caps(rows: &mut dyn Rows) -> u8 {
    compose::mask(&[
        (rows.as_column_type_scan_type().is_some(), caps::SCAN_TYPE),
        (
            rows.as_column_type_database_type_name().is_some(),
            caps::DATABASE_TYPE_NAME,
        ),
        (rows.as_next_result_set().is_some(), caps::NEXT_RESULT_SET),
    ])
}

/// Decorate `rows`, preserving its capability set. `ctx` is the inbound
/// context of the query that produced the rows.
pub(crate) fn wrap_rows(
    mut rows: Box<dyn Rows>,
    ctx: Context,
    telemetry: Arc<Telemetry>,
) -> Box<dyn Rows> {
    let mask = rows_caps(rows.as_mut());
    let core = RowsCore {
        parent: rows,
        ctx,
        telemetry,
    };
    macro_rules! make {
        ($caps:tt, $core:ident) => {
            Box::new(TracedRows::<$caps> { core: $core }) as Box<dyn Rows>
        };
    }
    compose!(
        mask, core, make;
        caps::SCAN_TYPE,
        caps::DATABASE_TYPE_NAME,
        caps::NEXT_RESULT_SET,
    )
}

struct RowsCore {
    parent: Box<dyn Rows>,
    ctx: Context,
    telemetry: Arc<Telemetry>,
}

impl RowsCore {
    async fn next(&mut self, dest: &mut [Value]) -> Result<()> {
        let span = start_span!(
            "sql:rows_next",
            self.telemetry.plan(self.telemetry.options.rows_next, &self.ctx)
        );
        self.telemetry
            .run_rows("rows_next", span.as_ref(), self.parent.next(dest))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        let span = start_span!(
            "sql:rows_close",
            self.telemetry.plan(self.telemetry.options.rows_close, &self.ctx)
        );
        self.telemetry
            .run("rows_close", span.as_ref(), self.parent.close())
            .await
    }

    async fn next_result_set(&mut self) -> Result<()> {
        let Some(parent) = self.parent.as_next_result_set() else {
            return Err(DriverError::EndOfRows);
        };
        let span = start_span!(
            "sql:next_result_set",
            self.telemetry.plan(self.telemetry.options.rows_next, &self.ctx)
        );
        self.telemetry
            .run_rows("next_result_set", span.as_ref(), parent.next_result_set())
            .await
    }
}

struct TracedRows<const CAPS: u8> {
    core: RowsCore,
}

#[async_trait]
impl<const CAPS: u8> Rows for TracedRows<CAPS> {
    fn columns(&self) -> Vec<String> {
        self.core.parent.columns()
    }

    async fn next(&mut self, dest: &mut [Value]) -> Result<()> {
        self.core.next(dest).await
    }

    async fn close(&mut self) -> Result<()> {
        self.core.close().await
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn RowsColumnTypeScanType> {
        (CAPS & caps::SCAN_TYPE != 0).then_some(self as &dyn RowsColumnTypeScanType)
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn RowsColumnTypeDatabaseTypeName> {
        (CAPS & caps::DATABASE_TYPE_NAME != 0)
            .then_some(self as &dyn RowsColumnTypeDatabaseTypeName)
    }

    fn as_next_result_set(&mut self) -> Option<&mut dyn RowsNextResultSet> {
        if CAPS & caps::NEXT_RESULT_SET != 0 {
            Some(self as &mut dyn RowsNextResultSet)
        } else {
            None
        }
    }
}

impl<const CAPS: u8> RowsColumnTypeScanType for TracedRows<CAPS> {
    fn column_type_scan_type(&self, index: usize) -> ValueKind {
        self.core
            .parent
            .as_column_type_scan_type()
            .map_or(ValueKind::Any, |p| p.column_type_scan_type(index))
    }
}

impl<const CAPS: u8> RowsColumnTypeDatabaseTypeName for TracedRows<CAPS> {
    fn column_type_database_type_name(&self, index: usize) -> String {
        self.core
            .parent
            .as_column_type_database_type_name()
            .map(|p| p.column_type_database_type_name(index))
            .unwrap_or_default()
    }
}

#[async_trait]
impl<const CAPS: u8> RowsNextResultSet for TracedRows<CAPS> {
    fn has_next_result_set(&mut self) -> bool {
        self.core
            .parent
            .as_next_result_set()
            .is_some_and(|p| p.has_next_result_set())
    }

    async fn next_result_set(&mut self) -> Result<()> {
        self.core.next_result_set().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceOptions;
    use crate::metrics::NoopMetrics;

    struct Plain;

    #[async_trait]
    impl Rows for Plain {
        fn columns(&self) -> Vec<String> {
            vec!["id".into()]
        }

        async fn next(&mut self, _dest: &mut [Value]) -> Result<()> {
            Err(DriverError::EndOfRows)
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_next_result_set_without_parent_support() {
        let telemetry = Arc::new(Telemetry::new(TraceOptions::all(), Arc::new(NoopMetrics)));
        let mut rows = TracedRows::<{ caps::NEXT_RESULT_SET }> {
            core: RowsCore {
                parent: Box::new(Plain),
                ctx: Context::background(),
                telemetry,
            },
        };

        assert!(!rows.has_next_result_set());
        assert!(matches!(
            rows.next_result_set().await,
            Err(DriverError::EndOfRows)
        ));
    }

    #[test]
    fn test_wrapped_rows_match_parent_capabilities() {
        let telemetry = Arc::new(Telemetry::new(TraceOptions::new(), Arc::new(NoopMetrics)));
        let mut rows = wrap_rows(Box::new(Plain), Context::background(), telemetry);
        assert_eq!(rows_caps(rows.as_mut()), 0);
        assert_eq!(rows.columns(), vec!["id".to_string()]);
    }
}
