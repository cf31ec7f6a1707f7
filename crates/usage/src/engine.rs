//! Usage engine
//!
//! Compiles usage queries and hands them to an execution backend. The
//! backend owns connections, timeouts and retries; the engine only passes the
//! compiled statement through unchanged and parses the rows that come back.

use async_trait::async_trait;
use serde_json::Value;

use crate::assembler::CompiledQuery;
use crate::compiler::UsageQueryCompiler;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::params::{FilterGroup, UsageQuery};
use crate::result::UsageResult;

/// Executes compiled usage queries against an event store
#[async_trait]
pub trait UsageBackend: Send + Sync {
    /// Bind the arguments in order and run the statement
    ///
    /// Returns rows of `(filter_group_id, value)`.
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Vec<Value>>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Usage engine: compiler plus execution backend
pub struct UsageEngine {
    compiler: UsageQueryCompiler,
    backend: Box<dyn UsageBackend>,
}

impl UsageEngine {
    /// Create an engine from a compiler and a backend
    pub fn new(compiler: UsageQueryCompiler, backend: Box<dyn UsageBackend>) -> Self {
        Self { compiler, backend }
    }

    /// Get the compiler
    pub fn compiler(&self) -> &UsageQueryCompiler {
        &self.compiler
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Aggregate usage, attributing events to `groups` when any are given
    pub async fn usage(
        &self,
        ctx: &dyn ExecutionContext,
        query: &UsageQuery,
        groups: &[FilterGroup],
    ) -> Result<UsageResult> {
        let compiled = self.compiler.compile(ctx, query, groups)?;
        let rows = self.backend.execute(&compiled).await?;

        tracing::debug!(
            backend = self.backend.name(),
            event_name = %query.event_name,
            rows = rows.len(),
            "usage query executed"
        );

        UsageResult::from_rows(&rows)
    }

    /// Total usage across all buckets
    pub async fn total(
        &self,
        ctx: &dyn ExecutionContext,
        query: &UsageQuery,
        groups: &[FilterGroup],
    ) -> Result<f64> {
        Ok(self.usage(ctx, query, groups).await?.total)
    }
}
