//! Usage query compiler
//!
//! Validates a request, builds the pipeline stages in order, and assembles
//! them into one parameterized statement:
//!
//! ```text
//! base_events -> [filter_matches -> matched_events -> best_matches] -> usage
//! ```
//!
//! The filter group stages are only present when groups were supplied.

use std::sync::Arc;

use crate::assembler::{Assembler, CompiledQuery};
use crate::config::CompilerConfig;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::params::{FilterGroup, UsageQuery, validate_filter_groups};
use crate::stage::{AggregationSource, AggregationStage, BaseFilterStage, FilterGroupStage};

/// Compiles usage queries into parameterized ClickHouse SQL
///
/// Holds only read-only configuration; compilations are independent and can
/// run concurrently from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct UsageQueryCompiler {
    config: Arc<CompilerConfig>,
}

impl UsageQueryCompiler {
    /// Create a compiler from validated configuration
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Create a compiler sharing already-validated configuration
    pub fn with_shared_config(config: Arc<CompilerConfig>) -> Self {
        Self { config }
    }

    /// Get the compiler configuration
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a query, attributing events to `groups` when any are given
    ///
    /// Validation runs before any SQL is built. No partial statement is ever
    /// returned.
    pub fn compile(
        &self,
        ctx: &dyn ExecutionContext,
        query: &UsageQuery,
        groups: &[FilterGroup],
    ) -> Result<CompiledQuery> {
        query.validate()?;
        validate_filter_groups(groups)?;

        let config = self.config.as_ref();
        let mut assembler = Assembler::new();

        assembler.push(BaseFilterStage::new(config, ctx, query).build(assembler.next_offset()))?;

        let source = if groups.is_empty() {
            AggregationSource::BaseEvents
        } else {
            assembler
                .push_all(FilterGroupStage::new(config, groups).build(assembler.next_offset()))?;
            AggregationSource::BestMatches
        };

        let fragments = assembler.len() + 1;
        let projection = AggregationStage::new(config, query, source).build(assembler.next_offset());
        let compiled = assembler.finish(projection)?;

        tracing::debug!(
            event_name = %query.event_name,
            aggregation = %query.aggregation,
            groups = groups.len(),
            fragments,
            args = compiled.args().len(),
            "compiled usage query"
        );

        Ok(compiled)
    }

    /// Compile a query without filter groups
    pub fn compile_ungrouped(
        &self,
        ctx: &dyn ExecutionContext,
        query: &UsageQuery,
    ) -> Result<CompiledQuery> {
        self.compile(ctx, query, &[])
    }
}
