//! Tell Usage
//!
//! Compiles usage aggregation requests into parameterized ClickHouse SQL.
//!
//! # Overview
//!
//! A [`UsageQuery`] names an event, an aggregation and its scope. The
//! [`UsageQueryCompiler`] turns it into a CTE pipeline:
//!
//! - **base_events**: duplicate deliveries collapsed on the dedup key, then
//!   filtered by tenant, environment, time window, customer and properties
//! - **filter groups** (optional): each event attributed to its best
//!   matching [`FilterGroup`] by priority, ties broken by group id
//! - **projection**: COUNT, SUM, AVG or COUNT_DISTINCT per bucket
//!
//! Every user-supplied string, property names included, is bound as a
//! positional argument (`?1`, `?2`, ...). The compiler never executes
//! anything; [`UsageEngine`] hands compiled queries to a [`UsageBackend`].
//!
//! # Usage
//!
//! ```
//! use tell_usage::{FilterGroup, TenantContext, UsageQuery, UsageQueryCompiler};
//!
//! let compiler = UsageQueryCompiler::default();
//! let ctx = TenantContext::new("tenant_1", "env_1");
//!
//! let query = UsageQuery::count("api_call").with_filter("region", ["us-east-1"]);
//! let groups = vec![
//!     FilterGroup::new("premium", 2).with_filter("tier", ["gold"]),
//!     FilterGroup::new("default", 0),
//! ];
//!
//! let compiled = compiler.compile(&ctx, &query, &groups).unwrap();
//! assert!(compiled.sql().starts_with("WITH base_events AS"));
//! assert!(!compiled.sql().contains("api_call"));
//! ```

pub mod assembler;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod params;
pub mod result;
pub mod stage;
pub mod timewindow;


// Re-exports for convenience
pub use assembler::{Assembler, CompiledQuery};
pub use compiler::UsageQueryCompiler;
pub use config::{CompilerConfig, ConfigError};
pub use context::{ExecutionContext, TenantContext};
pub use engine::{UsageBackend, UsageEngine};
pub use error::{Result, UsageError};
pub use fragment::{ParamSlice, QueryFragment};
pub use params::{AggregationType, FilterGroup, Param, PropertyFilters, UsageQuery};
pub use result::{UsageBucket, UsageResult};
pub use timewindow::{TimeWindow, format_datetime_millis};
