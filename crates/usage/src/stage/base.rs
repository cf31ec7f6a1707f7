//! Base filter stage
//!
//! Collapses duplicate deliveries to one row per dedup key, then narrows to
//! the rows this query reads.

use crate::condition::compile_conditions;
use crate::config::CompilerConfig;
use crate::context::ExecutionContext;
use crate::fragment::{ParamSlice, QueryFragment};
use crate::params::UsageQuery;
use crate::stage::BASE_EVENTS;

/// Builds `base_events`
///
/// Predicates that every duplicate of an event shares (event name, tenant,
/// environment, timestamp) run inside the deduplicating subquery. Customer
/// and property predicates run on the deduplicated rows.
pub struct BaseFilterStage<'a> {
    config: &'a CompilerConfig,
    ctx: &'a dyn ExecutionContext,
    query: &'a UsageQuery,
}

impl<'a> BaseFilterStage<'a> {
    /// Create the stage for a query in a tenancy context
    pub fn new(
        config: &'a CompilerConfig,
        ctx: &'a dyn ExecutionContext,
        query: &'a UsageQuery,
    ) -> Self {
        Self { config, ctx, query }
    }

    /// Build the fragment with placeholders starting after `offset`
    pub fn build(&self, offset: usize) -> QueryFragment {
        let mut params = ParamSlice::new(offset);

        let dedup_conditions = self.dedup_conditions(&mut params);
        let row_conditions = self.row_conditions(&mut params);

        let dedup_key = self.config.dedup_columns();
        let order_key = self
            .config
            .dedup_key
            .iter()
            .map(|col| format!("{} DESC", col))
            .collect::<Vec<_>>()
            .join(", ");

        let mut body = format!(
            "    SELECT * FROM (\n        SELECT DISTINCT ON ({}) *\n        FROM {}\n        WHERE {}\n        ORDER BY {}\n    )",
            dedup_key,
            self.config.events_table,
            dedup_conditions.join(" AND "),
            order_key,
        );

        if !row_conditions.is_empty() {
            body.push_str("\n    WHERE ");
            body.push_str(&row_conditions.join(" AND "));
        }

        QueryFragment::new(BASE_EVENTS, body, params)
    }

    fn dedup_conditions(&self, params: &mut ParamSlice) -> Vec<String> {
        let mut conditions = vec![format!("event_name = {}", params.bind(&self.query.event_name))];

        if let Some(tenant_id) = self.ctx.tenant_id() {
            conditions.push(format!("tenant_id = {}", params.bind(tenant_id)));
        }

        if let Some(environment_id) = self.ctx.environment_id() {
            conditions.push(format!("environment_id = {}", params.bind(environment_id)));
        }

        let ts = &self.config.timestamp_column;
        let precision = self.config.timestamp_precision;

        if let Some(start) = self.query.window.start {
            conditions.push(format!(
                "{} >= toDateTime64({}, {})",
                ts,
                params.bind(start),
                precision
            ));
        }

        if let Some(end) = self.query.window.end {
            conditions.push(format!(
                "{} < toDateTime64({}, {})",
                ts,
                params.bind(end),
                precision
            ));
        }

        conditions
    }

    fn row_conditions(&self, params: &mut ParamSlice) -> Vec<String> {
        let mut conditions = Vec::new();

        if let Some(id) = self.query.external_customer() {
            conditions.push(format!("external_customer_id = {}", params.bind(id)));
        }

        if let Some(id) = self.query.customer() {
            conditions.push(format!("customer_id = {}", params.bind(id)));
        }

        conditions.extend(compile_conditions(
            &self.config.properties_column,
            &self.query.filters,
            params,
        ));

        conditions
    }
}
