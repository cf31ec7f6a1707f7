//! Aggregation stage
//!
//! Final projection: one `(filter_group_id, value)` row per bucket, ordered
//! by bucket id. Without filter groups there is a single bucket whose id is
//! NULL.

use crate::condition::property_expr;
use crate::config::CompilerConfig;
use crate::fragment::{ParamSlice, QueryFragment};
use crate::params::{AggregationType, UsageQuery};
use crate::stage::{BASE_EVENTS, BEST_MATCHES, USAGE};

/// Rows the projection reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationSource {
    /// Base events, single implicit bucket
    BaseEvents,
    /// Events attributed to their best filter group
    BestMatches,
}

/// Builds the final projection
pub struct AggregationStage<'a> {
    config: &'a CompilerConfig,
    query: &'a UsageQuery,
    source: AggregationSource,
}

impl<'a> AggregationStage<'a> {
    /// Create the stage for a validated query
    pub fn new(config: &'a CompilerConfig, query: &'a UsageQuery, source: AggregationSource) -> Self {
        Self {
            config,
            query,
            source,
        }
    }

    /// Build the projection with placeholders starting after `offset`
    pub fn build(&self, offset: usize) -> QueryFragment {
        let mut params = ParamSlice::new(offset);
        let value = self.value_expr(&mut params);

        let body = match self.source {
            AggregationSource::BestMatches => format!(
                "SELECT\n    best_match_group AS filter_group_id,\n    {} AS value\nFROM {}\nGROUP BY best_match_group\nORDER BY best_match_group",
                value, BEST_MATCHES,
            ),
            AggregationSource::BaseEvents => format!(
                "SELECT\n    NULL AS filter_group_id,\n    {} AS value\nFROM {}",
                value, BASE_EVENTS,
            ),
        };

        QueryFragment::new(USAGE, body, params)
    }

    fn value_expr(&self, params: &mut ParamSlice) -> String {
        let props = &self.config.properties_column;
        // Validation guarantees a property for every non-COUNT aggregation
        let property = self.query.property().unwrap_or_default();

        match self.query.aggregation {
            AggregationType::Count => "COUNT(*)".to_string(),
            AggregationType::Sum => format!("SUM({})", numeric_expr(props, property, params)),
            AggregationType::Avg => format!("AVG({})", numeric_expr(props, property, params)),
            AggregationType::CountDistinct => format!(
                "COUNT(DISTINCT {})",
                property_expr(props, &params.bind(property))
            ),
        }
    }
}

/// Numeric value of a property, NULL when it is missing or not a number
///
/// Accepts both JSON numbers and numeric strings. SUM and AVG skip NULLs, so
/// malformed values never fail the query or skew an average.
fn numeric_expr(props: &str, property: &str, params: &mut ParamSlice) -> String {
    let as_number = format!(
        "JSONExtract({}, {}, 'Nullable(Float64)')",
        props,
        params.bind(property)
    );
    let as_text = format!(
        "toFloat64OrNull({})",
        property_expr(props, &params.bind(property))
    );
    format!("coalesce({}, {})", as_number, as_text)
}
