//! Filter group stage
//!
//! Attributes every base event to at most one filter group. Each row gets an
//! array of `(group_id, priority, matched)` tuples, one per group in request
//! order. The array is expanded with `arrayJoin`, unmatched tuples are
//! dropped, and `argMax(group_id, (priority, group_id))` picks the winner:
//! highest priority first, then the greatest group id on ties. Rows that
//! match no group never reach `best_matches`.

use crate::condition::compile_filters;
use crate::config::CompilerConfig;
use crate::fragment::{ParamSlice, QueryFragment};
use crate::params::FilterGroup;
use crate::stage::{BASE_EVENTS, BEST_MATCHES, FILTER_MATCHES, MATCHED_EVENTS};

/// Condition used for a group without filters
const ALWAYS: &str = "1";

/// Builds `filter_matches`, `matched_events` and `best_matches`
pub struct FilterGroupStage<'a> {
    config: &'a CompilerConfig,
    groups: &'a [FilterGroup],
}

impl<'a> FilterGroupStage<'a> {
    /// Create the stage for a non-empty set of groups
    pub fn new(config: &'a CompilerConfig, groups: &'a [FilterGroup]) -> Self {
        Self { config, groups }
    }

    /// Build the fragments with placeholders starting after `offset`
    ///
    /// Only `filter_matches` binds arguments; the other two fragments are
    /// built at the offset that follows it.
    pub fn build(&self, offset: usize) -> Vec<QueryFragment> {
        let filter_matches = self.filter_matches(offset);
        let next = filter_matches.offset() + filter_matches.args().len();

        vec![
            filter_matches,
            QueryFragment::unbound(MATCHED_EVENTS, self.matched_events(), next),
            QueryFragment::unbound(BEST_MATCHES, self.best_matches(), next),
        ]
    }

    fn filter_matches(&self, offset: usize) -> QueryFragment {
        let mut params = ParamSlice::new(offset);

        let tuples: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                let id = params.bind(&group.id);
                let priority = params.bind(group.priority);
                let matched =
                    compile_filters(&self.config.properties_column, &group.filters, &mut params)
                        .unwrap_or_else(|| ALWAYS.to_string());
                format!("({}, {}, ({}))", id, priority, matched)
            })
            .collect();

        let body = format!(
            "    SELECT\n        *,\n        [\n            {}\n        ] AS group_matches\n    FROM {}",
            tuples.join(",\n            "),
            BASE_EVENTS,
        );

        QueryFragment::new(FILTER_MATCHES, body, params)
    }

    fn matched_events(&self) -> String {
        format!(
            "    SELECT\n        *,\n        arrayJoin(group_matches) AS matched_group,\n        matched_group.1 AS group_id,\n        matched_group.2 AS group_priority,\n        matched_group.3 AS is_match\n    FROM {}",
            FILTER_MATCHES,
        )
    }

    fn best_matches(&self) -> String {
        let key = self.config.dedup_columns();
        format!(
            "    SELECT\n        {key},\n        any({props}) AS {props},\n        argMax(group_id, (group_priority, group_id)) AS best_match_group\n    FROM {source}\n    WHERE is_match = 1\n    GROUP BY {key}",
            key = key,
            props = self.config.properties_column,
            source = MATCHED_EVENTS,
        )
    }
}
