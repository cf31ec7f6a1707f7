//! End-to-end compilation tests through the public API
//!
//! Covers the billing scenarios and a set of classic SQL injection strings
//! pushed through every user-supplied field.

use chrono::{DateTime, Utc};
use tell_usage::fragment::placeholder_indices;
use tell_usage::{
    AggregationType, CompiledQuery, FilterGroup, Param, TenantContext, TimeWindow, UsageQuery,
    UsageQueryCompiler,
};

const INJECTION_VECTORS: &[&str] = &[
    "'; DROP TABLE events; --",
    "' OR 1=1; --",
    "' UNION SELECT * FROM events; --",
    "'; INSERT INTO events VALUES ('malicious'); --",
    "' OR 'x'='x",
    "\"; DROP TABLE events; --",
    "' AND SLEEP(5); --",
    "'; EXEC xp_cmdshell('dir'); --",
    "1' OR '1'='1",
    "admin'--",
    "admin'/*",
    "' OR 1=1#",
    "') OR ('1'='1",
    "'; DELETE FROM events WHERE 1=1; --",
    "' UNION ALL SELECT NULL,NULL,NULL; --",
    "x') OR 1=1 --",
];

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn compile(query: &UsageQuery, groups: &[FilterGroup]) -> CompiledQuery {
    UsageQueryCompiler::default()
        .compile(&TenantContext::unscoped(), query, groups)
        .unwrap()
}

/// Assert the value is absent from the text and bound at placeholder `?n`
fn assert_bound_at(compiled: &CompiledQuery, value: &str, n: usize) {
    let sql = compiled.sql();
    assert!(!sql.contains(value), "{:?} leaked into:\n{}", value, sql);
    assert_eq!(compiled.args()[n - 1], Param::from(value), "{:?}", value);
    assert_eq!(
        placeholder_indices(sql),
        (1..=compiled.args().len()).collect::<Vec<_>>()
    );
    for keyword in ["DROP", "UNION", "INSERT", "DELETE", "EXEC", "SLEEP", "--", "/*", "#"] {
        assert!(!sql.contains(keyword), "{} in:\n{}", keyword, sql);
    }
    assert!(!sql.replace("'Nullable(Float64)'", "").contains('\''));
}

#[test]
fn test_region_scenario() {
    let window = TimeWindow::new(ts("2024-01-01T00:00:00Z"), ts("2024-02-01T00:00:00Z")).unwrap();
    let query = UsageQuery::count("api_call")
        .with_window(window)
        .with_filter("region", ["us-east-1", "us-west-1"]);

    let compiled = compile(&query, &[]);
    let (sql, args) = compiled.into_parts();

    assert_eq!(sql.matches(" AS (\n").count(), 1);
    assert_eq!(
        args,
        vec![
            Param::from("api_call"),
            Param::from(ts("2024-01-01T00:00:00Z")),
            Param::from(ts("2024-02-01T00:00:00Z")),
            Param::from("region"),
            Param::from("us-east-1"),
            Param::from("us-west-1"),
        ]
    );
}

#[test]
fn test_priority_scenario() {
    let groups = vec![
        FilterGroup::new("g1", 2).with_filter("tier", ["gold"]),
        FilterGroup::new("g2", 1).with_filter("tier", ["gold"]),
    ];
    let compiled = compile(&UsageQuery::count("api_call"), &groups);

    assert!(
        compiled
            .sql()
            .contains("argMax(group_id, (group_priority, group_id)) AS best_match_group")
    );
    assert_eq!(compiled.args()[1], Param::from("g1"));
    assert_eq!(compiled.args()[2], Param::Int(2));
    assert_eq!(compiled.args()[5], Param::from("g2"));
    assert_eq!(compiled.args()[6], Param::Int(1));
}

#[test]
fn test_injection_event_name() {
    for vector in INJECTION_VECTORS {
        let compiled = compile(&UsageQuery::count(*vector), &[]);
        assert!(compiled.sql().contains("event_name = ?1"));
        assert_bound_at(&compiled, vector, 1);
    }
}

#[test]
fn test_injection_customer_ids() {
    for vector in INJECTION_VECTORS {
        let query = UsageQuery::count("api_call").with_external_customer_id(*vector);
        let compiled = compile(&query, &[]);
        assert!(compiled.sql().contains("external_customer_id = ?2"));
        assert_bound_at(&compiled, vector, 2);

        let query = UsageQuery::count("api_call").with_customer_id(*vector);
        let compiled = compile(&query, &[]);
        assert!(compiled.sql().contains("customer_id = ?2"));
        assert_bound_at(&compiled, vector, 2);
    }
}

#[test]
fn test_injection_filter_values() {
    for vector in INJECTION_VECTORS {
        let query = UsageQuery::count("api_call").with_filter("tier", [*vector]);
        let compiled = compile(&query, &[]);
        assert_bound_at(&compiled, vector, 3);
    }
}

#[test]
fn test_injection_property_names() {
    for vector in INJECTION_VECTORS {
        let query = UsageQuery::count("api_call").with_filter(*vector, ["gold"]);
        assert_bound_at(&compile(&query, &[]), vector, 2);

        for agg in [
            AggregationType::Sum,
            AggregationType::Avg,
            AggregationType::CountDistinct,
        ] {
            let query = UsageQuery::new("api_call", agg).with_property(*vector);
            assert_bound_at(&compile(&query, &[]), vector, 2);
        }
    }
}

#[test]
fn test_injection_filter_groups() {
    for vector in INJECTION_VECTORS {
        let groups = vec![FilterGroup::new(*vector, 1).with_filter("tier", [*vector])];
        let compiled = compile(&UsageQuery::count("api_call"), &groups);

        // id, then the property value after the property name
        assert_bound_at(&compiled, vector, 2);
        assert_bound_at(&compiled, vector, 5);

        let groups = vec![FilterGroup::new("g1", 1).with_filter(*vector, ["gold"])];
        let compiled = compile(&UsageQuery::count("api_call"), &groups);
        assert_bound_at(&compiled, vector, 4);
    }
}

#[test]
fn test_compiled_query_serializes() {
    let compiled = compile(&UsageQuery::count("api_call"), &[]);
    let json = serde_json::to_value(&compiled).unwrap();
    assert_eq!(json["args"][0], "api_call");
    assert!(json["sql"].as_str().unwrap().starts_with("WITH base_events"));
}
