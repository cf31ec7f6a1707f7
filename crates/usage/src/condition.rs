//! Property condition compilation
//!
//! Property names come from tenant-defined metering schemas, so both the name
//! and every value are bound as arguments. Nothing from a filter map is ever
//! written into the SQL text.

use crate::fragment::ParamSlice;
use crate::params::PropertyFilters;

/// JSON extraction of a property whose name is bound at `placeholder`
pub fn property_expr(properties_column: &str, placeholder: &str) -> String {
    format!("JSONExtractString({}, {})", properties_column, placeholder)
}

/// Compile one property condition
///
/// One value compiles to an equality, several to `IN (...)`. Returns `None`
/// for an empty value list, binding nothing.
pub fn compile_condition(
    properties_column: &str,
    property: &str,
    values: &[String],
    params: &mut ParamSlice,
) -> Option<String> {
    match values {
        [] => None,
        [value] => {
            let expr = property_expr(properties_column, &params.bind(property));
            Some(format!("{} = {}", expr, params.bind(value)))
        }
        values => {
            let expr = property_expr(properties_column, &params.bind(property));
            let placeholders: Vec<String> = values.iter().map(|v| params.bind(v)).collect();
            Some(format!("{} IN ({})", expr, placeholders.join(", ")))
        }
    }
}

/// Compile every property condition, in property order
pub fn compile_conditions(
    properties_column: &str,
    filters: &PropertyFilters,
    params: &mut ParamSlice,
) -> Vec<String> {
    filters
        .iter()
        .filter_map(|(property, values)| {
            compile_condition(properties_column, property, values, params)
        })
        .collect()
}

/// Compile a filter map into one ANDed expression
///
/// Returns `None` when the map produces no condition; callers decide what an
/// empty filter set means for them.
pub fn compile_filters(
    properties_column: &str,
    filters: &PropertyFilters,
    params: &mut ParamSlice,
) -> Option<String> {
    let conditions = compile_conditions(properties_column, filters, params);
    if conditions.is_empty() {
        None
    } else {
        Some(conditions.join(" AND "))
    }
}
