//! Statement assembly
//!
//! Joins pipeline fragments into `WITH a AS (...), b AS (...) SELECT ...`
//! and concatenates their arguments in the same order.

use serde::Serialize;

use crate::error::{Result, UsageError};
use crate::fragment::{QueryFragment, placeholder_indices};
use crate::params::Param;

/// A compiled statement and its arguments
///
/// Placeholders run `?1..?N` in order of appearance; argument `N-1` binds
/// placeholder `?N`. Hand both to the driver unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    sql: String,
    args: Vec<Param>,
}

impl CompiledQuery {
    /// Statement text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments in placeholder order
    pub fn args(&self) -> &[Param] {
        &self.args
    }

    /// Split into text and arguments
    pub fn into_parts(self) -> (String, Vec<Param>) {
        (self.sql, self.args)
    }
}

/// Collects CTE fragments and produces the final statement
#[derive(Debug, Default)]
pub struct Assembler {
    ctes: Vec<(String, String)>,
    args: Vec<Param>,
}

impl Assembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next fragment must be built at
    pub fn next_offset(&self) -> usize {
        self.args.len()
    }

    /// Number of CTE fragments pushed so far
    pub fn len(&self) -> usize {
        self.ctes.len()
    }

    /// Whether no CTE fragment has been pushed
    pub fn is_empty(&self) -> bool {
        self.ctes.is_empty()
    }

    /// Append a named pipeline stage
    pub fn push(&mut self, fragment: QueryFragment) -> Result<()> {
        self.accept(&fragment)?;
        let name = fragment.name().to_string();
        let body = fragment.body().to_string();
        self.args.extend(fragment.into_args());
        self.ctes.push((name, body));
        Ok(())
    }

    /// Append several pipeline stages in order
    pub fn push_all(&mut self, fragments: impl IntoIterator<Item = QueryFragment>) -> Result<()> {
        for fragment in fragments {
            self.push(fragment)?;
        }
        Ok(())
    }

    /// Finish with the final projection
    pub fn finish(mut self, projection: QueryFragment) -> Result<CompiledQuery> {
        self.accept(&projection)?;

        let mut sql = String::new();
        if !self.ctes.is_empty() {
            let ctes: Vec<String> = self
                .ctes
                .iter()
                .map(|(name, body)| format!("{} AS (\n{}\n)", name, body))
                .collect();
            sql.push_str("WITH ");
            sql.push_str(&ctes.join(",\n"));
            sql.push('\n');
        }
        sql.push_str(projection.body());

        let name = projection.name().to_string();
        self.args.extend(projection.into_args());

        // Whole-statement check: 1..N, in order
        let found = placeholder_indices(&sql);
        if !found.iter().copied().eq(1..=self.args.len()) {
            return Err(UsageError::PlaceholderMismatch {
                fragment: name,
                placeholders: found.len(),
                args: self.args.len(),
                offset: 0,
            });
        }

        Ok(CompiledQuery {
            sql,
            args: self.args,
        })
    }

    fn accept(&self, fragment: &QueryFragment) -> Result<()> {
        if fragment.offset() != self.next_offset() {
            return Err(UsageError::PlaceholderMismatch {
                fragment: fragment.name().to_string(),
                placeholders: placeholder_indices(fragment.body()).len(),
                args: fragment.args().len(),
                offset: fragment.offset(),
            });
        }
        fragment.check_parity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::ParamSlice;

    fn fragment(name: &str, offset: usize, values: &[&str]) -> QueryFragment {
        let mut params = ParamSlice::new(offset);
        let conditions: Vec<String> = values
            .iter()
            .map(|v| format!("c = {}", params.bind(*v)))
            .collect();
        QueryFragment::new(name, format!("SELECT * WHERE {}", conditions.join(" AND ")), params)
    }

    #[test]
    fn test_assembles_ctes_in_order() {
        let mut asm = Assembler::new();
        asm.push(fragment("a", 0, &["x", "y"])).unwrap();
        asm.push(fragment("b", 2, &["z"])).unwrap();
        let compiled = asm.finish(fragment("final", 3, &["w"])).unwrap();

        assert!(compiled.sql().starts_with("WITH a AS (\n"));
        assert!(compiled.sql().contains("),\nb AS (\n"));
        assert_eq!(
            compiled.args(),
            &[
                Param::from("x"),
                Param::from("y"),
                Param::from("z"),
                Param::from("w")
            ]
        );
        assert_eq!(placeholder_indices(compiled.sql()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_fragment_at_wrong_offset() {
        let mut asm = Assembler::new();
        asm.push(fragment("a", 0, &["x"])).unwrap();

        // Built as if it were first: would reuse ?1
        let err = asm.push(fragment("b", 0, &["y"])).unwrap_err();
        assert!(matches!(err, UsageError::PlaceholderMismatch { .. }));
    }

    #[test]
    fn test_projection_only() {
        let compiled = Assembler::new()
            .finish(fragment("final", 0, &["x"]))
            .unwrap();
        assert_eq!(compiled.sql(), "SELECT * WHERE c = ?1");
    }

    #[test]
    fn test_into_parts() {
        let compiled = Assembler::new()
            .finish(fragment("final", 0, &["x"]))
            .unwrap();
        let (sql, args) = compiled.into_parts();
        assert_eq!(sql, "SELECT * WHERE c = ?1");
        assert_eq!(args, vec![Param::from("x")]);
    }
}
