//! Parameterized query fragments
//!
//! Every fragment is built at a fixed offset: the number of arguments bound
//! by the fragments before it. Its placeholders are therefore already final
//! (`?{offset + 1}` onwards) and the assembler only has to verify them.

use crate::error::{Result, UsageError};
use crate::params::Param;

/// Arguments bound by one fragment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSlice {
    offset: usize,
    args: Vec<Param>,
}

impl ParamSlice {
    /// Start a slice after `offset` previously bound arguments
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            args: Vec::new(),
        }
    }

    /// Bind a value and return its placeholder
    pub fn bind(&mut self, value: impl Into<Param>) -> String {
        self.args.push(value.into());
        format!("?{}", self.offset + self.args.len())
    }

    /// Offset this slice starts at
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset the next slice should start at
    pub fn next_offset(&self) -> usize {
        self.offset + self.args.len()
    }

    /// Number of bound arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether nothing has been bound
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Bound arguments, in placeholder order
    pub fn args(&self) -> &[Param] {
        &self.args
    }
}

/// One named piece of the final statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFragment {
    name: String,
    body: String,
    offset: usize,
    args: Vec<Param>,
}

impl QueryFragment {
    /// Create a fragment from its body and the arguments it bound
    pub fn new(name: impl Into<String>, body: impl Into<String>, params: ParamSlice) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            offset: params.offset,
            args: params.args,
        }
    }

    /// Create a fragment that binds no arguments
    pub fn unbound(name: impl Into<String>, body: impl Into<String>, offset: usize) -> Self {
        Self::new(name, body, ParamSlice::new(offset))
    }

    /// Fragment name (the CTE alias for pipeline stages)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fragment body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Offset the fragment was built at
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Arguments bound by the fragment
    pub fn args(&self) -> &[Param] {
        &self.args
    }

    pub(crate) fn into_args(self) -> Vec<Param> {
        self.args
    }

    /// Check that the body numbers exactly `offset+1 ..= offset+len(args)`, in order
    pub fn check_parity(&self) -> Result<()> {
        let found = placeholder_indices(&self.body);
        let expected = (self.offset + 1..=self.offset + self.args.len()).collect::<Vec<_>>();

        if found != expected {
            return Err(UsageError::PlaceholderMismatch {
                fragment: self.name.clone(),
                placeholders: found.len(),
                args: self.args.len(),
                offset: self.offset,
            });
        }
        Ok(())
    }
}

/// Positional placeholder numbers (`?N`) in the order they appear
pub fn placeholder_indices(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut indices = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'?' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if let Ok(n) = sql[start..end].parse() {
                indices.push(n);
            }
            i = end;
        } else {
            i += 1;
        }
    }

    indices
}
