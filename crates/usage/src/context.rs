//! Execution context
//!
//! Tenant and environment scoping comes from the caller's request context,
//! never from the query body.

/// Read-only tenancy lookups for a single request
pub trait ExecutionContext: Send + Sync {
    /// Tenant the request is scoped to
    fn tenant_id(&self) -> Option<&str>;

    /// Environment the request is scoped to
    fn environment_id(&self) -> Option<&str>;
}

/// Plain tenancy context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<String>,
    environment_id: Option<String>,
}

impl TenantContext {
    /// Create a context scoped to a tenant and environment
    pub fn new(tenant_id: impl Into<String>, environment_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            environment_id: Some(environment_id.into()),
        }
    }

    /// Create a context scoped to a tenant only
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            environment_id: None,
        }
    }

    /// Create a context with no scoping
    pub fn unscoped() -> Self {
        Self::default()
    }
}

impl ExecutionContext for TenantContext {
    fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref().filter(|id| !id.is_empty())
    }

    fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref().filter(|id| !id.is_empty())
    }
}
