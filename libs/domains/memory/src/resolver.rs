//! Tenant identity resolution.
//!
//! An ordered chain of strategies is tried per call; the first strategy
//! yielding a non-empty identifier wins. No strategy ever defaults to a
//! placeholder identity: when every strategy misses, the outcome is
//! [`TenantResolution::Unresolved`], which store rejects and search treats
//! as fail-closed-empty.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::models::{TenantId, TenantResolution};

/// Per-call context the resolver works from.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Tenant identity passed explicitly with the call, if any.
    pub explicit_user_id: Option<String>,
    /// Identifier of the originating connection/session, if any.
    pub session_id: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_explicit_user(mut self, user_id: impl Into<String>) -> Self {
        self.explicit_user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// One step of the resolution chain.
pub trait TenantStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// A strategy returns `None` when it cannot produce a valid identity;
    /// empty identifiers are never promoted to a tenant.
    fn resolve(&self, ctx: &CallContext) -> Option<TenantId>;
}

/// Uses the tenant identity passed explicitly with the call.
pub struct ExplicitArgStrategy;

impl TenantStrategy for ExplicitArgStrategy {
    fn name(&self) -> &'static str {
        "explicit-argument"
    }

    fn resolve(&self, ctx: &CallContext) -> Option<TenantId> {
        ctx.explicit_user_id
            .as_deref()
            .and_then(|id| TenantId::new(id).ok())
    }
}

/// Session-scoped identity store keyed by the originating connection.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, TenantId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, session_id: impl Into<String>, tenant: TenantId) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session_id.into(), tenant);
        }
    }

    pub fn unbind(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(session_id);
        }
    }

    pub fn get(&self, session_id: &str) -> Option<TenantId> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(session_id).cloned())
    }
}

/// Resolves from the shared [`SessionStore`].
pub struct SessionStrategy {
    store: Arc<SessionStore>,
}

impl SessionStrategy {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl TenantStrategy for SessionStrategy {
    fn name(&self) -> &'static str {
        "session-store"
    }

    fn resolve(&self, ctx: &CallContext) -> Option<TenantId> {
        ctx.session_id.as_deref().and_then(|id| self.store.get(id))
    }
}

/// Process-level environment fallback, intended for single-tenant and dev
/// deployments. Lowest priority in the standard chain; production
/// deployments should not configure it.
pub struct EnvStrategy {
    var: String,
}

impl EnvStrategy {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TenantStrategy for EnvStrategy {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn resolve(&self, _ctx: &CallContext) -> Option<TenantId> {
        core_config::env_optional(&self.var).and_then(|id| TenantId::new(id).ok())
    }
}

/// Ordered tenant resolution chain, fixed at construction time.
pub struct TenantResolver {
    strategies: Vec<Box<dyn TenantStrategy>>,
}

impl TenantResolver {
    pub fn new(strategies: Vec<Box<dyn TenantStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: explicit call argument, then session-scoped
    /// identity, then (optionally) the environment fallback. Session
    /// identity deliberately outranks the environment variable when both
    /// are present.
    pub fn standard(session_store: Arc<SessionStore>, env_var: Option<String>) -> Self {
        let mut strategies: Vec<Box<dyn TenantStrategy>> = vec![
            Box::new(ExplicitArgStrategy),
            Box::new(SessionStrategy::new(session_store)),
        ];

        if let Some(var) = env_var {
            strategies.push(Box::new(EnvStrategy::new(var)));
        }

        Self::new(strategies)
    }

    pub fn resolve(&self, ctx: &CallContext) -> TenantResolution {
        for strategy in &self.strategies {
            if let Some(tenant) = strategy.resolve(ctx) {
                debug!(strategy = strategy.name(), tenant = %tenant, "Tenant resolved");
                return TenantResolution::Resolved(tenant);
            }
        }

        TenantResolution::Unresolved
    }
}
