//! Role-based access guards and the navigation route table.
//!
//! Guards are synchronous reads of the already-loaded [`SessionState`]; they
//! never suspend and never retry. A denial is not an error but a
//! [`GuardOutcome::Redirect`], optionally carrying a [`Notice`] for the user.

use log::debug;
use std::sync::Arc;

use crate::auth::{Role, SessionState};

/// Transient, user-visible message shown alongside a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub required_role: Role,
}

impl Notice {
    fn access_denied(required_role: Role) -> Self {
        Self {
            message: format!("Access denied. A {} account is required.", required_role.label()),
            required_role,
        }
    }
}

/// Result of evaluating a guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Navigation proceeds
    Allow,
    /// Navigation is replaced by a redirect
    Redirect {
        target: String,
        notice: Option<Notice>,
    },
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }

    /// Redirect target, if any
    pub fn target(&self) -> Option<&str> {
        match self {
            GuardOutcome::Allow => None,
            GuardOutcome::Redirect { target, .. } => Some(target),
        }
    }
}

/// A route-entry predicate
pub trait AccessGuard: Send + Sync {
    fn can_activate(&self, session: &SessionState) -> GuardOutcome;
}

/// Admits exactly one role.
///
/// Principals of another role get a notice and a redirect: rider routes send
/// them to the company dashboard, company and admin routes to their own home.
/// Anonymous visitors are sent to the sign-in page for the required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGuard {
    required: Role,
}

impl RoleGuard {
    pub fn new(required: Role) -> Self {
        Self { required }
    }

    /// Company-only routes
    pub fn company() -> Self {
        Self::new(Role::Company)
    }

    /// Rider-only routes
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Admin-only routes
    pub fn admin() -> Self {
        Self::new(Role::Admin)
    }

    pub fn required(&self) -> Role {
        self.required
    }

    fn denied_target(&self, role: Role) -> &'static str {
        match self.required {
            Role::User => Role::Company.home_route(),
            Role::Company | Role::Admin => role.home_route(),
        }
    }
}

impl AccessGuard for RoleGuard {
    fn can_activate(&self, session: &SessionState) -> GuardOutcome {
        match session.current_role() {
            Some(role) if role == self.required => GuardOutcome::Allow,
            Some(role) if session.is_authenticated() => GuardOutcome::Redirect {
                target: self.denied_target(role).to_string(),
                notice: Some(Notice::access_denied(self.required)),
            },
            _ => GuardOutcome::Redirect {
                target: self.required.login_route().to_string(),
                notice: None,
            },
        }
    }
}

struct RouteEntry {
    prefix: String,
    guard: Option<Arc<dyn AccessGuard>>,
}

/// Ordered table of guarded path prefixes.
///
/// The longest matching prefix decides; an entry without a guard marks a
/// public page inside an otherwise guarded section.
pub struct Navigator {
    session: Arc<SessionState>,
    routes: Vec<RouteEntry>,
}

impl Navigator {
    /// Navigator with an empty route table
    pub fn new(session: Arc<SessionState>) -> Self {
        Self {
            session,
            routes: Vec::new(),
        }
    }

    /// Navigator with the front-end's standard sections
    pub fn with_default_routes(session: Arc<SessionState>) -> Self {
        Self::new(session)
            .guard("/company", RoleGuard::company())
            .public("/company/login")
            .public("/company/register")
            .guard("/admin", RoleGuard::admin())
            .public("/admin/login")
            .guard("/dashboard", RoleGuard::user())
            .guard("/tickets", RoleGuard::user())
            .guard("/bookings", RoleGuard::user())
            .guard("/profile", RoleGuard::user())
    }

    /// Guard every path under `prefix`
    pub fn guard(mut self, prefix: &str, guard: impl AccessGuard + 'static) -> Self {
        self.routes.push(RouteEntry {
            prefix: prefix.to_string(),
            guard: Some(Arc::new(guard)),
        });
        self
    }

    /// Leave every path under `prefix` open
    pub fn public(mut self, prefix: &str) -> Self {
        self.routes.push(RouteEntry {
            prefix: prefix.to_string(),
            guard: None,
        });
        self
    }

    /// Evaluate the guard for `path`
    pub fn navigate(&self, path: &str) -> GuardOutcome {
        let entry = self
            .routes
            .iter()
            .filter(|entry| matches_prefix(path, &entry.prefix))
            .max_by_key(|entry| entry.prefix.len());

        let outcome = match entry.and_then(|entry| entry.guard.as_ref()) {
            Some(guard) => guard.can_activate(&self.session),
            None => GuardOutcome::Allow,
        };
        if let GuardOutcome::Redirect { target, .. } = &outcome {
            debug!("Navigation to {} redirected to {}", path, target);
        }
        outcome
    }
}

/// Prefix match on whole path segments
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}
