//! Session state for the signed-in principal

use log::{info, warn};
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::watch;

use crate::auth::token::is_token_expired;
use crate::auth::types::{Identity, Principal, Role};
use crate::config::ExecutionContext;
use crate::store::{CredentialField, CredentialStore};

/// In-memory, observable session.
///
/// Each stream replays its latest value to new subscribers. `set_session` and
/// `clear` publish identity first, then role, then the combined principal.
pub struct SessionState {
    store: CredentialStore,
    context: ExecutionContext,
    token: RwLock<Option<String>>,
    identity: watch::Sender<Option<Identity>>,
    role: watch::Sender<Option<Role>>,
    principal: watch::Sender<Option<Principal>>,
    // serializes writers so the three streams never interleave
    publish: Mutex<()>,
}

impl SessionState {
    /// Create the session, seeding it from the credential store when running
    /// interactively.
    pub fn new(store: CredentialStore, context: ExecutionContext) -> Self {
        let (identity, _) = watch::channel(None);
        let (role, _) = watch::channel(None);
        let (principal, _) = watch::channel(None);

        let state = Self {
            store,
            context,
            token: RwLock::new(None),
            identity,
            role,
            principal,
            publish: Mutex::new(()),
        };

        if context.is_interactive() {
            state.restore();
        }
        state
    }

    /// Anonymous session with nowhere to persist
    pub fn detached() -> Self {
        Self::new(CredentialStore::unavailable(), ExecutionContext::NonInteractive)
    }

    fn restore(&self) {
        let stored = self.store.load();
        let principal = match stored.principal() {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                if stored.token.as_deref().is_some_and(|t| !t.is_empty()) {
                    warn!("Stored token has no session beside it, discarding it");
                    self.store.remove(CredentialField::Token);
                }
                return;
            }
            Err(e) => {
                warn!("Stored session is inconsistent, starting anonymous: {}", e);
                self.store.clear();
                return;
            }
        };

        let token = stored.token.filter(|t| !t.is_empty());
        if let Some(token) = &token {
            if is_token_expired(token) {
                info!("Stored session token has expired, starting anonymous");
                self.store.clear();
                return;
            }
        }

        info!("Restored {} session", principal.role());
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        self.publish(Some(principal));
    }

    fn publish(&self, principal: Option<Principal>) {
        let _guard = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let (role, identity) = match principal.clone() {
            Some(p) => {
                let (role, identity) = p.into_parts();
                (Some(role), Some(identity))
            }
            None => (None, None),
        };
        self.identity.send_replace(identity);
        self.role.send_replace(role);
        self.principal.send_replace(principal);
    }

    /// Install a new session and persist all four values before returning.
    ///
    /// Without a fresh anti-forgery token the stored one is kept.
    pub fn set_session(
        &self,
        principal: Principal,
        token: &str,
        anti_forgery_token: Option<&str>,
    ) {
        let anti_forgery_token = match anti_forgery_token {
            Some(value) => value.to_string(),
            None => self.store.anti_forgery_token(),
        };

        self.store.save_session(&principal, token, &anti_forgery_token);
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());

        info!(
            "Session started for {} ({})",
            principal.identity().display_name(),
            principal.role()
        );
        self.publish(Some(principal));
    }

    /// Drop the session and every persisted credential. Idempotent.
    pub fn clear(&self) {
        self.store.clear();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.is_authenticated() {
            info!("Session cleared");
        }
        self.publish(None);
    }

    /// Identity stream
    pub fn identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Role stream
    pub fn role(&self) -> watch::Receiver<Option<Role>> {
        self.role.subscribe()
    }

    /// Combined role and identity stream
    pub fn principal(&self) -> watch::Receiver<Option<Principal>> {
        self.principal.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    pub fn current_role(&self) -> Option<Role> {
        *self.role.borrow()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.principal.borrow().clone()
    }

    pub fn is_user(&self) -> bool {
        self.current_role() == Some(Role::User)
    }

    pub fn is_company(&self) -> bool {
        self.current_role() == Some(Role::Company)
    }

    pub fn is_admin(&self) -> bool {
        self.current_role() == Some(Role::Admin)
    }

    /// Session token held in memory
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Backing credential store
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("context", &self.context)
            .field("role", &self.current_role())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
