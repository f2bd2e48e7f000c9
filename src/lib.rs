//! Busline session client
//!
//! The session and authorization core of the Busline bus-ticketing front-end:
//! persisted credentials, observable session state, login and registration,
//! request augmentation with bearer and anti-forgery tokens, and role-based
//! access guards.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod interceptor;
pub mod resource;
pub mod store;

use log::info;
use reqwest::Client;
use std::sync::Arc;

use crate::auth::{AuthGateway, SessionState};
use crate::config::ClientOptions;
use crate::error::Result;
use crate::fetch::ApiClient;
use crate::guard::{GuardOutcome, Navigator};
use crate::interceptor::{ExemptPaths, SessionInterceptor};
use crate::resource::{ResourceClient, BUSES_PATH, ROUTES_PATH, TICKETS_PATH};
use crate::store::{CredentialStore, FileStorage};

/// The main entry point: one session per running application
pub struct Busline {
    /// Client options
    pub options: ClientOptions,
    session: Arc<SessionState>,
    api: ApiClient,
    auth: AuthGateway,
    navigator: Navigator,
}

impl Busline {
    /// Create a client for the backend at `base_url`, keeping credentials in memory
    ///
    /// # Example
    ///
    /// ```
    /// use busline_session::Busline;
    ///
    /// let busline = Busline::new("http://localhost:8080/api").unwrap();
    /// assert!(!busline.session().is_authenticated());
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Self::new_with_options(ClientOptions::new(base_url))
    }

    /// Create a client with custom options.
    ///
    /// Credentials live in `options.storage_path` when set, in memory
    /// otherwise, and nowhere in a non-interactive context.
    pub fn new_with_options(options: ClientOptions) -> Result<Self> {
        let store = if !options.context.is_interactive() {
            CredentialStore::unavailable()
        } else if let Some(path) = &options.storage_path {
            CredentialStore::new(Arc::new(FileStorage::open(path)?))
        } else {
            CredentialStore::in_memory()
        };
        Self::new_with_store(options, store)
    }

    /// Create a client over an existing credential store
    pub fn new_with_store(options: ClientOptions, store: CredentialStore) -> Result<Self> {
        options.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let session = Arc::new(SessionState::new(store, options.context));
        let interceptor = SessionInterceptor::new(
            session.clone(),
            ExemptPaths::new(options.exempt_path_prefixes.iter().cloned()),
        );
        let api =
            ApiClient::new(&options.base_url, http_client)?.with_interceptor(Arc::new(interceptor));
        let auth = AuthGateway::new(api.clone(), session.clone(), options.clone());
        let navigator = Navigator::with_default_routes(session.clone());

        info!(
            "Busline client ready for {} ({:?}, signed in: {})",
            options.base_url,
            options.context,
            session.is_authenticated()
        );

        Ok(Self {
            options,
            session,
            api,
            auth,
            navigator,
        })
    }

    /// Login, registration and logout
    pub fn auth(&self) -> &AuthGateway {
        &self.auth
    }

    /// Current session
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Augmented HTTP client for direct API calls
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Route table with its guards
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Replace the route table
    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    /// Evaluate the guards for a front-end path
    pub fn navigate(&self, path: &str) -> GuardOutcome {
        self.navigator.navigate(path)
    }

    /// Client for an arbitrary REST collection
    pub fn resource(&self, path: &str) -> ResourceClient {
        ResourceClient::new(self.api.clone(), path)
    }

    /// Bus routes
    pub fn routes(&self) -> ResourceClient {
        self.resource(ROUTES_PATH)
    }

    /// Buses
    pub fn buses(&self) -> ResourceClient {
        self.resource(BUSES_PATH)
    }

    /// Tickets
    pub fn tickets(&self) -> ResourceClient {
        self.resource(TICKETS_PATH)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Identity, Principal, Role};
    pub use crate::config::{ClientOptions, ExecutionContext};
    pub use crate::error::Error;
    pub use crate::guard::GuardOutcome;
    pub use crate::Busline;
}
