//! Authentication for riders, companies and administrators

mod session;
mod token;
mod types;

use log::{info, warn};
use reqwest::Response;
use std::sync::Arc;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::{error_message, ApiClient, Fetch};
use crate::interceptor::CORS_TOKEN_HEADER;

pub use session::*;
pub use token::*;
pub use types::*;

/// Client for the backend's login and registration endpoints.
///
/// Every successful call installs the new session before returning; every
/// failed call leaves the session exactly as it was.
pub struct AuthGateway {
    api: ApiClient,
    session: Arc<SessionState>,
    options: ClientOptions,
}

impl AuthGateway {
    /// Create a new gateway
    pub(crate) fn new(api: ApiClient, session: Arc<SessionState>, options: ClientOptions) -> Self {
        Self {
            api,
            session,
            options,
        }
    }

    /// Sign in a rider
    pub async fn login_user(&self, email: &str, password: &str) -> Result<Principal> {
        let path = self.options.user_login_path.clone();
        self.login(&path, email, password).await
    }

    /// Sign in a bus company
    pub async fn login_company(&self, email: &str, password: &str) -> Result<Principal> {
        let path = self.options.company_login_path.clone();
        self.login(&path, email, password).await
    }

    /// Sign in an administrator
    pub async fn login_admin(&self, email: &str, password: &str) -> Result<Principal> {
        let path = self.options.admin_login_path.clone();
        self.login(&path, email, password).await
    }

    /// Register a rider account and sign it in
    pub async fn register_user(&self, registration: UserRegistration) -> Result<Principal> {
        self.register(&Registration::User(registration)).await
    }

    /// Register a company account and sign it in
    pub async fn register_company(&self, registration: CompanyRegistration) -> Result<Principal> {
        self.register(&Registration::Company(registration)).await
    }

    /// Sign out locally, dropping every stored credential
    pub fn logout(&self) {
        self.session.clear();
    }

    /// Session this gateway writes to
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    async fn login(&self, path: &str, email: &str, password: &str) -> Result<Principal> {
        let credentials = LoginCredentials::new(email, password);
        let response = Fetch::post(&self.api, path)
            .json(&credentials)?
            .execute_raw()
            .await?;

        let principal = self.establish(response).await.map_err(|e| {
            warn!("Login at {} rejected: {}", path, e);
            e
        })?;
        info!("Signed in as {}", principal.role());
        Ok(principal)
    }

    async fn register(&self, registration: &Registration) -> Result<Principal> {
        let path = self.options.register_path.clone();
        let response = Fetch::post(&self.api, &path)
            .json(registration)?
            .execute_raw()
            .await?;

        let principal = self.establish(response).await.map_err(|e| {
            warn!("Registration rejected: {}", e);
            e
        })?;
        info!("Registered and signed in as {}", principal.role());
        Ok(principal)
    }

    /// Validate a login/registration response and install the session.
    ///
    /// Nothing is written until the whole response has been validated.
    async fn establish(&self, response: Response) -> Result<Principal> {
        let status = response.status();
        let anti_forgery_token = response
            .headers()
            .get(CORS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::authentication(status.as_u16(), error_message(&text)));
        }

        let parsed: AuthResponse = serde_json::from_str(&text).map_err(|e| {
            Error::authentication(status.as_u16(), format!("malformed auth response: {}", e))
        })?;
        let (principal, token) = parsed
            .into_principal()
            .map_err(|e| Error::authentication(status.as_u16(), e))?;

        self.session
            .set_session(principal.clone(), &token, anti_forgery_token.as_deref());
        Ok(principal)
    }
}
