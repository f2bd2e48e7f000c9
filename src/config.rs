//! Configuration options for the Busline session client

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Rider login endpoint
pub const USER_LOGIN_PATH: &str = "/auth/login";

/// Company login endpoint
pub const COMPANY_LOGIN_PATH: &str = "/auth/company/login";

/// Admin login endpoint as deployed by the backend (note the doubled `auth`)
pub const ADMIN_LOGIN_PATH: &str = "/auth/auth/admin/login";

/// Registration endpoint shared by riders and companies
pub const REGISTER_PATH: &str = "/auth/register";

/// Where the client is running.
///
/// A non-interactive context (server-side rendering, batch jobs) has no
/// persistent local storage: credential reads come back empty and writes are
/// dropped, and no bearer header is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    #[default]
    Interactive,
    NonInteractive,
}

impl ExecutionContext {
    pub fn is_interactive(&self) -> bool {
        matches!(self, ExecutionContext::Interactive)
    }
}

/// Configuration options for the session client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the backend API
    pub base_url: String,

    /// Interactive or non-interactive execution
    pub context: ExecutionContext,

    /// Path prefixes the request augmentor leaves untouched
    pub exempt_path_prefixes: Vec<String>,

    /// Rider login path
    pub user_login_path: String,

    /// Company login path
    pub company_login_path: String,

    /// Admin login path
    pub admin_login_path: String,

    /// Registration path
    pub register_path: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// File backing the credential store; `None` keeps credentials in memory
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            context: ExecutionContext::Interactive,
            exempt_path_prefixes: vec![
                USER_LOGIN_PATH.to_string(),
                REGISTER_PATH.to_string(),
                COMPANY_LOGIN_PATH.to_string(),
                ADMIN_LOGIN_PATH.to_string(),
            ],
            user_login_path: USER_LOGIN_PATH.to_string(),
            company_login_path: COMPANY_LOGIN_PATH.to_string(),
            admin_login_path: ADMIN_LOGIN_PATH.to_string(),
            register_path: REGISTER_PATH.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            storage_path: None,
        }
    }
}

impl ClientOptions {
    /// Options pointing at the given backend, everything else default
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Read options from the environment.
    ///
    /// `BUSLINE_API_URL` is required; `BUSLINE_STORAGE_PATH` and
    /// `BUSLINE_ADMIN_LOGIN_PATH` are optional overrides.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BUSLINE_API_URL").map_err(|_| {
            Error::config("BUSLINE_API_URL environment variable not found")
        })?;
        let mut options = Self::new(&base_url);

        if let Ok(path) = std::env::var("BUSLINE_STORAGE_PATH") {
            options = options.with_storage_path(Some(PathBuf::from(path)));
        }
        if let Ok(path) = std::env::var("BUSLINE_ADMIN_LOGIN_PATH") {
            options = options.with_admin_login_path(&path);
        }

        options.validate()?;
        Ok(options)
    }

    /// Check that the base URL parses and every endpoint path is absolute
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)?;
        for path in [
            &self.user_login_path,
            &self.company_login_path,
            &self.admin_login_path,
            &self.register_path,
        ] {
            if !path.starts_with('/') {
                return Err(Error::config(format!("endpoint path must start with '/': {}", path)));
            }
        }
        Ok(())
    }

    /// Set the backend base URL; a trailing slash is dropped
    pub fn with_base_url(mut self, value: &str) -> Self {
        self.base_url = value.trim_end_matches('/').to_string();
        self
    }

    /// Set the execution context
    pub fn with_context(mut self, value: ExecutionContext) -> Self {
        self.context = value;
        self
    }

    /// Replace the exempt path prefixes
    pub fn with_exempt_path_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_path_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the admin login path, keeping the exemption list in step
    pub fn with_admin_login_path(mut self, value: &str) -> Self {
        let old = std::mem::replace(&mut self.admin_login_path, value.to_string());
        self.exempt_path_prefixes.retain(|p| p != &old);
        self.exempt_path_prefixes.push(value.to_string());
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the file backing the credential store
    pub fn with_storage_path(mut self, value: Option<PathBuf>) -> Self {
        self.storage_path = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_exemptions_cover_auth_endpoints() {
        let options = ClientOptions::default();
        for path in [
            "/auth/login",
            "/auth/register",
            "/auth/company/login",
            "/auth/auth/admin/login",
        ] {
            assert!(options.exempt_path_prefixes.iter().any(|p| p == path), "{path}");
        }
    }

    #[test]
    fn test_admin_path_override_updates_exemptions() {
        let options = ClientOptions::default().with_admin_login_path("/auth/admin/login");
        assert_eq!(options.admin_login_path, "/auth/admin/login");
        assert!(options.exempt_path_prefixes.contains(&"/auth/admin/login".to_string()));
        assert!(!options.exempt_path_prefixes.contains(&ADMIN_LOGIN_PATH.to_string()));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(ClientOptions::new("not a url").validate().is_err());

        let mut options = ClientOptions::new("http://localhost:3000");
        options.register_path = "auth/register".to_string();
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let options = ClientOptions::new("http://localhost:3000/api/");
        assert_eq!(options.base_url, "http://localhost:3000/api");
    }
}
