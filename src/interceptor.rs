//! Request augmentation middleware.
//!
//! Every call made through [`ApiClient`](crate::fetch::ApiClient) passes
//! through its interceptors: [`Interceptor::on_request`] before the request
//! leaves, [`Interceptor::on_response`] once a response (of any status)
//! arrives. Transport failures never reach `on_response`.

use log::debug;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response};
use std::sync::Arc;

use crate::auth::SessionState;
use crate::store::CredentialField;

/// Header carrying the anti-forgery token in both directions
pub const CORS_TOKEN_HEADER: &str = "x-cors-token";

/// A middleware stage around outgoing API calls.
///
/// `path` is the request path relative to the API base URL.
pub trait Interceptor: Send + Sync {
    fn on_request(&self, path: &str, request: &mut Request);

    fn on_response(&self, path: &str, response: &Response);
}

/// Path prefixes that bypass augmentation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptPaths {
    prefixes: Vec<String>,
}

impl ExemptPaths {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Attaches the anti-forgery and bearer headers and captures rotated
/// anti-forgery tokens.
///
/// Rotation is last-write-wins: when concurrent responses arrive out of order
/// an older token can overwrite a newer one.
pub struct SessionInterceptor {
    session: Arc<SessionState>,
    exempt: ExemptPaths,
}

impl SessionInterceptor {
    pub fn new(session: Arc<SessionState>, exempt: ExemptPaths) -> Self {
        Self { session, exempt }
    }
}

impl Interceptor for SessionInterceptor {
    fn on_request(&self, path: &str, request: &mut Request) {
        if self.exempt.is_exempt(path) {
            debug!("{} is exempt, sending unmodified", path);
            return;
        }

        let store = self.session.store();
        let headers = request.headers_mut();

        let cors_token = store.anti_forgery_token();
        match HeaderValue::from_str(&cors_token) {
            Ok(value) => {
                headers.insert(CORS_TOKEN_HEADER, value);
            }
            Err(_) => {
                debug!("Stored anti-forgery token is not a valid header value, sending empty");
                headers.insert(CORS_TOKEN_HEADER, HeaderValue::from_static(""));
            }
        }

        if !self.session.context().is_interactive() {
            return;
        }
        if let Some(token) = self.session.token() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
                debug!("Attached bearer token to {}", path);
            }
        }
    }

    fn on_response(&self, path: &str, response: &Response) {
        if self.exempt.is_exempt(path) || !self.session.context().is_interactive() {
            return;
        }
        let rotated = response
            .headers()
            .get(CORS_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if let Some(token) = rotated {
            debug!("Anti-forgery token rotated by response to {}", path);
            self.session.store().save(CredentialField::CorsToken, token);
        }
    }
}
