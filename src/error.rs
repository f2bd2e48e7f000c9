//! Error handling for the Busline session client

use std::fmt;
use thiserror::Error;

/// Unified error type for the session client
#[derive(Error, Debug)]
pub enum Error {
    /// Network failure before any response was received
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Login or registration rejected by the backend
    #[error("Authentication error ({status}): {message}")]
    Authentication {
        /// HTTP status of the rejection, 0 when the body itself was unusable
        status: u16,
        /// Message taken from the backend's error payload
        message: String,
    },

    /// Non-success response to a regular API call
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// JWT decoding errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Persistent storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid options or environment
    #[error("Configuration error: {0}")]
    Config(String),

    /// Role and identity do not describe the same principal
    #[error("Invalid session: {0}")]
    InvalidSession(String),
}

impl Error {
    /// Create a new authentication error
    pub fn authentication<T: fmt::Display>(status: u16, msg: T) -> Self {
        Error::Authentication {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new API error
    pub fn api<T: fmt::Display>(status: u16, msg: T) -> Self {
        Error::Api {
            status,
            message: msg.to_string(),
        }
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new invalid-session error
    pub fn invalid_session<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidSession(msg.to_string())
    }

    /// Whether this error came from the backend rejecting credentials
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Whether this error happened before any response arrived
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
