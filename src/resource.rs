//! CRUD access to the backend's REST collections (routes, buses, tickets).
//!
//! Requests go through the shared [`ApiClient`], so they carry the session's
//! anti-forgery and bearer headers like every other call.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::fetch::{ApiClient, Fetch};

/// Bus routes collection
pub const ROUTES_PATH: &str = "/routes";

/// Buses collection
pub const BUSES_PATH: &str = "/buses";

/// Tickets collection
pub const TICKETS_PATH: &str = "/tickets";

/// Client for one REST collection
pub struct ResourceClient {
    api: ApiClient,
    path: String,
    query: HashMap<String, String>,
}

impl ResourceClient {
    pub(crate) fn new(api: ApiClient, path: &str) -> Self {
        Self {
            api,
            path: format!("/{}", path.trim_matches('/')),
            query: HashMap::new(),
        }
    }

    /// Add a query parameter to list requests
    pub fn filter(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, id)
    }

    /// List the collection
    pub async fn list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let mut fetch = Fetch::get(&self.api, &self.path);
        if !self.query.is_empty() {
            fetch = fetch.query(self.query.clone());
        }
        fetch.execute().await
    }

    /// Fetch one item
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        Fetch::get(&self.api, &self.item_path(id)).execute().await
    }

    /// Create an item, returning the backend's representation
    pub async fn create<B: Serialize, T: DeserializeOwned>(&self, body: &B) -> Result<T> {
        Fetch::post(&self.api, &self.path).json(body)?.execute().await
    }

    /// Replace an item, returning the backend's representation
    pub async fn update<B: Serialize, T: DeserializeOwned>(&self, id: &str, body: &B) -> Result<T> {
        Fetch::put(&self.api, &self.item_path(id)).json(body)?.execute().await
    }

    /// Delete an item
    pub async fn delete(&self, id: &str) -> Result<()> {
        Fetch::delete(&self.api, &self.item_path(id)).execute_empty().await
    }
}
