//! HTTP client abstraction for making requests to the Busline backend

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};
use crate::interceptor::Interceptor;

/// Pull a human-readable message out of a backend error body
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
    }
    body.to_string()
}

/// reqwest client bound to the API base URL with its interceptor chain
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    base_path: String,
    http_client: Client,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ApiClient {
    /// Create a client for the given base URL
    pub fn new(base_url: &str, http_client: Client) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base_path = Url::parse(&base_url)?.path().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            base_path,
            http_client,
            interceptors: Vec::new(),
        })
    }

    /// Append an interceptor; request hooks run in insertion order, response
    /// hooks in reverse
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/auth/login`
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Request path below the base path, matched on whole segments
    fn relative_path<'u>(&self, url: &'u Url) -> &'u str {
        match url.path().strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => url.path(),
        }
    }

    /// Run a request through the interceptors and the transport.
    ///
    /// Transport failures are returned as-is and skip the response hooks.
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        let path = self.relative_path(request.url()).to_string();

        for interceptor in &self.interceptors {
            interceptor.on_request(&path, &mut request);
        }

        debug!("{} {}", request.method(), path);
        let response = self.http_client.execute(request).await?;

        for interceptor in self.interceptors.iter().rev() {
            interceptor.on_response(&path, &response);
        }
        Ok(response)
    }
}

/// Helper for building and executing HTTP requests
pub struct FetchBuilder<'a> {
    client: &'a ApiClient,
    path: String,
    method: Method,
    headers: HeaderMap,
    query_params: Option<HashMap<String, String>>,
    body: Option<Vec<u8>>,
}

impl<'a> FetchBuilder<'a> {
    /// Create a new FetchBuilder
    pub fn new(client: &'a ApiClient, path: &str, method: Method) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Self {
            client,
            path: path.to_string(),
            method,
            headers,
            query_params: None,
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::from_bytes(name.as_bytes());
        if let (Ok(name), Ok(value)) = (name, HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add query parameters to the request
    pub fn query(mut self, params: HashMap<String, String>) -> Self {
        self.query_params = Some(params);
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body)?;
        self.body = Some(json);
        Ok(self)
    }

    /// Build the request
    fn build(&self) -> Result<Request> {
        let mut url = self.client.url(&self.path)?;

        // Add query parameters if present
        if let Some(params) = &self.query_params {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in params {
                query_pairs.append_pair(key, value);
            }
        }

        let mut req = self
            .client
            .http_client
            .request(self.method.clone(), url)
            .headers(self.headers.clone());

        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }

        Ok(req.build()?)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<T> {
        let response = self.execute_checked().await?;
        let result = response.json::<T>().await?;
        Ok(result)
    }

    /// Execute the request, failing on a non-success status, and discard the body
    pub async fn execute_empty(&self) -> Result<()> {
        self.execute_checked().await?;
        Ok(())
    }

    /// Execute the request and return the raw response
    pub async fn execute_raw(&self) -> Result<Response> {
        let req = self.build()?;
        self.client.send(req).await
    }

    async fn execute_checked(&self) -> Result<Response> {
        let response = self.execute_raw().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(Error::api(status.as_u16(), error_message(&text)));
        }
        Ok(response)
    }
}

/// Helper for creating HTTP requests
pub struct Fetch;

impl Fetch {
    /// Create a GET request
    pub fn get<'a>(client: &'a ApiClient, path: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, path, Method::GET)
    }

    /// Create a POST request
    pub fn post<'a>(client: &'a ApiClient, path: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, path, Method::POST)
    }

    /// Create a PUT request
    pub fn put<'a>(client: &'a ApiClient, path: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, path, Method::PUT)
    }

    /// Create a PATCH request
    pub fn patch<'a>(client: &'a ApiClient, path: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, path, Method::PATCH)
    }

    /// Create a DELETE request
    pub fn delete<'a>(client: &'a ApiClient, path: &str) -> FetchBuilder<'a> {
        FetchBuilder::new(client, path, Method::DELETE)
    }
}
