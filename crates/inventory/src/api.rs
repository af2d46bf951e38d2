//! Management API clients.
//!
//! [`HttpApi`] talks to the REST API of the cluster manager. [`MockApi`]
//! holds canned responses for tests.
//!
//! # Testing
//!
//! ```
//! use inventory::api::{ManagementApi, MockApi};
//! use serde_json::json;
//!
//! let mock = MockApi::new();
//! mock.set_resource("version", json!({"release": "9.0"}));
//!
//! assert_eq!(mock.get_request("version").unwrap()["release"], "9.0");
//! assert!(mock.get_request("nodes").is_err());
//! ```

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Header carrying the keystone token.
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Read access to the management API.
pub trait ManagementApi: Send + Sync {
    /// Fetch a top-level resource (`nodes`, `version`, `clusters`) as JSON.
    fn get_request(&self, resource: &str) -> Result<Value>;
}

/// Blocking HTTP client for the management API.
///
/// # Example
///
/// ```no_run
/// use inventory::api::{HttpApi, ManagementApi};
///
/// let api = HttpApi::new("http://10.20.0.2:8000/api/v1", None, true);
/// let nodes = api.get_request("nodes").unwrap();
/// println!("{} nodes", nodes.as_array().map_or(0, Vec::len));
/// ```
pub struct HttpApi {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API root, without a trailing slash.
    api_url: String,
    /// Optional auth token.
    token: Option<String>,
}

impl HttpApi {
    /// Create a client for `api_url`.
    ///
    /// With `skip_proxy`, proxy settings from the environment are ignored;
    /// the master usually sits on an admin network a proxy cannot reach.
    #[must_use]
    pub fn new(api_url: impl Into<String>, token: Option<String>, skip_proxy: bool) -> Self {
        let agent = if skip_proxy {
            ureq::Agent::config_builder()
                .proxy(None)
                .timeout_global(Some(Duration::from_secs(30)))
                .build()
                .into()
        } else {
            ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_secs(30)))
                .build()
                .into()
        };

        Self {
            agent,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the API root.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// URL of a top-level resource.
    #[must_use]
    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/{}/", self.api_url, resource.trim_matches('/'))
    }
}

impl ManagementApi for HttpApi {
    fn get_request(&self, resource: &str) -> Result<Value> {
        let url = self.resource_url(resource);
        log::debug!("GET {url}");

        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", "fleetdiag");
        if let Some(token) = &self.token {
            request = request.header(AUTH_HEADER, token);
        }

        let value: Value = request.call()?.body_mut().read_json()?;
        Ok(value)
    }
}

/// Mock API for testing without a management server.
///
/// Resources that were never set answer with HTTP 404; [`MockApi::fail_all`]
/// turns every request into a connection error.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    resources: Arc<Mutex<HashMap<String, Value>>>,
    down: Arc<Mutex<bool>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    /// Create a new empty mock API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response for a resource.
    pub fn set_resource(&self, resource: impl Into<String>, value: Value) {
        lock(&self.resources).insert(resource.into(), value);
    }

    /// Make every request fail.
    pub fn fail_all(&self) {
        *lock(&self.down) = true;
    }

    /// Resources requested so far.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

impl ManagementApi for MockApi {
    fn get_request(&self, resource: &str) -> Result<Value> {
        lock(&self.requests).push(resource.to_string());

        if *lock(&self.down) {
            return Err(Error::http("connection refused", None));
        }
        lock(&self.resources)
            .get(resource)
            .cloned()
            .ok_or_else(|| Error::http("HTTP 404", Some(404)))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;

    #[test]
    fn test_resource_url() {
        let api = HttpApi::new("http://10.20.0.2:8000/api/v1/", None, true);
        assert_eq!(api.api_url(), "http://10.20.0.2:8000/api/v1");
        assert_eq!(
            api.resource_url("nodes"),
            "http://10.20.0.2:8000/api/v1/nodes/"
        );
    }

    #[test]
    fn test_mock_resources() {
        let mock = MockApi::new();
        mock.set_resource("nodes", json!([{"id": 1}]));

        let nodes = mock.get_request("nodes").unwrap();
        assert_eq!(nodes.as_array().map(Vec::len), Some(1));

        let missing = mock.get_request("clusters").unwrap_err();
        assert_eq!(missing.category(), ErrorCategory::NotFound);
        assert_eq!(mock.requests(), vec!["nodes", "clusters"]);
    }

    #[test]
    fn test_mock_fail_all() {
        let mock = MockApi::new();
        mock.set_resource("nodes", json!([]));
        mock.fail_all();
        let err = mock.get_request("nodes").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_http_api_unreachable() {
        // Port 9 on loopback is the discard service and is normally closed
        let api = HttpApi::new("http://127.0.0.1:9/api/v1", Some("t".into()), true);
        let err = api.get_request("nodes").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Network);
    }
}
