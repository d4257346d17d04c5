//! Relay Job Controller Client
//!
//! A small, type-safe HTTP client for the job controller service that runs
//! submitted tasks remotely.
//!
//! # Example
//!
//! ```no_run
//! use relay_client::{JobController, JobControllerClient};
//! use relay_core::domain::task::TaskDescriptor;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay_client::ClientError> {
//!     let client = JobControllerClient::new("http://localhost:5000");
//!
//!     let task_id = client
//!         .submit(&TaskDescriptor {
//!             experiment: "default".to_string(),
//!             image: "frolvlad/alpine-bash".to_string(),
//!             cmd: "/bin/sh -c 'echo hi'".to_string(),
//!         })
//!         .await?;
//!
//!     let operation = client.check_status(&task_id).await?;
//!     println!("Task {} is {}", task_id, operation.status);
//!     Ok(())
//! }
//! ```

mod controller;
pub mod error;
mod tasks;

// Re-export commonly used types
pub use controller::JobController;
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the job controller API
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct JobControllerClient {
    /// Base URL of the job controller (e.g., "http://localhost:5000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl JobControllerClient {
    /// Create a new job controller client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the job controller API
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use relay_client::JobControllerClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = JobControllerClient::with_client("http://localhost:5000", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the job controller
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turns non-2xx answers into [`ClientError::ApiError`] carrying the body
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        Err(ClientError::api_error(status.as_u16(), body))
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("expected JSON body: {}", e)))
    }

    async fn handle_text_response(&self, response: reqwest::Response) -> Result<String> {
        Ok(Self::ensure_success(response).await?.text().await?)
    }
}
