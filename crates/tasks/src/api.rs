//! REST client for the GAIA generation service.
//!
//! Wraps the job-submission endpoints (`/api/v1/{module|module-outline}/generate`)
//! and the synchronous crew endpoint using [`reqwest`].

use gaia_core::types::{TaskId, TaskType};
use serde::{Deserialize, Serialize};

/// HTTP client for the generation service.
#[derive(Clone)]
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body returned by the generate endpoints after a job is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Server-assigned identifier used to subscribe to the job's updates.
    pub task_id: TaskId,
}

/// Errors from the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("HTTP error - status code: {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body does not have the expected shape.
    #[error("Invalid response data: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Stable category name for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "network-error",
            Self::Status { .. } => "http-status-error",
            Self::InvalidResponse(_) => "invalid-response-shape",
        }
    }
}

impl GenerationApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base HTTP URL this client posts to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a generation job.
    ///
    /// Sends `POST /api/v1/{segment}/generate` with the payload as JSON
    /// and returns the task identifier the service assigned.
    pub async fn submit_task<P>(
        &self,
        task_type: TaskType,
        payload: &P,
    ) -> Result<SubmitResponse, ApiError>
    where
        P: Serialize + ?Sized,
    {
        let url = format!(
            "{}/api/v1/{}/generate",
            self.api_url,
            task_type.endpoint_segment()
        );

        let response = self.client.post(url).json(payload).send().await?;
        let body = Self::json_body(response).await?;

        let submitted: SubmitResponse = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        if submitted.task_id.is_empty() {
            return Err(ApiError::InvalidResponse("taskId is empty".into()));
        }
        Ok(submitted)
    }

    /// Generate a full module in one request via `POST /api/v1/crew/generate-module`.
    ///
    /// The crew endpoint answers with the module itself rather than a
    /// task identifier, so no subscription is involved.
    pub async fn generate_module_crew<P>(&self, payload: &P) -> Result<serde_json::Value, ApiError>
    where
        P: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}/api/v1/crew/generate-module", self.api_url))
            .json(payload)
            .send()
            .await?;

        Self::json_body(response).await
    }

    // ---- private helpers ----

    /// Return the response unchanged on a success status, or an
    /// [`ApiError::Status`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Read a successful response body as untyped JSON.
    ///
    /// A body that is not JSON at all is an invalid response, not a
    /// network failure.
    async fn json_body(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
