//! Control plane client abstraction
//!
//! The provider talks to Azure Resource Manager only through [`ControlPlane`].
//! Requests are addressed by the canonical resource ID; long-running
//! mutations hand back an [`Operation`] that the provider polls to a
//! terminal [`OperationStatus`].

use async_trait::async_trait;
use nimbus_core::provider::{ProviderError, ProviderResult};
use serde::Deserialize;

/// Handle of a mutation accepted by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// The request finished synchronously (200/201/204)
    Completed,
    /// The request is running; poll the status URL until it settles (202)
    Pending { status_url: String },
}

/// Status of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
    Canceled,
}

impl OperationStatus {
    /// Interpret an ARM `status` field. Unknown values are still running.
    pub fn from_arm(status: &str, message: Option<&str>) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed(message.unwrap_or("Unknown error").to_string()),
            "canceled" | "cancelled" => OperationStatus::Canceled,
            _ => OperationStatus::InProgress,
        }
    }

    /// Interpret the body returned by an `Azure-AsyncOperation` status URL
    pub fn from_response(body: &serde_json::Value) -> ProviderResult<Self> {
        let response = OperationResponse::deserialize(body).map_err(|e| {
            ProviderError::new(format!("Invalid operation status response: {}", e)).with_cause(e)
        })?;
        let message = response.error.map(|e| match e.code {
            Some(code) => format!("{}: {}", code, e.message),
            None => e.message,
        });
        Ok(Self::from_arm(&response.status, message.as_deref()))
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    status: String,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Client for the resource manager REST API
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Get a resource body. Returns `None` when the resource does not exist.
    async fn get(&self, id: &str, api_version: &str) -> ProviderResult<Option<serde_json::Value>>;

    /// Create or fully replace a resource (PUT)
    async fn create_or_update(
        &self,
        id: &str,
        api_version: &str,
        body: serde_json::Value,
    ) -> ProviderResult<Operation>;

    /// Delete a resource. Deleting a missing resource completes immediately.
    async fn delete(&self, id: &str, api_version: &str) -> ProviderResult<Operation>;

    /// Current status of a pending operation
    async fn operation_status(&self, status_url: &str) -> ProviderResult<OperationStatus>;
}
