//! HTTP handlers for entity configs and records
//!
//! - `routes`: route table, shared state and error mapping
//! - `middleware`: request logging
//!
//! Every JSON endpoint answers with an [`ApiResponse`] envelope. Validation
//! failures carry the full issue list in `error.details.errors`.

pub mod middleware;
pub mod routes;

pub use middleware::{current_request_id, request_logging_middleware};
pub use routes::{create_router, health_check, ApiError, AppState};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use entity_config_core::ConfigSchema;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error information (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Request metadata for tracing
    pub metadata: ResponseMetadata,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ResponseMetadata::new(request_id),
        }
    }

    /// Create an error response
    pub fn error(error: ErrorInfo, request_id: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
            metadata: ResponseMetadata::new(request_id),
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.metadata = self.metadata.with_duration(duration_ms);
        self
    }
}

/// Error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Response metadata for tracing and debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: String,
    /// RFC 3339 timestamp of response generation
    pub timestamp: String,
    /// Server version
    pub version: String,
    /// Processing duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ResponseMetadata {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Body of `POST /api/v1/entity-configs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntityConfigRequest {
    pub tenant_id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub name: Option<String>,
    pub config: ConfigSchema,
}

/// Body of `PUT /api/v1/entity-configs/:tenant_id/:entity_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntityConfigRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub config: ConfigSchema,
}

/// Body of `POST /api/v1/records`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub tenant_id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub custom_data: Map<String, Value>,
}

/// Body of `PATCH /api/v1/records/:id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub custom_data: Option<Map<String, Value>>,
}

/// Body of the dry-run validation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub custom_data: Map<String, Value>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub components: ComponentHealth,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Component-level health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Storage backend answered a read
    pub storage: bool,
    /// Number of registered validation rules
    pub rules_registered: usize,
    /// `/metrics` is exposed
    pub metrics: bool,
}
