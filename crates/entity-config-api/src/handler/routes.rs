//! Route definitions
//!
//! - `GET /` - banner
//! - `GET /health` - health check
//! - `GET /metrics` - Prometheus text exposition
//! - `/api/v1/validations` - registered rule metadata
//! - `/api/v1/entity-configs` - per-tenant custom-field schemas
//! - `/api/v1/records` - records whose custom data is validated on write

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use entity_config_core::{
    AggregatedValidationError, EntityConfig, Record, RecordFilter, RuleMetadata, StoreError,
    ValidationEngine, ValidationReport,
};
use entity_config_storage::Stores;

use super::{
    current_request_id, request_logging_middleware, ApiResponse, ComponentHealth, CreateEntityConfigRequest,
    CreateRecordRequest, ErrorInfo, HealthResponse, HealthStatus, UpdateEntityConfigRequest,
    UpdateRecordRequest, ValidateRequest,
};
use crate::error::ServiceError;
use crate::service::{ConfigService, RecordService};
use crate::telemetry::ValidationMetricsRegistry;

/// State shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub configs: ConfigService,
    pub records: RecordService,
    pub engine: ValidationEngine,
    /// `None` disables `/metrics`
    pub metrics: Option<Arc<ValidationMetricsRegistry>>,
    /// Start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    pub fn new(stores: Stores, engine: ValidationEngine, metrics: Option<Arc<ValidationMetricsRegistry>>) -> Self {
        let mut configs = ConfigService::new(stores.configs.clone(), engine.clone());
        let mut records = RecordService::new(stores.configs, stores.records, engine.clone());
        if let Some(metrics) = &metrics {
            configs = configs.with_metrics(Arc::clone(metrics));
            records = records.with_metrics(Arc::clone(metrics));
        }

        Self {
            configs,
            records,
            engine,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// In-memory storage, built-in rules, no metrics
    pub fn in_memory() -> Self {
        Self::new(Stores::memory(), ValidationEngine::with_builtins(), None)
    }
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    ValidationFailed(AggregatedValidationError),
    InternalError(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ValidationFailed(_) => "VALIDATION_FAILED",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(report) => ApiError::ValidationFailed(report),
            ServiceError::Schema(_) | ServiceError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            ServiceError::Store(store_err) => match store_err {
                StoreError::NotFound { .. } => ApiError::NotFound(store_err.to_string()),
                StoreError::Conflict { .. } => ApiError::Conflict(store_err.to_string()),
                StoreError::Serialization(_) | StoreError::Backend(_) => {
                    tracing::error!(error = %store_err, "Storage failure");
                    ApiError::InternalError(store_err.to_string())
                }
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_info = match &self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalError(msg) => ErrorInfo::new(self.error_code(), msg),
            ApiError::ValidationFailed(report) => {
                ErrorInfo::new(self.error_code(), "Custom data validation failed").with_details(
                    serde_json::json!({
                        "message": report.to_string(),
                        "errors": report.issues,
                    }),
                )
            }
        };

        let response = ApiResponse::<()>::error(error_info, current_request_id());

        (status, Json(response)).into_response()
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/validations", get(list_validations))
        .route("/entity-configs", post(create_entity_config))
        .route("/tenants/:tenant_id/entity-configs", get(list_entity_configs))
        .route(
            "/entity-configs/:tenant_id/:entity_type",
            get(get_entity_config).put(update_entity_config),
        )
        .route(
            "/entity-configs/:tenant_id/:entity_type/validate",
            post(validate_custom_data),
        )
        .route("/records", post(create_record).get(list_records))
        .route("/records/:id", get(get_record).patch(update_record));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn respond<T: Serialize>(data: T, start_time: Instant) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data, current_request_id()).with_duration(start_time.elapsed().as_millis() as u64))
}

#[derive(Debug, Serialize)]
pub struct Banner {
    pub message: String,
}

/// GET /
pub async fn root() -> Json<Banner> {
    Json(Banner {
        message: "Entity config API with dynamic custom-field validation".to_string(),
    })
}

/// GET /health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = state.configs.list(Uuid::nil()).await.is_ok();
    let rules_registered = state.engine.registry().len();

    let status = if storage && rules_registered > 0 {
        HealthStatus::Healthy
    } else if storage {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };

    Json(HealthResponse {
        status,
        components: ComponentHealth {
            storage,
            rules_registered,
            metrics: state.metrics.is_some(),
        },
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let registry = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Metrics are disabled".to_string()))?;
    let body = registry
        .encode_text()
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// GET /api/v1/validations - Metadata of every registered rule
pub async fn list_validations(
    State(state): State<AppState>,
) -> Json<ApiResponse<BTreeMap<String, RuleMetadata>>> {
    respond(state.engine.registry().list_metadata(), Instant::now())
}

/// POST /api/v1/entity-configs
pub async fn create_entity_config(
    State(state): State<AppState>,
    payload: Result<Json<CreateEntityConfigRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<EntityConfig>>), ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload?;

    let created = state
        .configs
        .create(request.tenant_id, &request.entity_type, request.name, request.config)
        .await?;
    Ok((StatusCode::CREATED, respond(created, start_time)))
}

/// GET /api/v1/tenants/:tenant_id/entity-configs
pub async fn list_entity_configs(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<EntityConfig>>>, ApiError> {
    let start_time = Instant::now();
    let configs = state.configs.list(tenant_id).await?;
    Ok(respond(configs, start_time))
}

/// GET /api/v1/entity-configs/:tenant_id/:entity_type
pub async fn get_entity_config(
    State(state): State<AppState>,
    Path((tenant_id, entity_type)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<EntityConfig>>, ApiError> {
    let start_time = Instant::now();
    let config = state
        .configs
        .get(tenant_id, &entity_type)
        .await?
        .ok_or_else(|| ApiError::NotFound(StoreError::config_not_found(tenant_id, &entity_type).to_string()))?;
    Ok(respond(config, start_time))
}

/// PUT /api/v1/entity-configs/:tenant_id/:entity_type - Replace the field list
pub async fn update_entity_config(
    State(state): State<AppState>,
    Path((tenant_id, entity_type)): Path<(Uuid, String)>,
    payload: Result<Json<UpdateEntityConfigRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<EntityConfig>>, ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload?;

    let updated = state
        .configs
        .update(tenant_id, &entity_type, request.name, request.config)
        .await?;
    Ok(respond(updated, start_time))
}

/// POST /api/v1/entity-configs/:tenant_id/:entity_type/validate - Dry run
pub async fn validate_custom_data(
    State(state): State<AppState>,
    Path((tenant_id, entity_type)): Path<(Uuid, String)>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ValidationReport>>, ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload?;

    let report = state
        .records
        .dry_run(tenant_id, &entity_type, &request.custom_data)
        .await?;
    Ok(respond(report, start_time))
}

/// POST /api/v1/records
pub async fn create_record(
    State(state): State<AppState>,
    payload: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Record>>), ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload?;

    let record = state
        .records
        .create_record(request.tenant_id, &request.entity_type, request.custom_data)
        .await?;
    Ok((StatusCode::CREATED, respond(record, start_time)))
}

/// GET /api/v1/records?tenant_id=&entity_type=&skip=&limit=
pub async fn list_records(
    State(state): State<AppState>,
    filter: Result<Query<RecordFilter>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Record>>>, ApiError> {
    let start_time = Instant::now();
    let Query(filter) = filter?;

    let records = state.records.list_records(filter).await?;
    Ok(respond(records, start_time))
}

/// GET /api/v1/records/:id
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Record>>, ApiError> {
    let start_time = Instant::now();
    let record = state
        .records
        .get_record(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(StoreError::record_not_found(id).to_string()))?;
    Ok(respond(record, start_time))
}

/// PATCH /api/v1/records/:id
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateRecordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Record>>, ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload?;

    let record = state.records.update_record(id, request.custom_data).await?;
    Ok(respond(record, start_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_config_core::{IssueKind, SchemaError, ValidationIssue};

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), "BAD_REQUEST");

        let error = ApiError::Conflict("exists".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);

        let error = ApiError::ValidationFailed(AggregatedValidationError::new(vec![]));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_service_error_mapping() {
        let err: ApiError = ServiceError::Schema(SchemaError::EmptyFieldName).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = ServiceError::Store(StoreError::record_not_found(Uuid::nil())).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = ServiceError::Store(StoreError::config_exists(Uuid::nil(), "usuario")).into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let err: ApiError = ServiceError::Store(StoreError::Backend("disk".to_string())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = AggregatedValidationError::new(vec![ValidationIssue::new(
            "custom_data",
            "talla",
            IssueKind::RequiredError,
            "Field required",
        )]);
        let err: ApiError = ServiceError::Validation(report).into();
        assert!(matches!(err, ApiError::ValidationFailed(ref r) if r.len() == 1));
    }
}
