//! Record writes guarded by the tenant's custom-field schema
//!
//! Custom data is validated against the schema of the record's
//! `(tenant_id, entity_type)` and only persisted when it passes. A pair
//! without a configured schema accepts any payload.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use entity_config_core::store::resolve_schema;
use entity_config_core::{
    ConfigStore, EngineError, Record, RecordFilter, RecordStore, StoreError, ValidationEngine,
    ValidationReport,
};

use super::check_entity_type;
use crate::error::ServiceResult;
use crate::telemetry::ValidationMetricsRegistry;

#[derive(Clone)]
pub struct RecordService {
    configs: Arc<dyn ConfigStore>,
    records: Arc<dyn RecordStore>,
    engine: ValidationEngine,
    metrics: Option<Arc<ValidationMetricsRegistry>>,
}

impl RecordService {
    pub fn new(configs: Arc<dyn ConfigStore>, records: Arc<dyn RecordStore>, engine: ValidationEngine) -> Self {
        Self {
            configs,
            records,
            engine,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ValidationMetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate and persist a new record
    pub async fn create_record(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        custom_data: Map<String, Value>,
    ) -> ServiceResult<Record> {
        check_entity_type(entity_type)?;
        let validated = self.validate_payload(tenant_id, entity_type, &custom_data).await?;

        let record = self
            .records
            .insert_record(Record::new(tenant_id, entity_type, validated))
            .await?;
        info!(
            record_id = %record.id,
            tenant_id = %tenant_id,
            entity_type = %entity_type,
            "Record created"
        );
        Ok(record)
    }

    /// Replace the custom data of a record when `custom_data` is given.
    ///
    /// Without new data the stored record is returned untouched.
    pub async fn update_record(&self, id: Uuid, custom_data: Option<Map<String, Value>>) -> ServiceResult<Record> {
        let mut record = self
            .records
            .get_record(id)
            .await?
            .ok_or_else(|| StoreError::record_not_found(id))?;

        let Some(custom_data) = custom_data else {
            return Ok(record);
        };

        let validated = self
            .validate_payload(record.tenant_id, &record.entity_type, &custom_data)
            .await?;
        record.replace_data(validated);

        let record = self.records.update_record(record).await?;
        info!(record_id = %record.id, entity_type = %record.entity_type, "Record updated");
        Ok(record)
    }

    pub async fn get_record(&self, id: Uuid) -> ServiceResult<Option<Record>> {
        Ok(self.records.get_record(id).await?)
    }

    pub async fn list_records(&self, filter: RecordFilter) -> ServiceResult<Vec<Record>> {
        Ok(self.records.list_records(filter).await?)
    }

    /// Report every issue of `payload` without persisting anything
    pub async fn dry_run(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        payload: &Map<String, Value>,
    ) -> ServiceResult<ValidationReport> {
        let report = match resolve_schema(self.configs.as_ref(), tenant_id, entity_type).await? {
            Some(schema) => self.engine.dry_run(payload, &schema)?,
            None => ValidationReport {
                valid: true,
                issues: Vec::new(),
                fields_checked: 0,
                rules_applied: 0,
            },
        };
        Ok(report)
    }

    async fn validate_payload(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        payload: &Map<String, Value>,
    ) -> ServiceResult<Map<String, Value>> {
        let schema = resolve_schema(self.configs.as_ref(), tenant_id, entity_type).await?;

        let metrics = self.metrics.as_deref().map(ValidationMetricsRegistry::validation);
        let timer = metrics.map(|m| m.start_timer(entity_type));
        let result = self.engine.validate_optional(payload, schema.as_ref());
        drop(timer);

        match &result {
            Ok(_) => {
                if let Some(metrics) = metrics {
                    metrics.record_validation(entity_type, true);
                }
            }
            Err(EngineError::Validation(report)) => {
                info!(
                    tenant_id = %tenant_id,
                    entity_type = %entity_type,
                    issues = report.len(),
                    "Custom data rejected"
                );
                if let Some(metrics) = metrics {
                    metrics.record_validation(entity_type, false);
                    metrics.record_issues(report.iter());
                }
            }
            Err(EngineError::Schema(_)) => {}
        }

        Ok(result?)
    }
}
