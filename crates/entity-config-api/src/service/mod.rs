//! Config and record services shared by the HTTP handlers
//!
//! [`ConfigService`] manages the per-tenant schemas. [`RecordService`] runs
//! every record write through the validation engine before it reaches the
//! store.

pub mod configs;
pub mod records;

pub use configs::ConfigService;
pub use records::RecordService;

use crate::error::{ServiceError, ServiceResult};

/// Entity types are path segments and storage keys
pub(crate) fn check_entity_type(entity_type: &str) -> ServiceResult<()> {
    if entity_type.trim().is_empty() {
        return Err(ServiceError::invalid_input("entity_type must not be empty"));
    }
    if entity_type.contains('/') {
        return Err(ServiceError::invalid_input(format!(
            "entity_type '{}' must not contain '/'",
            entity_type
        )));
    }
    Ok(())
}
