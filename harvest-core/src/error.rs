use harvest_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// Caller input was missing, malformed, or referenced a row that does not exist.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Whether the caller, rather than the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ForeignKey(_) | StoreError::Validation(_) => {
                AppError::Validation(e.to_string())
            }
            StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            other => AppError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_types::EntityKind;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let fk: AppError = StoreError::ForeignKey("guidebook_id 9".into()).into();
        assert!(matches!(fk, AppError::Validation(_)));
        assert!(fk.is_client_error());

        let nf: AppError = StoreError::NotFound {
            kind: EntityKind::Persona,
            id: 3,
        }
        .into();
        assert_eq!(nf.to_string(), "persona 3 not found");

        let down: AppError = StoreError::Backend("connection refused".into()).into();
        assert!(matches!(down, AppError::Storage(_)));
        assert!(!down.is_client_error());
    }
}
