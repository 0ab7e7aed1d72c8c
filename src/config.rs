//! Repository configuration.

use serde::{Deserialize, Serialize};

use crate::batch::MAX_BATCH_OPERATIONS;
use crate::error::{RepositoryError, RepositoryResult};

/// Tunables of a [`TableRepository`](crate::TableRepository).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TableRepositoryConfig {
    /// Largest number of operations submitted in one batch.
    /// Default: 100 (the store's own limit).
    pub max_batch_operations: usize,

    /// Create the table on first use when it does not exist yet.
    pub create_table_if_not_exists: bool,

    /// Rows requested per page when a query sets no `take` of its own.
    pub query_page_size: Option<usize>,
}

impl Default for TableRepositoryConfig {
    fn default() -> Self {
        Self {
            max_batch_operations: MAX_BATCH_OPERATIONS,
            create_table_if_not_exists: true,
            query_page_size: None,
        }
    }
}

impl TableRepositoryConfig {
    pub fn with_max_batch_operations(mut self, max_batch_operations: usize) -> Self {
        self.max_batch_operations = max_batch_operations;
        self
    }

    pub fn with_create_table_if_not_exists(mut self, create: bool) -> Self {
        self.create_table_if_not_exists = create;
        self
    }

    pub fn with_query_page_size(mut self, page_size: usize) -> Self {
        self.query_page_size = Some(page_size);
        self
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        if self.max_batch_operations == 0 || self.max_batch_operations > MAX_BATCH_OPERATIONS {
            return Err(RepositoryError::InvalidArgument(format!(
                "max_batch_operations must be between 1 and {}, got {}",
                MAX_BATCH_OPERATIONS, self.max_batch_operations
            )));
        }
        if self.query_page_size == Some(0) {
            return Err(RepositoryError::InvalidArgument(
                "query_page_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> RepositoryResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RepositoryError::InvalidArgument(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_store_limits() {
        let config = TableRepositoryConfig::default();
        assert_eq!(config.max_batch_operations, 100);
        assert!(config.create_table_if_not_exists);
        assert_eq!(config.query_page_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TableRepositoryConfig::from_json_str(r#"{ "query_page_size": 25 }"#).unwrap();
        assert_eq!(config.query_page_size, Some(25));
        assert_eq!(config.max_batch_operations, 100);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = TableRepositoryConfig::from_json_str(r#"{ "batch": 10 }"#).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidArgument(_)));
    }

    #[test]
    fn ceiling_must_fit_the_store() {
        for ceiling in [0, 101] {
            let config = TableRepositoryConfig::default().with_max_batch_operations(ceiling);
            assert!(config.validate().is_err(), "ceiling {} accepted", ceiling);
        }
        assert!(TableRepositoryConfig::default()
            .with_query_page_size(0)
            .validate()
            .is_err());
    }
}
