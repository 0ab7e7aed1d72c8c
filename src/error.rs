use crate::store::StoreError;

/// Why a write was rejected as conflicting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    /// An insert addressed a row that already exists.
    #[error("row already exists")]
    AlreadyExists,
    /// The presented version tag no longer matches the stored one.
    #[error("version tag mismatch")]
    VersionMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// A required key, identifier or query was missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("row not found in {table}: ({partition_key}, {row_key})")]
    NotFound {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("conflict in {table} on ({partition_key}, {row_key}): {reason}")]
    Conflict {
        table: String,
        partition_key: String,
        row_key: String,
        reason: ConflictReason,
    },

    /// Nothing registered for a requested component (e.g. no proxy for an entity type).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backing store failed for infrastructure reasons.
    #[error("transport error: {0}")]
    Transport(String),

    /// A row property could not be mapped onto an entity field (or back).
    #[error("cannot map property `{property}`: {message}")]
    Mapping { property: String, message: String },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub(crate) fn from_store(table: &str, err: StoreError) -> Self {
        match err {
            StoreError::EntityAlreadyExists {
                partition_key,
                row_key,
            } => RepositoryError::Conflict {
                table: table.to_string(),
                partition_key,
                row_key,
                reason: ConflictReason::AlreadyExists,
            },
            StoreError::PreconditionFailed {
                partition_key,
                row_key,
            } => RepositoryError::Conflict {
                table: table.to_string(),
                partition_key,
                row_key,
                reason: ConflictReason::VersionMismatch,
            },
            StoreError::ResourceNotFound {
                partition_key,
                row_key,
            } => RepositoryError::NotFound {
                table: table.to_string(),
                partition_key,
                row_key,
            },
            StoreError::BatchOperationFailed { source, .. } => Self::from_store(table, *source),
            StoreError::InvalidBatch(message) | StoreError::InvalidQuery(message) => {
                RepositoryError::InvalidArgument(message)
            }
            StoreError::TableNotFound(name) => {
                RepositoryError::Transport(format!("table {} does not exist", name))
            }
            StoreError::Transport(message) => RepositoryError::Transport(message),
        }
    }

    pub(crate) fn mapping(property: impl Into<String>, message: impl Into<String>) -> Self {
        RepositoryError::Mapping {
            property: property.into(),
            message: message.into(),
        }
    }

    /// True for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    /// True for `Conflict`, regardless of reason.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}
