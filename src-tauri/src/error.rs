use thiserror::Error;

/// Failure taxonomy shared by the store, the capture pipeline and the
/// platform capabilities. Display strings carry an upper-case code prefix so
/// the IPC layer can forward them unchanged.
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("CAPABILITY_DENIED: {0}")]
    CapabilityDenied(String),

    #[error("IO_FAILED: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("VALIDATION: {0}")]
    Validation(String),

    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    #[error("CORRUPT_STORE: value under '{key}' is not a record list (raw value kept under '{backup_key}'): {reason}")]
    CorruptStore {
        key: String,
        backup_key: String,
        reason: String,
    },

    #[error("SERIALIZE_FAILED: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("DB_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CONFIG: {0}")]
    Config(String),
}

impl ReceiptError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ReceiptError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ReceiptError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ReceiptError>;
