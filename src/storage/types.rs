use crate::orb::{FaultKind, RemoteFault};

use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<StoreError> for RemoteFault {
    fn from(err: StoreError) -> Self {
        RemoteFault::message(FaultKind::StorageFailure, err.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// A random record, or `None` when the store is empty.
    async fn read(&self) -> Result<Option<String>, StoreError>;

    async fn write(&self, record: String) -> Result<(), StoreError>;

    async fn len(&self) -> usize;
}

/// Records must be non-empty and must not contain the separator line.
pub fn check_record(record: &str) -> Result<(), StoreError> {
    if record.trim().is_empty() {
        return Err(StoreError::InvalidRecord("record is empty".to_string()));
    }

    if record.lines().any(|line| line.trim_end() == super::fortune::SEPARATOR) {
        return Err(StoreError::InvalidRecord(format!(
            "record contains a '{}' line",
            super::fortune::SEPARATOR
        )));
    }

    Ok(())
}
