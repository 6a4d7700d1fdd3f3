use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by a persistent store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("store codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("store task aborted: {0}")]
    Task(String),
}

/// Failures of the export/import protocol.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed export document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("not an export document: {0}")]
    InvalidDocument(String),
    #[error("export checksum does not match its data")]
    ChecksumMismatch,
}

impl TransferError {
    /// Parse and shape errors are reported like unreadable files.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            TransferError::Read { .. } | TransferError::Parse(_) | TransferError::InvalidDocument(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("environment {0} not found")]
    EnvironmentNotFound(Uuid),
    #[error("route {route} not found in environment {environment}")]
    RouteNotFound { environment: Uuid, route: Uuid },
    #[error("environment index {index} out of range (len {len})")]
    EnvironmentIndexOutOfRange { index: usize, len: usize },
    #[error("route index {index} out of range in environment {environment} (len {len})")]
    RouteIndexOutOfRange {
        environment: Uuid,
        index: usize,
        len: usize,
    },
    #[error("server runtime failed to stop environment {environment}: {source}")]
    Runtime {
        environment: Uuid,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Shared by every receipt covered by the failed write.
    #[error("persisting environments failed: {0}")]
    PersistenceFailed(#[source] Arc<StoreError>),
    #[error("reconciliation pipeline stopped")]
    PipelineStopped,
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_failures_count_as_read_failures() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(TransferError::Parse(parse).is_read_failure());
        assert!(TransferError::InvalidDocument("id".into()).is_read_failure());
        assert!(!TransferError::ChecksumMismatch.is_read_failure());
    }

    #[test]
    fn store_errors_convert_into_service_errors() {
        let err: ServiceError = StoreError::Task("join".into()).into();
        assert!(matches!(err, ServiceError::Store(StoreError::Task(_))));
        assert_eq!(err.to_string(), "store task aborted: join");
    }

    #[test]
    fn persistence_failures_keep_the_store_error() {
        let err = ServiceError::PersistenceFailed(Arc::new(StoreError::Task("join".into())));
        assert_eq!(err.to_string(), "persisting environments failed: store task aborted: join");
        assert!(matches!(
            err,
            ServiceError::PersistenceFailed(ref source) if matches!(**source, StoreError::Task(_))
        ));
    }
}
