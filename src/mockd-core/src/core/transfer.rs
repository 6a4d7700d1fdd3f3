use std::path::Path;

use mockd_crypto::MockdCrypto;
use mockd_errors::{ServiceError, TransferError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::service::{EnvironmentsService, Mutation};
use super::{AlertLevel, check_environments_duplicates, check_routes_duplicates, migrate_collection};
use crate::models::{Environment, RawEnvironment, sanitize};

pub const EXPORT_ID: &str = "mockd_export";
pub const APP_NAME: &str = env!("APP_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EXPORT_SUCCESS: &str = "Environments have been successfully exported";
pub const EXPORT_FAILURE: &str = "Error while exporting environments";
pub const IMPORT_SUCCESS: &str = "Environments have been successfully imported";
pub const IMPORT_READ_FAILURE: &str = "Error while importing environments: the file could not be read";
pub const IMPORT_CHECKSUM_FAILURE: &str =
    "Error while importing environments: export file checksum mismatch";

/// On-disk shape of an export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub id: String,
    pub app_name: String,
    pub app_version: String,
    pub checksum: String,
    pub data: Value,
}

// Both signing and verification serialize a parsed `Value`, so the text is
// built from the same map on either side, whatever key order it keeps.
fn canonical(data: &Value) -> Result<String, TransferError> {
    Ok(serde_json::to_string(data)?)
}

impl ExportDocument {
    pub fn seal(environments: &[Environment], crypto: &MockdCrypto) -> Result<Self, TransferError> {
        let data = serde_json::to_value(environments)?;
        let checksum = crypto.checksum(canonical(&data)?.as_bytes());
        Ok(Self {
            id: EXPORT_ID.into(),
            app_name: APP_NAME.into(),
            app_version: APP_VERSION.into(),
            checksum,
            data,
        })
    }

    /// Verify the checksum and decode the environments, still unmigrated.
    pub fn open(self, crypto: &MockdCrypto) -> Result<Vec<RawEnvironment>, TransferError> {
        if self.id != EXPORT_ID {
            return Err(TransferError::InvalidDocument(self.id));
        }
        if !crypto.verify(canonical(&self.data)?.as_bytes(), &self.checksum) {
            return Err(TransferError::ChecksumMismatch);
        }
        if self.app_version != APP_VERSION {
            debug!("importing data exported by {} {}", self.app_name, self.app_version);
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

async fn write_export(
    path: &Path,
    environments: &[Environment],
    crypto: &MockdCrypto,
) -> Result<(), TransferError> {
    let document = ExportDocument::seal(environments, crypto)?;
    let bytes = serde_json::to_vec_pretty(&document)?;
    tokio::fs::write(path, &bytes)
        .await
        .map_err(|source| TransferError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("export fingerprint {}", MockdCrypto::fingerprint(&bytes));
    Ok(())
}

async fn read_export(path: &Path, crypto: &MockdCrypto) -> Result<Vec<RawEnvironment>, TransferError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| TransferError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let document: ExportDocument = serde_json::from_slice(&bytes)?;
    document.open(crypto)
}

impl EnvironmentsService {
    /// Write every environment, sanitized, to `path`. Returns how many were
    /// exported.
    pub async fn export_environments(&self, path: impl AsRef<Path>) -> Result<usize, ServiceError> {
        let path = path.as_ref();
        let snapshot = sanitize(&self.environments.read());
        match write_export(path, &snapshot, &self.crypto).await {
            Ok(()) => {
                info!("exported {} environments to {}", snapshot.len(), path.display());
                self.alerts.show_alert(AlertLevel::Success, EXPORT_SUCCESS);
                Ok(snapshot.len())
            }
            Err(e) => {
                error!("export to {} failed: {e}", path.display());
                self.alerts.show_alert(AlertLevel::Error, EXPORT_FAILURE);
                Err(e.into())
            }
        }
    }

    /// Append the environments stored in an export file, with fresh UUIDs.
    /// Nothing changes when the file is unreadable or was tampered with.
    pub async fn import_environments(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Mutation<Vec<usize>>, ServiceError> {
        let path = path.as_ref();
        let raws = match read_export(path, &self.crypto).await {
            Ok(raws) => raws,
            Err(e) => {
                warn!("import from {} failed: {e}", path.display());
                let message = if e.is_read_failure() {
                    IMPORT_READ_FAILURE
                } else {
                    IMPORT_CHECKSUM_FAILURE
                };
                self.alerts.show_alert(AlertLevel::Error, message);
                return Err(e.into());
            }
        };

        let mut imported = migrate_collection(raws);
        for environment in imported.iter_mut() {
            environment.renew_uuids();
            environment.duplicates.clear();
            check_routes_duplicates(environment);
        }

        let mut environments = self.environments.write();
        let start = environments.len();
        environments.extend(imported);
        check_environments_duplicates(&mut environments);
        let indices: Vec<usize> = (start..environments.len()).collect();
        let receipt = self.emit(None);
        drop(environments);

        info!("imported {} environments from {}", indices.len(), path.display());
        self.alerts.show_alert(AlertLevel::Success, IMPORT_SUCCESS);
        Ok(Mutation {
            output: indices,
            receipt,
        })
    }
}
