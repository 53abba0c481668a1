//! The install receipt persisted inside each environment.
//!
//! A receipt is written at the end of every install run, successful or not.
//! Only a receipt with [`ReceiptStatus::Complete`] marks the environment as
//! usable.

use crate::error::{ErrorKind, InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// Directory under the environment root holding installer metadata.
pub const METADATA_DIR: &str = ".pinstall";

/// File name of the receipt inside [`METADATA_DIR`].
pub const RECEIPT_FILE: &str = "receipt.json";

/// Whether the run that wrote the receipt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Every artefact was installed.
    Complete,
    /// The run stopped early; the environment must not be used.
    Failed,
}

/// One installed artefact, recorded in install order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledArtefact {
    /// Package or resource name.
    pub name: String,
    /// URL the artefact was fetched from.
    pub url: String,
    /// Verified digest as `algorithm:hex`.
    pub digest: String,
    /// Install location relative to the environment root.
    pub location: Utf8PathBuf,
}

/// Record of an install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    /// The package the environment was built for.
    pub package: String,
    /// Declared package version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Outcome of the run.
    pub status: ReceiptStatus,
    /// Name of the artefact being processed when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    /// Classification of the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Artefacts installed before the run ended.
    #[serde(default)]
    pub installed: Vec<InstalledArtefact>,
}

impl InstallReceipt {
    /// Path of the receipt for the environment at `root`.
    #[must_use]
    pub fn path(root: &Utf8Path) -> Utf8PathBuf {
        root.join(METADATA_DIR).join(RECEIPT_FILE)
    }

    /// Return true when the environment may be used.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ReceiptStatus::Complete
    }

    /// Write the receipt under `root`, replacing any previous one.
    ///
    /// The JSON is written to a sibling file and renamed into place so a
    /// reader never observes a truncated receipt.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InstallWriteFailed`] if the file cannot be
    /// written.
    pub fn write(&self, root: &Utf8Path) -> Result<()> {
        let path = Self::path(root);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            InstallerError::InstallWriteFailed {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| InstallerError::write_failed(parent, &e))?;
        }
        let partial = path.with_extension("json.partial");
        fs::write(&partial, json).map_err(|e| InstallerError::write_failed(&partial, &e))?;
        fs::rename(&partial, &path).map_err(|e| InstallerError::write_failed(&path, &e))
    }

    /// Read the receipt of the environment at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::EnvironmentNotReady`] if the receipt is
    /// missing or unreadable.
    pub fn read(root: &Utf8Path) -> Result<Self> {
        let path = Self::path(root);
        let text = fs::read_to_string(&path).map_err(|e| InstallerError::EnvironmentNotReady {
            root: root.to_owned(),
            reason: format!("no install receipt at {path}: {e}"),
        })?;
        serde_json::from_str(&text).map_err(|e| InstallerError::EnvironmentNotReady {
            root: root.to_owned(),
            reason: format!("corrupt install receipt at {path}: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("utf8 path");
        (temp_dir, root)
    }

    fn failed_receipt() -> InstallReceipt {
        InstallReceipt {
            package: "pkg".to_owned(),
            version: Some("1.0".to_owned()),
            status: ReceiptStatus::Failed,
            failed_at: Some("dep".to_owned()),
            error_kind: Some(ErrorKind::DigestMismatch),
            installed: vec![InstalledArtefact {
                name: "pkg".to_owned(),
                url: "https://example.test/pkg.tar.gz".to_owned(),
                digest: "sha256:00".to_owned(),
                location: Utf8PathBuf::from("libexec/pkg"),
            }],
        }
    }

    #[test]
    fn write_then_read_preserves_fields() {
        let (_temp, root) = temp_root();
        let receipt = failed_receipt();
        receipt.write(&root).expect("write receipt");

        let loaded = InstallReceipt::read(&root).expect("read receipt");
        assert_eq!(loaded, receipt);
        assert!(!loaded.is_complete());
        assert!(!root.join(".pinstall/receipt.json.partial").exists());
    }

    #[test]
    fn serialises_status_and_kind_as_names() {
        let json = serde_json::to_value(failed_receipt()).expect("serialise");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "DigestMismatch");
        assert_eq!(json["installed"][0]["location"], "libexec/pkg");
    }

    #[test]
    fn complete_receipt_omits_failure_fields() {
        let receipt = InstallReceipt {
            status: ReceiptStatus::Complete,
            failed_at: None,
            error_kind: None,
            ..failed_receipt()
        };
        let json = serde_json::to_value(&receipt).expect("serialise");
        assert!(json.get("failed_at").is_none());
        assert!(json.get("error_kind").is_none());
        assert!(receipt.is_complete());
    }

    #[test]
    fn missing_receipt_is_not_ready() {
        let (_temp, root) = temp_root();
        let err = InstallReceipt::read(&root).expect_err("no receipt");
        assert_eq!(err.kind(), ErrorKind::EnvironmentNotReady);
    }

    #[test]
    fn corrupt_receipt_is_not_ready() {
        let (_temp, root) = temp_root();
        fs::create_dir_all(root.join(METADATA_DIR)).expect("mkdir");
        fs::write(InstallReceipt::path(&root), "{ not json").expect("write");

        let err = InstallReceipt::read(&root).expect_err("corrupt");
        assert!(err.to_string().contains("corrupt install receipt"));
    }
}
