//! Attachment transfer through local staging.
//!
//! Each asset goes through two strictly ordered phases: the source bytes are
//! streamed to a staging file, then the staged file is uploaded to the
//! destination record. Assets are transferred one at a time.

use futures::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::connectors::{DestinationConnector, SourceConnector};
use crate::error::{Error, Result};
use crate::model::AttachmentRef;
use crate::report::{Failure, Operation};
use crate::throttle::Throttle;

/// Longest staged file name, below the usual 255-byte filesystem limit.
pub const MAX_STAGED_NAME_BYTES: usize = 200;

/// A failed transfer and the phase it failed in.
#[derive(Debug)]
pub struct TransferFailure {
    /// `DownloadAttachment` or `UploadAttachment`.
    pub operation: Operation,
    /// Underlying error.
    pub error: Error,
}

impl TransferFailure {
    /// Converts into a report entry.
    pub fn into_failure(self, asset: &AttachmentRef) -> Failure {
        let mut failure = Failure::from_error(self.operation, &self.error);
        failure.message = format!("{} ({}): {}", asset.file_name, asset.id, failure.message);
        failure
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.error)
    }
}

/// Moves attachments from the source to the destination.
#[derive(Debug, Clone)]
pub struct AttachmentTransfer {
    staging_dir: PathBuf,
    throttle: Throttle,
}

impl AttachmentTransfer {
    /// Creates a transfer staging files under `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>, throttle: Throttle) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            throttle,
        }
    }

    /// The staging directory.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Staging path for an asset.
    ///
    /// The name is capped at [`MAX_STAGED_NAME_BYTES`]; the upload carries the
    /// original file name separately.
    pub fn staging_path(&self, asset: &AttachmentRef) -> PathBuf {
        let prefix = format!("{}-", sanitize(&asset.id));
        let budget = MAX_STAGED_NAME_BYTES.saturating_sub(prefix.len());
        let name = sanitize(&asset.file_name);
        self.staging_dir
            .join(format!("{}{}", prefix, truncate_at_char(&name, budget)))
    }

    /// Transfers one asset to `record_id`.
    ///
    /// A download failure skips the upload. An upload failure keeps the
    /// staged file for manual remediation; a successful upload removes it.
    pub async fn transfer(
        &self,
        source: &dyn SourceConnector,
        destination: &dyn DestinationConnector,
        asset: &AttachmentRef,
        record_id: &str,
    ) -> std::result::Result<(), TransferFailure> {
        self.throttle.pause("download attachment").await;
        let path = self
            .stage(source, asset)
            .await
            .map_err(|error| TransferFailure {
                operation: Operation::DownloadAttachment,
                error,
            })?;

        self.throttle.pause("upload attachment").await;
        destination
            .upload_attachment(record_id, &asset.file_name, &path)
            .await
            .map_err(|error| TransferFailure {
                operation: Operation::UploadAttachment,
                error,
            })?;

        debug!("Attached {} to {}", asset.file_name, record_id);
        if let Err(e) = fs::remove_file(&path).await {
            warn!("Could not remove staged file {}: {}", path.display(), e);
        }
        Ok(())
    }

    /// Streams the asset's bytes into its staging file.
    async fn stage(&self, source: &dyn SourceConnector, asset: &AttachmentRef) -> Result<PathBuf> {
        fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| Error::Staging(format!("{}: {}", self.staging_dir.display(), e)))?;

        let path = self.staging_path(asset);
        let mut stream = source.download_attachment(asset).await?;
        let mut file = fs::File::create(&path).await?;

        let written = async {
            let mut total = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                total += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, Error>(total)
        }
        .await;

        match written {
            Ok(total) => {
                debug!("Staged {} ({} bytes)", path.display(), total);
                Ok(path)
            }
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&path).await;
                Err(e)
            }
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes.
fn truncate_at_char(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Keeps file names safe for use inside the staging directory.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}
