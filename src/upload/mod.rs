//! Upload module
//!
//! Orchestrates the multipart upload pipeline: archive the experiment
//! directory, chunk the archive, run the remote upload protocol, attach the
//! result to a page, and clean up local temporary state.
//!
//! Temporary files are owned by the pipeline for its whole lifetime and are
//! deleted only on the full success path: any failure before attachment
//! succeeds leaves the archive and part files in place for inspection or a
//! manual retry.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::archive;
use crate::chunk;
use crate::config::Config;
use crate::notion::NotionClient;

pub mod session;

pub use session::{SessionState, UploadSession};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote API error ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Cannot {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Part list must be contiguous from 1: {0}")]
    InvalidParts(String),

    #[error("Archive produced no parts, nothing to upload")]
    EmptyArchive,

    #[error("Invalid credential: {0}")]
    Credential(String),

    #[error("Cleanup failed for {failed} of {total} temporary files")]
    Cleanup { failed: usize, total: usize },
}

/// One chunk of the archive, tagged with its 1-based part number
#[derive(Debug, Clone)]
pub struct Part {
    pub number: u32,
    pub path: PathBuf,
}

/// End-to-end multipart upload pipeline for one directory.
///
/// `upload()` runs archive → chunk → initiate → upload parts → finalize;
/// `attach_to_page()` links the finished upload to a page and then deletes
/// the local temporary files.
pub struct FileUploader {
    client: NotionClient,
    source_dir: PathBuf,
    scratch_dir: PathBuf,
    part_size: u64,
    content_type: String,
    session: Option<UploadSession>,
}

/// Content type reported for the archive; matches what the workspace API
/// accepts for arbitrary binary attachments.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/pdf";

impl FileUploader {
    /// Create an uploader for one source directory
    pub fn new<P: AsRef<Path>>(client: NotionClient, source_dir: P, config: &Config) -> Self {
        Self {
            client,
            source_dir: source_dir.as_ref().to_path_buf(),
            scratch_dir: config.scratch_dir.clone(),
            part_size: config.part_size,
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            session: None,
        }
    }

    /// Run the upload pipeline up to and including finalize.
    ///
    /// On error the pipeline aborts where it is; temporary files already
    /// written stay on disk.
    pub async fn upload(&mut self) -> Result<(), UploadError> {
        let tar_path = archive::compress_dir(&self.source_dir, &self.scratch_dir)?;
        info!(archive = %tar_path.display(), "File compressed");

        let parts = chunk::split(&tar_path, self.part_size)?;
        info!(parts = parts.len(), "File chunked");

        let mut session = UploadSession::new(self.client.clone(), tar_path, parts)?;
        session.initiate(&self.content_type).await?;
        session.upload_all_parts().await?;
        session.finalize().await?;
        info!("File upload completed successfully");

        self.session = Some(session);
        Ok(())
    }

    /// Attach the finished upload to a page, then clean up temporary files.
    ///
    /// The display name is the archive file name, optionally prefixed as
    /// `{prefix}-{filename}`. Cleanup failures are logged and do not change
    /// the outcome: the upload itself already succeeded.
    pub async fn attach_to_page(
        &mut self,
        page_id: &str,
        prefix: Option<&str>,
    ) -> Result<(), UploadError> {
        let session = self.session.as_ref().ok_or(UploadError::InvalidState {
            operation: "attach",
            state: "no finished session",
        })?;

        let display_name = match prefix {
            Some(p) => format!("{}-{}", p, session.filename()),
            None => session.filename().to_string(),
        };

        session.attach_to_page(page_id, &display_name).await?;
        info!(name = %display_name, "File attached to page successfully");

        if let Err(e) = self.clean_up() {
            warn!(error = %e, "Temporary file cleanup failed");
        }
        Ok(())
    }

    /// Delete the archive and every part file, best-effort.
    ///
    /// Attempts every file even if some deletions fail, then reports an
    /// aggregate error.
    fn clean_up(&self) -> Result<(), UploadError> {
        let session = match &self.session {
            Some(s) => s,
            None => return Ok(()),
        };

        let mut targets: Vec<&Path> = session.parts().iter().map(|p| p.path.as_path()).collect();
        targets.push(session.source_file());

        info!(files = targets.len(), "Cleaning up temporary files");

        let total = targets.len();
        let mut failed = 0;
        for path in targets {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::error!(path = %path.display(), error = %e, "Failed to delete temporary file");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(UploadError::Cleanup { failed, total });
        }
        info!("Temporary files cleanup completed");
        Ok(())
    }

    /// Session for the finished upload, if `upload()` has completed
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }
}
