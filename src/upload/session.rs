//! Upload session state machine
//!
//! Coordinates the remote multipart upload protocol for one archive:
//! initiate a session, upload every part in ascending order, finalize.
//!
//! The session is an explicit state machine; out-of-order calls (uploading a
//! part before initiating, finalizing before every part is acknowledged) are
//! rejected with an `InvalidState` error rather than left as undefined
//! behavior. Once a part upload exhausts its retries the session is `Failed`
//! and finalize is unreachable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::{Part, UploadError};
use crate::notion::{blocks, NotionClient};

/// Attempts per part before the session is marked failed
const MAX_PART_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between part attempts
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitiated,
    Initiated,
    PartUploading,
    Finalized,
    Failed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitiated => "uninitiated",
            SessionState::Initiated => "initiated",
            SessionState::PartUploading => "part-uploading",
            SessionState::Finalized => "finalized",
            SessionState::Failed => "failed",
        }
    }
}

/// One in-progress or completed multipart upload.
///
/// Owns the archive and part files exclusively for its lifetime; the part
/// list is fixed at construction, before any part is uploaded.
pub struct UploadSession {
    client: NotionClient,
    source_file: PathBuf,
    filename: String,
    parts: Vec<Part>,
    state: SessionState,
    session_id: Option<String>,
    upload_url: Option<String>,
    acknowledged: BTreeSet<u32>,
}

impl UploadSession {
    /// Create a session over an archive and its fixed part list.
    ///
    /// Rejects an empty part list and any list whose numbers are not
    /// contiguous from 1.
    pub fn new(
        client: NotionClient,
        source_file: PathBuf,
        parts: Vec<Part>,
    ) -> Result<Self, UploadError> {
        if parts.is_empty() {
            return Err(UploadError::EmptyArchive);
        }
        for (i, part) in parts.iter().enumerate() {
            let expected = (i + 1) as u32;
            if part.number != expected {
                return Err(UploadError::InvalidParts(format!(
                    "expected part {expected}, found {}",
                    part.number
                )));
            }
        }

        let filename = source_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.tar".to_string());

        Ok(Self {
            client,
            source_file,
            filename,
            parts,
            state: SessionState::Uninitiated,
            session_id: None,
            upload_url: None,
            acknowledged: BTreeSet::new(),
        })
    }

    /// Initiate the multipart upload with the remote API.
    ///
    /// On a non-success response the session stays uninitiated.
    #[tracing::instrument(name = "session.initiate", skip(self), fields(parts = self.parts.len()), err)]
    pub async fn initiate(&mut self, content_type: &str) -> Result<(), UploadError> {
        self.require_state("initiate", &[SessionState::Uninitiated])?;

        let meta = self
            .client
            .create_file_upload(&self.filename, self.parts.len() as u32, content_type)
            .await?;

        info!(id = %meta.id, "Multipart upload initiated");
        self.session_id = Some(meta.id);
        self.upload_url = Some(meta.upload_url);
        self.state = SessionState::Initiated;
        Ok(())
    }

    /// Upload one part, retrying transient failures with exponential backoff.
    ///
    /// Only transport errors and 429/5xx responses are retried; other remote
    /// errors propagate on the first attempt. Exhausting the retries marks
    /// the session failed.
    #[tracing::instrument(name = "session.upload_part", skip(self, part_path), fields(part = part_number), err)]
    pub async fn upload_part(
        &mut self,
        part_number: u32,
        part_path: &Path,
    ) -> Result<(), UploadError> {
        self.require_state(
            "upload part",
            &[SessionState::Initiated, SessionState::PartUploading],
        )?;
        if !self.parts.iter().any(|p| p.number == part_number) {
            return Err(UploadError::InvalidParts(format!(
                "part {part_number} is not in the session's part list"
            )));
        }

        // require_state guarantees initiate has run
        let upload_url = self.upload_url.clone().expect("initiated session has url");

        let mut attempt = 1;
        loop {
            match self.client.send_part(&upload_url, part_number, part_path).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_PART_ATTEMPTS && is_retryable(&e) => {
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    warn!(
                        part = part_number,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Part upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }
        }

        self.acknowledged.insert(part_number);
        self.state = SessionState::PartUploading;
        Ok(())
    }

    /// Upload every part in ascending index order, one at a time
    pub async fn upload_all_parts(&mut self) -> Result<(), UploadError> {
        let total = self.parts.len();
        let parts: Vec<(u32, PathBuf)> = self
            .parts
            .iter()
            .map(|p| (p.number, p.path.clone()))
            .collect();

        for (number, path) in parts {
            self.upload_part(number, &path).await?;
            info!(part = number, total, "Part uploaded successfully");
        }
        Ok(())
    }

    /// Finalize the upload once every part has been acknowledged.
    ///
    /// On failure local temporary files stay on disk; cleanup is gated on
    /// the whole pipeline succeeding.
    #[tracing::instrument(name = "session.finalize", skip(self), err)]
    pub async fn finalize(&mut self) -> Result<(), UploadError> {
        self.require_state("finalize", &[SessionState::PartUploading])?;
        // Every part in the fixed list must have its own acknowledgment;
        // re-acknowledging one part never stands in for another
        if self.acknowledged.len() != self.parts.len() {
            return Err(UploadError::InvalidState {
                operation: "finalize",
                state: "not all parts acknowledged",
            });
        }

        let id = self.session_id.clone().expect("initiated session has id");
        self.client.complete_file_upload(&id).await?;
        self.state = SessionState::Finalized;
        info!(id = %id, "Multipart upload finalized");
        Ok(())
    }

    /// Attach the finished upload to a page as a file block
    #[tracing::instrument(name = "session.attach", skip(self), err)]
    pub async fn attach_to_page(
        &self,
        page_id: &str,
        display_name: &str,
    ) -> Result<(), UploadError> {
        self.require_state("attach", &[SessionState::Finalized])?;

        let id = self.session_id.as_deref().expect("finalized session has id");
        self.client
            .append_children(page_id, vec![blocks::file_child(id, display_name)])
            .await?;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session identifier assigned by the remote API, once initiated
    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Archive file name used as the remote display name
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Local archive path
    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// The fixed, ordered part list
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), UploadError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(UploadError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }
}

/// Whether a part-upload failure is worth another attempt
fn is_retryable(err: &UploadError) -> bool {
    match err {
        UploadError::Remote { status, .. } => *status == 429 || *status >= 500,
        UploadError::Transport(_) => true,
        _ => false,
    }
}
