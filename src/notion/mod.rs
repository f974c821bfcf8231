//! Notion API client
//!
//! Thin HTTP client over the Notion REST API, covering the calls the upload
//! pipeline and the experiment recorder need: the three-phase multipart
//! file-upload protocol, block children appends, and page creation.
//!
//! Every request carries the bearer token and the `Notion-Version` header.
//! Non-success responses are captured as [`UploadError::Remote`] with status
//! code and response body.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::upload::UploadError;

pub mod blocks;

/// API version pinned for all requests
pub const NOTION_VERSION: &str = "2022-06-28";

/// Metadata returned when a multipart upload is initiated
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadMeta {
    /// Opaque upload session identifier
    pub id: String,
    /// Endpoint for submitting parts (includes the send path)
    pub upload_url: String,
}

/// Notion REST API client
#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
}

impl NotionClient {
    /// Create a client for `base_url` authenticated with `token`.
    ///
    /// The timeout applies per request; a timed-out call surfaces as a
    /// failed remote call.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| UploadError::Credential(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Initiate a multipart file upload
    pub async fn create_file_upload(
        &self,
        filename: &str,
        number_of_parts: u32,
        content_type: &str,
    ) -> Result<FileUploadMeta, UploadError> {
        let url = format!("{}/v1/file_uploads", self.base_url);
        let payload = serde_json::json!({
            "mode": "multi_part",
            "number_of_parts": number_of_parts,
            "filename": filename,
            "content_type": content_type,
        });

        let resp = self.http.post(&url).json(&payload).send().await?;
        let resp = Self::expect_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Upload one part's bytes to the session's upload endpoint.
    ///
    /// The part number is sent as a string-encoded form field alongside the
    /// file bytes, per the multipart upload protocol.
    pub async fn send_part(
        &self,
        upload_url: &str,
        part_number: u32,
        part_path: &Path,
    ) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(part_path).await?;
        let file_name = part_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("part{part_number}"));

        debug!(part = part_number, bytes = bytes.len(), "Sending part");

        let form = reqwest::multipart::Form::new()
            .text("part_number", part_number.to_string())
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let resp = self.http.post(upload_url).multipart(form).send().await?;
        Self::expect_success(resp).await?;
        Ok(())
    }

    /// Finalize a multipart upload
    pub async fn complete_file_upload(&self, upload_id: &str) -> Result<Value, UploadError> {
        let url = format!("{}/v1/file_uploads/{}/complete", self.base_url, upload_id);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let resp = Self::expect_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Append child blocks to a block or page
    pub async fn append_children(
        &self,
        block_id: &str,
        children: Vec<Value>,
    ) -> Result<Value, UploadError> {
        let url = format!("{}/v1/blocks/{}/children", self.base_url, block_id);
        let payload = serde_json::json!({ "children": children });

        let resp = self.http.patch(&url).json(&payload).send().await?;
        let resp = Self::expect_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Create a page in a database
    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
    ) -> Result<Value, UploadError> {
        let url = format!("{}/v1/pages", self.base_url);
        let payload = serde_json::json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });

        let resp = self.http.post(&url).json(&payload).send().await?;
        let resp = Self::expect_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Turn a non-success response into a `Remote` error with status and body
    async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response, UploadError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(UploadError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}
