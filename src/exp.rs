//! Experiment uploader
//!
//! Ties the pieces together for one experiment: derives the experiment and
//! dataset names from their paths, creates a database page carrying the mAP
//! figures and tags, appends the per-class metrics table and system info as
//! blocks, then uploads the experiment directory and attaches the archive to
//! the page.

use chrono::Local;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::metrics::{round_2dp, MetricsError, MetricsProducer, ValReport};
use crate::notion::{blocks, NotionClient};
use crate::upload::{FileUploader, UploadError};

/// Experiment upload errors
#[derive(Error, Debug)]
pub enum ExpError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Metrics table has no rows")]
    MalformedTable,

    #[error("Unexpected API response: missing {0}")]
    BadResponse(&'static str),
}

/// Uploads one experiment: page, metrics blocks, archived artifacts
pub struct ExpUploader {
    client: NotionClient,
    database_id: String,
    exp_name: String,
    tags: BTreeSet<String>,
    report: ValReport,
    uploader: FileUploader,
}

impl ExpUploader {
    /// Prepare an upload for the experiment at `exp_path`.
    ///
    /// Reads the validation report up front so a missing or malformed report
    /// fails before anything touches the network.
    pub fn new(
        config: &Config,
        exp_path: &Path,
        data_path: &Path,
        extra_tags: &[String],
        producer: &dyn MetricsProducer,
    ) -> Result<Self, ExpError> {
        let exp_name = derive_exp_name(exp_path);
        let data_name = data_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut tags: BTreeSet<String> = extra_tags.iter().cloned().collect();
        if !data_name.is_empty() {
            tags.insert(data_name);
        }
        if !config.platform_name.is_empty() {
            tags.insert(config.platform_name.clone());
        }

        info!(experiment = %exp_name, "Upload experiment");
        info!(tags = ?tags, "Upload tags");

        let report = producer.produce(exp_path, data_path)?;

        let client = NotionClient::new(
            &config.api_base_url,
            &config.notion_token,
            config.request_timeout(),
        )?;
        let uploader = FileUploader::new(client.clone(), exp_path, config);

        Ok(Self {
            client,
            database_id: config.database_id.clone(),
            exp_name,
            tags,
            report,
            uploader,
        })
    }

    /// Run the whole flow: page → detail blocks → upload → attach
    pub async fn run(&mut self) -> Result<(), ExpError> {
        let page_id = self.create_page().await?;
        self.add_exp_details(&page_id).await?;
        self.uploader.upload().await?;
        let exp_name = self.exp_name.clone();
        self.uploader
            .attach_to_page(&page_id, Some(&exp_name))
            .await?;
        Ok(())
    }

    /// Create the experiment page in the configured database
    pub async fn create_page(&self) -> Result<String, ExpError> {
        let properties = page_properties(&self.exp_name, &self.report, &self.tags);
        let response = self
            .client
            .create_page(&self.database_id, properties)
            .await?;

        let page_id = response["id"]
            .as_str()
            .ok_or(ExpError::BadResponse("page id"))?
            .to_string();
        if let Some(url) = response["url"].as_str() {
            info!(url, "Experiment page created");
        }
        Ok(page_id)
    }

    /// Append the metrics table and the system-info code block to the page
    pub async fn add_exp_details(&self, page_id: &str) -> Result<(), ExpError> {
        let table = blocks::table_block(&self.report.metrics_table)
            .ok_or(ExpError::MalformedTable)?;
        self.client.append_children(page_id, vec![table]).await?;
        self.client
            .append_children(page_id, vec![blocks::code_block(&self.report.sys_info)])
            .await?;
        info!("Experiment details added");
        Ok(())
    }
}

/// Page properties for an experiment: title, mAP percentages, date, tags
fn page_properties(exp_name: &str, report: &ValReport, tags: &BTreeSet<String>) -> Value {
    json!({
        "Model": {
            "title": [
                { "type": "text", "text": { "content": exp_name } }
            ]
        },
        "mAP50": { "number": round_2dp(report.map50 * 100.0) },
        "mAP75": { "number": round_2dp(report.map75 * 100.0) },
        "mAP": { "number": round_2dp(report.map * 100.0) },
        "Last updated time": { "date": { "start": Local::now().to_rfc3339() } },
        "Category": {
            "multi_select": tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>()
        },
    })
}

/// Experiment name from the path segments after the `detect` run directory,
/// joined with `-`; falls back to the directory's base name.
fn derive_exp_name(exp_path: &Path) -> String {
    let components: Vec<String> = exp_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if let Some(idx) = components.iter().position(|c| c == "detect") {
        let tail = &components[idx + 1..];
        if !tail.is_empty() {
            return tail.join("-");
        }
    }

    exp_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string())
}
