//! Validation metrics collaborator
//!
//! The upload tool does not evaluate models itself; the training framework
//! writes a validation report into the experiment directory, and this module
//! turns it into the fixed-shape [`ValReport`] record the page recorder
//! consumes: overall mAP figures, a markdown-style per-class metrics table,
//! and a formatted system-info string.

use chrono::Local;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default report file name, written by the evaluation run
pub const DEFAULT_REPORT_NAME: &str = "val_report.yaml";

/// Metrics errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to read report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse report: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid report: {0}")]
    Invalid(String),
}

/// Fixed-shape validation result record
#[derive(Debug, Clone)]
pub struct ValReport {
    /// mAP at IoU 0.50, in [0, 1]
    pub map50: f64,
    /// mAP at IoU 0.75, in [0, 1]
    pub map75: f64,
    /// mAP averaged over IoU 0.50:0.95, in [0, 1]
    pub map: f64,
    /// Markdown table of per-class metrics
    pub metrics_table: String,
    /// Formatted system/run information
    pub sys_info: String,
}

/// Produces a [`ValReport`] for an experiment
pub trait MetricsProducer {
    fn produce(&self, exp_path: &Path, data_path: &Path) -> Result<ValReport, MetricsError>;
}

/// Reads the framework-written YAML report from the experiment directory
#[derive(Debug, Clone)]
pub struct ReportFileProducer {
    pub report_name: String,
}

impl Default for ReportFileProducer {
    fn default() -> Self {
        Self {
            report_name: DEFAULT_REPORT_NAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default)]
    model: String,
    total_images: u64,
    summary: RawSummary,
    #[serde(default)]
    classes: Vec<RawClass>,
    #[serde(default = "unknown")]
    device: String,
    #[serde(default = "unknown")]
    framework: String,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    precision: f64,
    recall: f64,
    map50: f64,
    map75: f64,
    map: f64,
}

#[derive(Debug, Deserialize)]
struct RawClass {
    name: String,
    instances: u64,
    precision: f64,
    recall: f64,
    ap50: f64,
    ap75: f64,
    ap: f64,
}

fn unknown() -> String {
    "N/A".to_string()
}

impl MetricsProducer for ReportFileProducer {
    fn produce(&self, exp_path: &Path, data_path: &Path) -> Result<ValReport, MetricsError> {
        let report_path = exp_path.join(&self.report_name);
        let content = std::fs::read_to_string(&report_path)?;
        let raw: RawReport = serde_yaml::from_str(&content)?;

        for (label, value) in [
            ("map50", raw.summary.map50),
            ("map75", raw.summary.map75),
            ("map", raw.summary.map),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MetricsError::Invalid(format!(
                    "{label} out of range [0, 1]: {value}"
                )));
            }
        }

        Ok(ValReport {
            map50: raw.summary.map50,
            map75: raw.summary.map75,
            map: raw.summary.map,
            metrics_table: format_table(&raw),
            sys_info: format_sys_info(&raw, data_path),
        })
    }
}

fn format_table(raw: &RawReport) -> String {
    let headers = [
        "Class", "Images", "Instances", "P", "R", "mAP50", "mAP75", "mAP50-95",
    ];
    let mut lines = vec![
        format!("|{}|", headers.join("|")),
        format!("|{}|", vec!["---"; headers.len()].join("|")),
    ];

    let total_instances: u64 = raw.classes.iter().map(|c| c.instances).sum();
    lines.push(format!(
        "|all|{}|{}|{}|{}|{}|{}|{}|",
        raw.total_images,
        total_instances,
        quantize_2dp(raw.summary.precision * 100.0),
        quantize_2dp(raw.summary.recall * 100.0),
        quantize_2dp(raw.summary.map50 * 100.0),
        quantize_2dp(raw.summary.map75 * 100.0),
        quantize_2dp(raw.summary.map * 100.0),
    ));

    for class in &raw.classes {
        lines.push(format!(
            "|{}|{}|{}|{}|{}|{}|{}|{}|",
            class.name,
            raw.total_images,
            class.instances,
            quantize_2dp(class.precision * 100.0),
            quantize_2dp(class.recall * 100.0),
            quantize_2dp(class.ap50 * 100.0),
            quantize_2dp(class.ap75 * 100.0),
            quantize_2dp(class.ap * 100.0),
        ));
    }

    lines.join("\n")
}

fn format_sys_info(raw: &RawReport, data_path: &Path) -> String {
    let fields = [
        (
            "Timestamp",
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        ("Model", raw.model.clone()),
        ("Data", data_path.display().to_string()),
        ("mAP50", quantize_2dp(raw.summary.map50 * 100.0)),
        ("mAP75", quantize_2dp(raw.summary.map75 * 100.0)),
        ("mAP50-95", quantize_2dp(raw.summary.map * 100.0)),
        ("Device", raw.device.clone()),
        ("Framework", raw.framework.clone()),
    ];

    fields
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Round half-up to two decimal places, formatted as a string
pub fn quantize_2dp(value: f64) -> String {
    format!("{:.2}", round_2dp(value))
}

/// Round half-up to two decimal places
pub fn round_2dp(value: f64) -> f64 {
    ((value * 100.0) + 0.5).floor() / 100.0
}
