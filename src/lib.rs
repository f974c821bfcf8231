//! Exp Uploadr Library
//!
//! Packages an ML experiment directory and uploads it to a Notion workspace
//! using Notion's chunked multipart file-upload protocol, then records the
//! experiment's validation metrics on a database page.
//!
//! # Pipeline
//!
//! 1. **Archive**: compress the experiment directory into a tar archive
//! 2. **Chunk**: split the archive into fixed-size parts (default 10 MiB)
//! 3. **Upload**: initiate a multipart upload, send each part in order, finalize
//! 4. **Attach**: link the finished upload to a page as a file block
//! 5. **Cleanup**: delete the archive and parts, only after attach succeeds
//!
//! # Example
//!
//! ```no_run
//! use exp_uploadr::{config::Config, notion::NotionClient, upload::FileUploader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("notion_key.yaml")?;
//!     let client = NotionClient::new(
//!         &config.api_base_url,
//!         &config.notion_token,
//!         config.request_timeout(),
//!     )?;
//!     let mut uploader = FileUploader::new(client, "runs/detect/visdrone/v12s", &config);
//!     uploader.upload().await?;
//!     uploader.attach_to_page("page-id", Some("visdrone-v12s")).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod chunk;
pub mod config;
pub mod exp;
pub mod metrics;
pub mod notion;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use exp::ExpUploader;
pub use upload::FileUploader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
