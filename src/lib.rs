//! yadsync - Mirror a publicly shared Yandex.Disk folder onto local storage
//!
//! This library walks a public share through the public resources API and
//! downloads every file into a local directory tree, skipping files that are
//! already present with the right size and MD5.
//!
//! # Features
//!
//! - **Idempotent Re-runs**: Verified files are never downloaded twice
//! - **MD5 Verification**: Local copies are checked against the provider's digest
//! - **Automatic Retry**: Transient network failures are retried with a fixed pause
//! - **Dry Run**: Report what would be downloaded without writing any file
//!
//! # Example
//!
//! ```no_run
//! use yadsync::{sync_tree, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig {
//!     public_key: "https://disk.yandex.ru/d/abcdef".to_string(),
//!     output_dir: "mirror".into(),
//!     ..SyncConfig::default()
//! };
//!
//! sync_tree(&config).await?;
//! # Ok(())
//! # }
//! ```

mod download;
mod error;
mod fetch;
mod listing;
mod orchestrator;
mod types;
mod verify;

pub use download::{download_file, DownloadOutcome};
pub use error::SyncError;
pub use fetch::{BufferedResponse, Fetcher};
pub use listing::{format_listing_url, list_children, parse_listing};
pub use orchestrator::sync_tree;
pub use types::{
    Listing, ListingOutcome, RemoteEntry, RemoteFile, RemotePath, SyncConfig, SyncReport,
    DEFAULT_API_ENDPOINT,
};
pub use verify::{compute_file_md5, verify_local_file};
