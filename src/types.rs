//! Data structures for mirror operations.

use crate::error::SyncError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the public resources API.
pub const DEFAULT_API_ENDPOINT: &str = "https://cloud-api.yandex.net";

/// Configuration for one mirror run.
///
/// # Example
///
/// ```
/// use yadsync::SyncConfig;
///
/// let config = SyncConfig {
///     public_key: "https://disk.yandex.ru/d/abcdef".to_string(),
///     output_dir: "mirror".into(),
///     dry_run: true,
///     ..SyncConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Public key or share URL of the shared resource.
    pub public_key: String,
    /// Local directory the remote tree is mirrored into (default: `output`).
    pub output_dir: PathBuf,
    /// Maximum number of children requested per listing (default: 20).
    ///
    /// Listings are not paginated, so folders with more children than this
    /// are truncated.
    pub limit: u32,
    /// Verify and report, but never write file contents (default: false).
    pub dry_run: bool,
    /// Base URL of the public resources API.
    pub api_endpoint: String,
    /// Total attempts per network call, including the first (default: 3).
    pub max_attempts: usize,
    /// Pause between attempts (default: 1s).
    pub retry_delay: Duration,
    /// Bound on a listing request, and on waiting for download headers (default: 30s).
    pub request_timeout: Duration,
    /// Draw a byte progress bar for each download (default: true).
    pub show_progress: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            output_dir: PathBuf::from("output"),
            limit: 20,
            dry_run: false,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            show_progress: true,
        }
    }
}

impl SyncConfig {
    /// Rejects settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.public_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "public key must not be empty".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(SyncError::InvalidConfig(
                "listing limit must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "at least one attempt per request is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A file as reported by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    /// Direct download URL.
    pub download_url: String,
    /// Size in bytes.
    pub size: u64,
    /// Hex MD5 digest computed by the provider.
    pub md5: String,
}

/// One child of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    File(RemoteFile),
    Folder { name: String },
}

impl RemoteEntry {
    pub fn name(&self) -> &str {
        match self {
            RemoteEntry::File(file) => &file.name,
            RemoteEntry::Folder { name } => name,
        }
    }
}

/// Children of one remote folder, as returned by a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<RemoteEntry>,
    /// Child count reported by the provider, if any.
    pub total: Option<u64>,
    /// Items dropped because of an unsafe name or missing fields.
    pub rejected: usize,
}

impl Listing {
    /// True when the provider reports more children than it returned.
    pub fn is_truncated(&self) -> bool {
        self.total
            .is_some_and(|total| total > (self.entries.len() + self.rejected) as u64)
    }
}

/// Result of asking for one folder's children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// The response had the expected shape.
    Listed(Listing),
    /// The response lacked `_embedded.items`; carries the raw body.
    Unexpected(String),
}

/// Slash-delimited path of a folder relative to the share root.
///
/// The root is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path one level below `self`.
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Local directory mirroring this path under `root`.
    pub fn local_dir(&self, root: &Path) -> PathBuf {
        let mut dir = root.to_path_buf();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// What a mirror run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Folders listed (including the root).
    pub folders_visited: usize,
    pub files_downloaded: usize,
    pub bytes_downloaded: u64,
    /// Files already present with matching size and digest.
    pub files_skipped: usize,
    /// Files a dry run would have downloaded.
    pub files_would_download: usize,
    /// Listing items dropped because of an unsafe name or missing fields.
    pub entries_rejected: usize,
    /// Listings where the provider reported more children than it returned.
    pub truncated_listings: usize,
    /// Folders whose listing came back in an unexpected shape.
    pub unexpected_listings: Vec<String>,
    /// Downloads whose streamed digest did not match the remote digest.
    pub digest_mismatches: Vec<String>,
}
