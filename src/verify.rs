//! File verification utilities (MD5 checksums and size checks).

use crate::error::SyncError;
use crate::types::RemoteFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Block size used when hashing local files.
const HASH_BLOCK_SIZE: usize = 1024 * 1024;

/// Computes the MD5 hash of a local file.
///
/// This function reads the file in chunks to avoid loading large files
/// entirely into memory. It runs in a blocking task to avoid blocking
/// the async runtime.
///
/// # Arguments
///
/// * `path` - Path to the file
///
/// # Returns
///
/// The MD5 hash as a lowercase hexadecimal string, or an error.
pub async fn compute_file_md5(path: &Path) -> Result<String, SyncError> {
    let path: PathBuf = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<String, SyncError> {
        use md5::{Digest, Md5};
        use std::io::Read;

        let file = std::fs::File::open(&path)?;
        let mut reader = std::io::BufReader::with_capacity(HASH_BLOCK_SIZE, file);

        let mut hasher = Md5::new();
        let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(std::io::Error::from)?
}

/// Checks whether the file at `path` already matches `remote`.
///
/// 1. Nothing at `path`, or not a regular file: needs download
/// 2. Size differs from the remote size: needs download (no hashing)
/// 3. Otherwise the local MD5 must equal the remote digest
///
/// # Returns
///
/// `Ok(true)` if the file is valid and doesn't need re-downloading,
/// `Ok(false)` if the file needs to be downloaded,
/// `Err` if the local file exists but cannot be read.
pub async fn verify_local_file(path: &Path, remote: &RemoteFile) -> Result<bool, SyncError> {
    let local_metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if !local_metadata.is_file() {
        debug!("{} exists but is not a regular file", path.display());
        return Ok(false);
    }

    if local_metadata.len() != remote.size {
        info!(
            "Size mismatch for {}: local={} bytes, remote={} bytes",
            path.display(),
            local_metadata.len(),
            remote.size
        );
        return Ok(false);
    }

    let local_md5 = compute_file_md5(path).await?;
    if local_md5.eq_ignore_ascii_case(&remote.md5) {
        Ok(true)
    } else {
        info!(
            "MD5 mismatch for {}: local={}, remote={}",
            path.display(),
            local_md5,
            remote.md5
        );
        Ok(false)
    }
}
