//! File download functionality.

use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::types::RemoteFile;
use futures_util::StreamExt;
use md5::{Digest, Md5};
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, warn};

/// What a completed download wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub bytes_written: u64,
    /// Whether the streamed bytes hash to the digest the listing reported.
    pub digest_matches: bool,
}

fn progress_bar(remote: &RemoteFile, show: bool) -> indicatif::ProgressBar {
    if !show {
        return indicatif::ProgressBar::hidden();
    }

    let pb = indicatif::ProgressBar::new(remote.size);
    if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb.set_message(remote.name.clone());
    pb
}

/// Downloads `remote` into `dest`, replacing whatever is there.
///
/// The body is streamed to disk and hashed on the way. A digest mismatch is
/// reported in the outcome rather than treated as an error: the next run sees
/// the mismatch and downloads the file again.
///
/// # Arguments
///
/// * `fetcher` - Fetcher used for the streamed request
/// * `remote` - File entry from the listing
/// * `dest` - Local path to write
/// * `show_progress` - Draw a byte progress bar
pub async fn download_file(
    fetcher: &Fetcher,
    remote: &RemoteFile,
    dest: &Path,
    show_progress: bool,
) -> Result<DownloadOutcome, SyncError> {
    let response = fetcher.fetch_streamed(&remote.download_url).await?;
    let pb = progress_bar(remote, show_progress);

    let mut file = BufWriter::new(tokio::fs::File::create(dest).await?);
    let mut byte_stream = response.bytes_stream();
    let mut hasher = Md5::new();
    let mut bytes_written = 0u64;

    while let Some(piece) = byte_stream.next().await {
        let chunk = piece?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        bytes_written += chunk.len() as u64;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    pb.finish_and_clear();

    let computed_md5 = format!("{:x}", hasher.finalize());
    let digest_matches = computed_md5.eq_ignore_ascii_case(&remote.md5);
    if digest_matches {
        info!("MD5 verified for {}", dest.display());
    } else {
        warn!(
            "MD5 mismatch after download of {}: expected {}, got {} ({} of {} bytes)",
            dest.display(),
            remote.md5,
            computed_md5,
            bytes_written,
            remote.size
        );
    }

    Ok(DownloadOutcome {
        bytes_written,
        digest_matches,
    })
}
