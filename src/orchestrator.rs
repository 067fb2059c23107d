//! Main orchestration logic for mirroring a public folder tree.

use crate::download::download_file;
use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::listing::list_children;
use crate::types::{ListingOutcome, RemoteEntry, RemoteFile, RemotePath, SyncConfig, SyncReport};
use crate::verify::verify_local_file;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Pending unit of work. Processed depth-first, in listing order.
enum Task {
    Folder(RemotePath),
    File { remote: RemoteFile, dest: PathBuf },
}

/// Mirrors the shared folder described by `config` into `config.output_dir`.
///
/// This is the main entry point. Starting at the share root, it:
///
/// 1. Creates the local directory for each folder and lists its children
/// 2. Skips files whose local copy matches the remote size and MD5
/// 3. Downloads every other file (unless `dry_run` is set)
/// 4. Descends into sub-folders
///
/// A listing that comes back in an unexpected shape prunes that folder only.
/// Download failures and local I/O errors abort the run.
///
/// # Example
///
/// ```no_run
/// use yadsync::{sync_tree, SyncConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SyncConfig {
///     public_key: "https://disk.yandex.ru/d/abcdef".to_string(),
///     ..SyncConfig::default()
/// };
/// let report = sync_tree(&config).await?;
/// println!("downloaded {} files", report.files_downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn sync_tree(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let fetcher = Fetcher::new(config)?;
    let mut report = SyncReport::default();

    // LIFO stack; children are pushed in reverse so they pop in listing order.
    let mut pending = vec![Task::Folder(RemotePath::root())];

    while let Some(task) = pending.pop() {
        let result = match task {
            Task::Folder(remote_path) => {
                visit_folder(config, &fetcher, remote_path, &mut pending, &mut report).await
            }
            Task::File { remote, dest } => {
                sync_file(config, &fetcher, &remote, dest, &mut report).await
            }
        };

        if let Err(e) = result {
            error!("Mirror aborted: {}", e);
            return Err(e);
        }
    }

    if config.dry_run {
        info!(
            "Dry run finished: {} folders, {} files up to date, {} files would be downloaded",
            report.folders_visited, report.files_skipped, report.files_would_download
        );
    } else {
        info!(
            "Mirror finished: {} folders, {} files up to date, {} files downloaded ({} bytes)",
            report.folders_visited,
            report.files_skipped,
            report.files_downloaded,
            report.bytes_downloaded
        );
    }
    Ok(report)
}

async fn visit_folder(
    config: &SyncConfig,
    fetcher: &Fetcher,
    remote_path: RemotePath,
    pending: &mut Vec<Task>,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    if !remote_path.is_root() {
        info!("Entering folder \"{}\"", remote_path);
    }

    let local_dir = remote_path.local_dir(&config.output_dir);
    tokio::fs::create_dir_all(&local_dir).await?;
    report.folders_visited += 1;

    let listing = match list_children(fetcher, config, &remote_path).await? {
        ListingOutcome::Listed(listing) => listing,
        ListingOutcome::Unexpected(raw) => {
            warn!("Unexpected listing response for {}: {}", remote_path, raw);
            report.unexpected_listings.push(remote_path.to_string());
            return Ok(());
        }
    };

    report.entries_rejected += listing.rejected;
    if listing.is_truncated() {
        warn!(
            "Listing of {} is truncated: {} of {} entries returned (limit {})",
            remote_path,
            listing.entries.len(),
            listing.total.unwrap_or_default(),
            config.limit
        );
        report.truncated_listings += 1;
    }

    for entry in listing.entries.into_iter().rev() {
        let task = match entry {
            RemoteEntry::File(remote) => {
                let dest = local_dir.join(&remote.name);
                Task::File { remote, dest }
            }
            RemoteEntry::Folder { name } => Task::Folder(remote_path.child(&name)),
        };
        pending.push(task);
    }
    Ok(())
}

async fn sync_file(
    config: &SyncConfig,
    fetcher: &Fetcher,
    remote: &RemoteFile,
    dest: PathBuf,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    if verify_local_file(&dest, remote).await? {
        info!("Skipping correctly downloaded file {}", dest.display());
        report.files_skipped += 1;
        return Ok(());
    }

    if config.dry_run {
        info!("Would download {} ({} bytes)", dest.display(), remote.size);
        report.files_would_download += 1;
        return Ok(());
    }

    info!("Downloading {}", dest.display());
    let outcome = download_file(fetcher, remote, &dest, config.show_progress).await?;
    report.files_downloaded += 1;
    report.bytes_downloaded += outcome.bytes_written;
    if !outcome.digest_matches {
        report.digest_mismatches.push(dest.display().to_string());
    }
    Ok(())
}
