//! Folder listing through the public resources API.

use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::types::{Listing, ListingOutcome, RemoteEntry, RemoteFile, RemotePath, SyncConfig};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Listing response shape. Only the fields the mirror needs are decoded.
#[derive(Deserialize, Debug)]
struct ResourceResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedItems>,
}

#[derive(Deserialize, Debug)]
struct EmbeddedItems {
    items: Option<Vec<ResourceItem>>,
    total: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct ResourceItem {
    name: Option<String>,
    /// Direct download link; present only on files.
    file: Option<String>,
    size: Option<u64>,
    md5: Option<String>,
}

/// Encodes a remote path for the `path` query parameter.
///
/// Backslashes become forward slashes. A literal `+` must be sent as `%2B`,
/// the API decodes a bare `+` as a space. `%`, `&` and `#` are escaped too so
/// they cannot end the parameter early.
fn encode_remote_path(remote_path: &str) -> String {
    let mut encoded = String::with_capacity(remote_path.len());
    for c in remote_path.chars() {
        match c {
            '\\' => encoded.push('/'),
            '%' => encoded.push_str("%25"),
            '+' => encoded.push_str("%2B"),
            '&' => encoded.push_str("%26"),
            '#' => encoded.push_str("%23"),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Builds the listing URL for `remote_path` (relative to the share root).
///
/// # Example
///
/// ```
/// use yadsync::format_listing_url;
///
/// let url = format_listing_url("https://cloud-api.yandex.net", "KEY", "a+b\\c", 20);
/// assert_eq!(
///     url,
///     "https://cloud-api.yandex.net/v1/disk/public/resources/?public_key=KEY&path=/a%2Bb/c&limit=20"
/// );
/// ```
pub fn format_listing_url(
    api_endpoint: &str,
    public_key: &str,
    remote_path: &str,
    limit: u32,
) -> String {
    format!(
        "{}/v1/disk/public/resources/?public_key={}&path=/{}&limit={}",
        api_endpoint.trim_end_matches('/'),
        public_key,
        encode_remote_path(remote_path),
        limit
    )
}

/// Whether `name` can be used as a single local path component.
pub(crate) fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn into_entry(item: ResourceItem) -> Result<RemoteEntry, String> {
    let name = item.name.ok_or_else(|| "item without a name".to_string())?;
    if !is_safe_name(&name) {
        return Err(format!("unsafe name {:?}", name));
    }

    match item.file {
        Some(download_url) => {
            let size = item
                .size
                .ok_or_else(|| format!("file {:?} without a size", name))?;
            let md5 = item
                .md5
                .ok_or_else(|| format!("file {:?} without an md5", name))?;
            Ok(RemoteEntry::File(RemoteFile {
                name,
                download_url,
                size,
                md5,
            }))
        }
        None => Ok(RemoteEntry::Folder { name }),
    }
}

/// Parses a listing response body.
///
/// Anything without `_embedded.items` comes back as
/// [`ListingOutcome::Unexpected`] carrying the raw body. Individual items that
/// cannot be mirrored are dropped with a warning and counted in
/// [`Listing::rejected`].
pub fn parse_listing(body: &[u8]) -> ListingOutcome {
    let unexpected = || ListingOutcome::Unexpected(String::from_utf8_lossy(body).into_owned());

    let response: ResourceResponse = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => {
            debug!("Listing body is not a resource object: {}", e);
            return unexpected();
        }
    };

    let Some(EmbeddedItems {
        items: Some(items),
        total,
    }) = response.embedded
    else {
        return unexpected();
    };

    let mut listing = Listing {
        entries: Vec::with_capacity(items.len()),
        total,
        rejected: 0,
    };
    for item in items {
        match into_entry(item) {
            Ok(entry) => listing.entries.push(entry),
            Err(reason) => {
                warn!("Ignoring listing item: {}", reason);
                listing.rejected += 1;
            }
        }
    }
    ListingOutcome::Listed(listing)
}

/// Lists the children of `remote_path`.
///
/// Only transport failures that outlast the retries are errors; a response
/// of the wrong shape is reported as [`ListingOutcome::Unexpected`].
pub async fn list_children(
    fetcher: &Fetcher,
    config: &SyncConfig,
    remote_path: &RemotePath,
) -> Result<ListingOutcome, SyncError> {
    let url = format_listing_url(
        &config.api_endpoint,
        &config.public_key,
        remote_path.as_str(),
        config.limit,
    );
    debug!("Listing {} via {}", remote_path, url);

    let response = fetcher.fetch_buffered(&url).await?;
    let outcome = parse_listing(&response.body);

    if let ListingOutcome::Listed(listing) = &outcome {
        info!(
            "Listed {}: {} entries (HTTP {})",
            remote_path,
            listing.entries.len(),
            response.status
        );
    }
    Ok(outcome)
}
