// Format lister: `yt-dlp -J` → title + simplified format list

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::models::{FormatDescriptor, FormatListing, ManifestFormat, VideoManifest, FALLBACK_TITLE};
use super::traits::MediaTool;
use super::validation::validate_youtube_url;

/// Default deadline for the metadata call
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct FormatLister {
    tool: Arc<dyn MediaTool>,
    timeout: Duration,
}

impl FormatLister {
    pub fn new(tool: Arc<dyn MediaTool>, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    /// Fetch the manifest for `url` and project its formats.
    ///
    /// Input is checked before anything is spawned.
    pub async fn list_formats(&self, url: Option<&str>) -> Result<FormatListing, DownloadError> {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(DownloadError::InvalidInput("URL is required".to_string())),
        };

        if !validate_youtube_url(url) {
            return Err(DownloadError::InvalidInput("Invalid YouTube URL format".to_string()));
        }

        info!("[{}] Fetching formats for {}", self.tool.name(), url);

        let output = tokio::time::timeout(self.timeout, self.tool.dump_manifest(url))
            .await
            .map_err(|_| {
                warn!("[{}] Manifest fetch timed out after {:?}", self.tool.name(), self.timeout);
                DownloadError::Timeout
            })??;

        if !output.success {
            let stderr = output.stderr_lossy();
            warn!("[{}] Manifest fetch failed: {}", self.tool.name(), stderr);
            return Err(DownloadError::from_tool_stderr(&stderr));
        }

        let listing = parse_manifest(&output.stdout)?;
        info!(
            "[{}] Found {} formats for \"{}\"",
            self.tool.name(),
            listing.formats.len(),
            listing.title
        );
        Ok(listing)
    }
}

/// Parse a `yt-dlp -J` document into the frontend listing.
///
/// The only hard requirement is a JSON object; every field inside is optional.
pub fn parse_manifest(stdout: &[u8]) -> Result<FormatListing, DownloadError> {
    let value: serde_json::Value = serde_json::from_slice(stdout).map_err(|e| {
        warn!("Failed to parse manifest JSON: {}", e);
        DownloadError::MalformedUpstreamOutput(e.to_string())
    })?;

    if !value.is_object() {
        warn!("Manifest is not a JSON object");
        return Err(DownloadError::MalformedUpstreamOutput(
            "expected a JSON object".to_string(),
        ));
    }

    let manifest: VideoManifest = serde_json::from_value(value)
        .map_err(|e| DownloadError::MalformedUpstreamOutput(e.to_string()))?;

    let formats = manifest
        .formats
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            if !raw.is_object() {
                debug!("Skipping format #{}: not an object", index);
                return None;
            }
            let format = match serde_json::from_value::<ManifestFormat>(raw) {
                Ok(format) => format,
                Err(e) => {
                    debug!("Skipping format #{}: {}", index, e);
                    return None;
                }
            };
            let descriptor = FormatDescriptor::from_manifest(format);
            if descriptor.is_none() {
                debug!("Skipping format #{}: no format_id", index);
            }
            descriptor
        })
        .collect();

    Ok(FormatListing {
        title: manifest.title.unwrap_or_else(|| FALLBACK_TITLE.to_string()),
        formats,
    })
}
