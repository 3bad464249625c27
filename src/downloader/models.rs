// Data models: the partial yt-dlp manifest and what we hand to the frontend

use serde::{Deserialize, Deserializer, Serialize};

/// Resolution label used when yt-dlp gives neither `resolution` nor `format_note`
pub const FALLBACK_RESOLUTION: &str = "Audio";

/// Title used when the manifest has none
pub const FALLBACK_TITLE: &str = "video";

/// Accept a field only if it has the expected JSON type; anything else is `None`.
///
/// yt-dlp output is semi-trusted, so one odd field must not sink the whole manifest.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Top-level `yt-dlp -J` document. Only the fields we project are modeled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoManifest {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub formats: Option<Vec<serde_json::Value>>,
}

/// One entry of the manifest `formats` array. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestFormat {
    #[serde(default, deserialize_with = "lenient")]
    pub format_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub resolution: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub format_note: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fps: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub filesize_approx: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vcodec: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub acodec: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tbr: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub abr: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub vbr: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub language: Option<String>,
}

/// Format details sent to the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Format ID passed back to `-f` on download (e.g. "137", "140")
    pub id: String,
    pub ext: Option<String>,
    /// Resolution ("1920x1080"), else the format note, else "Audio"
    pub resolution: String,
    pub fps: Option<f64>,
    /// Approximate size in bytes; often unknown
    pub filesize_approx: Option<u64>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    pub tbr: Option<f64>,
    pub abr: Option<f64>,
    pub vbr: Option<f64>,
    pub note: String,
    pub is_video_only: bool,
    pub is_audio_only: bool,
    pub language: Option<String>,
}

impl FormatDescriptor {
    /// Project a manifest entry. Returns `None` when the entry has no usable
    /// format ID, since it could never be selected for download.
    pub fn from_manifest(format: ManifestFormat) -> Option<Self> {
        let id = format.format_id.filter(|id| !id.trim().is_empty())?;

        let has_stream = |codec: &Option<String>| codec.as_deref().map_or(false, |c| c != "none");
        let is_none = |codec: &Option<String>| codec.as_deref() == Some("none");

        let is_video_only = has_stream(&format.vcodec) && is_none(&format.acodec);
        let is_audio_only = has_stream(&format.acodec) && is_none(&format.vcodec);

        let resolution = format
            .resolution
            .clone()
            .or_else(|| format.format_note.clone())
            .unwrap_or_else(|| FALLBACK_RESOLUTION.to_string());

        let filesize_approx = format
            .filesize_approx
            .filter(|size| size.is_finite() && *size >= 0.0)
            .map(|size| size.round() as u64);

        Some(Self {
            id,
            ext: format.ext,
            resolution,
            fps: format.fps,
            filesize_approx,
            vcodec: format.vcodec,
            acodec: format.acodec,
            tbr: format.tbr,
            abr: format.abr,
            vbr: format.vbr,
            note: format.format_note.unwrap_or_default(),
            is_video_only,
            is_audio_only,
            language: format.language,
        })
    }
}

/// Result of listing formats for one URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatListing {
    pub title: String,
    pub formats: Vec<FormatDescriptor>,
}

/// Body of `POST /get_formats`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatsRequest {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

/// Body of `POST /download`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub format_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub filename: Option<String>,
}
