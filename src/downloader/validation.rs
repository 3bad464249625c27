// Input validation: everything the client sends passes through here before
// it reaches a yt-dlp command line or a response header.

use regex::Regex;
use std::path::Path;

/// Filename used when sanitizing leaves nothing usable
pub const DEFAULT_FILENAME: &str = "download";

/// Longest format selector we pass to `-f`
const MAX_FORMAT_ID_LEN: usize = 256;

lazy_static::lazy_static! {
    // Single videos and short links only. Playlists are intentionally absent.
    static ref YOUTUBE_URL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"^https?://(www\.)?youtube\.com/watch\?v=[\w-]+(&\S*)?$").unwrap(),
        Regex::new(r"^https?://(www\.)?youtu\.be/[\w-]+(\?\S*)?$").unwrap(),
    ];
}

/// Check that a URL is a YouTube watch or youtu.be link.
pub fn validate_youtube_url(url: &str) -> bool {
    YOUTUBE_URL_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Make a client-suggested filename safe for a header value or a path.
///
/// Keeps the last path segment, drops `<>:"/\|?*%'` and control characters,
/// turns spaces into underscores. Never returns an empty string, and
/// `sanitize_filename(sanitize_filename(s)) == sanitize_filename(s)`.
pub fn sanitize_filename(name: &str) -> String {
    let last_segment = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = last_segment
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '%' | '\''))
        .filter(|c| !c.is_control())
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Check a format selector before it goes to `-f`.
///
/// yt-dlp decides whether the ID actually exists; this only keeps the
/// argument vector well-formed (no option lookalikes, no whitespace).
pub fn validate_format_id(format_id: &str) -> bool {
    !format_id.is_empty()
        && format_id.len() <= MAX_FORMAT_ID_LEN
        && !format_id.starts_with('-')
        && !format_id.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Whether the filename already carries an extension
pub fn has_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map_or(false, |ext| !ext.is_empty())
}

/// MIME type for a download, from its extension
pub fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "3gp" => "video/3gpp",
        "flv" => "video/x-flv",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "weba" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}
