// Error types for the format lister and stream downloader

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Missing or malformed client input (URL, format ID)
    #[error("{0}")]
    InvalidInput(String),

    /// Metadata fetch exceeded its deadline
    #[error("Fetching formats timed out")]
    Timeout,

    /// yt-dlp ran but reported the resource as unsupported or unavailable
    #[error("{0}")]
    UpstreamRejected(String),

    /// yt-dlp exited non-zero for any other reason
    #[error("yt-dlp failed: {0}")]
    UpstreamFailed(String),

    /// Metadata output was not the JSON object we expect
    #[error("Failed to parse yt-dlp output")]
    MalformedUpstreamOutput(String),

    /// Local failure: spawn error, broken pipe, I/O
    #[error("{0}")]
    Internal(String),
}

impl DownloadError {
    /// Classify the stderr of a failed yt-dlp run.
    pub fn from_tool_stderr(stderr: &str) -> Self {
        if stderr.contains("Unsupported URL") {
            return Self::UpstreamRejected("Unsupported URL or video unavailable.".to_string());
        }

        if stderr.to_lowercase().contains("video is unavailable") {
            return Self::UpstreamRejected("This video is unavailable.".to_string());
        }

        Self::UpstreamFailed(stderr.to_string())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
