// Downloader module - yt-dlp orchestration behind the HTTP API

pub mod errors;
pub mod formats;
pub mod models;
pub mod stream;
pub mod traits;
pub mod utils;
pub mod validation;
pub mod ytdlp;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::DownloadError;
pub use formats::{FormatLister, DEFAULT_MANIFEST_TIMEOUT};
pub use models::{DownloadRequest, FormatDescriptor, FormatListing, FormatsRequest};
pub use stream::{PreparedDownload, StreamDownloader, StreamSession, DEFAULT_CHUNK_SIZE};
pub use traits::{MediaTool, ToolOutput};
pub use ytdlp::{ToolConfig, YtDlpTool};
