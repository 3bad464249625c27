// Stream downloader: relay `yt-dlp -o -` stdout to the HTTP body
//
// A StreamSession owns the child and both pipes for one download. Whatever
// ends the session (EOF, read error, or the body being dropped because the
// client went away) runs the same cleanup exactly once: kill if abandoned,
// then wait on the child in a background task so nothing is left as a zombie.
//
// Once the first chunk is out the response headers are committed. A failure
// after that point can only end the stream early; the client sees a
// truncated file and we log it.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::process::ExitStatus;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::traits::MediaTool;
use super::utils::{drain_tail, STDERR_TAIL_BYTES};
use super::validation::{
    content_type_for_filename, has_extension, sanitize_filename, validate_format_id,
    validate_youtube_url, DEFAULT_FILENAME,
};

/// Default read size for stdout chunks
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Appended when the suggested filename has no extension
pub const FALLBACK_EXTENSION: &str = "dat";

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// stdout reached EOF
    Finished,
    /// Reading stdout failed mid-stream
    ReadError,
    /// Dropped before EOF (client disconnect); the child was killed
    Abandoned,
}

/// Published once the child has been waited on
#[derive(Debug, Clone)]
pub struct SessionExit {
    pub completion: Completion,
    /// `None` if waiting on the child itself failed
    pub status: Option<ExitStatus>,
    pub bytes_sent: u64,
}

/// One child process plus its pipes, exposed as a byte stream.
pub struct StreamSession {
    label: String,
    stdout: ChildStdout,
    /// The only buffer a session holds; chunks never exceed its length.
    buf: Box<[u8]>,
    child: Option<Child>,
    stderr_drain: Option<JoinHandle<String>>,
    exit_tx: Option<oneshot::Sender<SessionExit>>,
    exit_rx: Option<oneshot::Receiver<SessionExit>>,
    bytes_sent: u64,
}

impl StreamSession {
    /// Wrap a freshly spawned child. Its stdout and stderr must be piped.
    pub fn new(mut child: Child, chunk_size: usize, label: impl Into<String>) -> Result<Self, DownloadError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Internal("Failed to capture stdout".to_string()))?;

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr_drain = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_tail(stderr, STDERR_TAIL_BYTES)));

        let (exit_tx, exit_rx) = oneshot::channel();

        Ok(Self {
            label: label.into(),
            stdout,
            buf: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            child: Some(child),
            stderr_drain,
            exit_tx: Some(exit_tx),
            exit_rx: Some(exit_rx),
            bytes_sent: 0,
        })
    }

    /// Receiver for the exit report. Can be taken once.
    pub fn take_exit_signal(&mut self) -> Option<oneshot::Receiver<SessionExit>> {
        self.exit_rx.take()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn is_finished(&self) -> bool {
        self.child.is_none()
    }

    fn finish(&mut self, completion: Completion) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if completion == Completion::Abandoned {
            // May already have exited; that's fine.
            if let Err(e) = child.start_kill() {
                debug!("[stream] {}: kill failed: {}", self.label, e);
            }
        }

        let label = std::mem::take(&mut self.label);
        let stderr_drain = self.stderr_drain.take();
        let exit_tx = self.exit_tx.take();
        let bytes_sent = self.bytes_sent;

        let reap = async move {
            let status = match child.wait().await {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!("[stream] {}: failed to wait for child: {}", label, e);
                    None
                }
            };

            let stderr_tail = match stderr_drain {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };

            let exited_cleanly = status.map_or(false, |s| s.success());
            match completion {
                Completion::Finished if exited_cleanly => {
                    info!("[stream] {}: finished, {} bytes sent", label, bytes_sent);
                }
                Completion::Abandoned => {
                    info!(
                        "[stream] {}: client went away after {} bytes, process stopped",
                        label, bytes_sent
                    );
                }
                _ => {
                    warn!(
                        "[stream] {}: ended abnormally after {} bytes ({:?}, exit {:?}); client received a truncated file. stderr: {}",
                        label, bytes_sent, completion, status, stderr_tail
                    );
                }
            }

            if let Some(tx) = exit_tx {
                let _ = tx.send(SessionExit {
                    completion,
                    status,
                    bytes_sent,
                });
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(reap);
            }
            Err(_) => {
                // Dropping `reap` drops the child, and kill-on-drop stops it.
                warn!("[stream] no runtime available to reap child");
            }
        }
    }
}

impl Stream for StreamSession {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.child.is_none() {
            return Poll::Ready(None);
        }

        let mut read_buf = ReadBuf::new(&mut this.buf);
        let polled = Pin::new(&mut this.stdout).poll_read(cx, &mut read_buf);
        let filled = read_buf.filled().len();

        match polled {
            Poll::Ready(Ok(())) if filled == 0 => {
                this.finish(Completion::Finished);
                Poll::Ready(None)
            }
            Poll::Ready(Ok(())) => {
                this.bytes_sent += filled as u64;
                Poll::Ready(Some(Ok(Bytes::copy_from_slice(&this.buf[..filled]))))
            }
            Poll::Ready(Err(e)) => {
                warn!("[stream] {}: read error: {}", this.label, e);
                this.finish(Completion::ReadError);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.finish(Completion::Abandoned);
    }
}

/// Everything the HTTP layer needs to answer a download request
pub struct PreparedDownload {
    pub filename: String,
    pub content_type: &'static str,
    pub session: StreamSession,
}

impl PreparedDownload {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

pub struct StreamDownloader {
    tool: Arc<dyn MediaTool>,
    chunk_size: usize,
}

impl StreamDownloader {
    pub fn new(tool: Arc<dyn MediaTool>, chunk_size: usize) -> Self {
        Self { tool, chunk_size }
    }

    /// Validate the request and start the child. Nothing is spawned unless
    /// every input check passes.
    pub fn start(
        &self,
        url: Option<&str>,
        format_id: Option<&str>,
        filename: Option<&str>,
    ) -> Result<PreparedDownload, DownloadError> {
        let url = url.map(str::trim).filter(|u| !u.is_empty());
        let format_id = format_id.map(str::trim).filter(|f| !f.is_empty());
        let (url, format_id) = match (url, format_id) {
            (Some(url), Some(format_id)) => (url, format_id),
            _ => {
                return Err(DownloadError::InvalidInput(
                    "URL and Format ID are required".to_string(),
                ))
            }
        };

        if !validate_youtube_url(url) {
            return Err(DownloadError::InvalidInput("Invalid YouTube URL format".to_string()));
        }
        if !validate_format_id(format_id) {
            return Err(DownloadError::InvalidInput("Invalid format ID".to_string()));
        }

        let filename = download_filename(filename);
        let content_type = content_type_for_filename(&filename);

        info!(
            "[{}] Streaming format {} of {} as {}",
            self.tool.name(),
            format_id,
            url,
            filename
        );

        let child = self.tool.spawn_stream(url, format_id)?;
        let session = StreamSession::new(child, self.chunk_size, format!("{} {}", format_id, url))?;

        Ok(PreparedDownload {
            filename,
            content_type,
            session,
        })
    }
}

/// Sanitized download name, with the placeholder extension when none is given.
pub fn download_filename(suggested: Option<&str>) -> String {
    let mut filename = sanitize_filename(suggested.unwrap_or(DEFAULT_FILENAME));
    if !has_extension(&filename) {
        filename.push('.');
        filename.push_str(FALLBACK_EXTENSION);
    }
    filename
}
