// Subprocess helpers shared by the yt-dlp tool and the stream session

use std::collections::VecDeque;
use std::process::{Command as StdCommand, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;

use super::errors::DownloadError;

/// Bytes of stderr kept for diagnostics
pub const STDERR_TAIL_BYTES: usize = 4096;

/// Run a command to completion, capturing stdout and stderr.
///
/// The child is spawned with kill-on-drop: if the caller drops this future
/// (e.g. its timeout fires) the process is killed rather than leaked.
pub async fn run_output(program: &str, args: &[String]) -> Result<std::process::Output, DownloadError> {
    let child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::Internal(format!("Failed to start {}: {}", program, e)))?;

    child
        .wait_with_output()
        .await
        .map_err(|e| DownloadError::Internal(format!("Failed to wait for {}: {}", program, e)))
}

/// Read a pipe to EOF, keeping only the last `limit` bytes.
///
/// Used to drain stderr so the child never blocks on a full pipe buffer.
pub async fn drain_tail<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(limit);
    let mut buf = [0u8; 1024];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                tail.extend(&buf[..n]);
                let excess = tail.len().saturating_sub(limit);
                tail.drain(..excess);
            }
            Err(e) => {
                tracing::debug!("stderr drain stopped: {}", e);
                break;
            }
        }
    }

    let bytes: Vec<u8> = tail.into();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Locate a binary: common install paths first, then `which`, then bare name.
pub fn find_program(binary_name: &str) -> String {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", binary_name), // Homebrew on Apple Silicon
        format!("/usr/local/bin/{}", binary_name),    // Homebrew on Intel Mac, pip --user installs
        format!("/usr/bin/{}", binary_name),          // System installation
    ];

    for path in common_paths {
        if std::path::Path::new(&path).exists() {
            return path;
        }
    }

    if let Ok(output) = StdCommand::new("which").arg(binary_name).output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    // Last resort: hope it's in PATH
    binary_name.to_string()
}
