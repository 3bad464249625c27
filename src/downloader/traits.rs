// Media tool trait definition

use async_trait::async_trait;
use tokio::process::Child;

use super::errors::DownloadError;

/// Captured result of a metadata run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// The external program that resolves URLs and fetches media bytes.
///
/// Implementations must not apply their own deadline to `dump_manifest`;
/// the caller wraps it in a timeout and drops the future when it elapses,
/// so any child process has to be spawned with kill-on-drop.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Name of the tool (for logging)
    fn name(&self) -> &'static str;

    /// Run in metadata mode and capture the single-video JSON manifest.
    async fn dump_manifest(&self, url: &str) -> Result<ToolOutput, DownloadError>;

    /// Start writing the raw bytes of one format to the child's stdout.
    ///
    /// The returned child must have piped stdout and stderr.
    fn spawn_stream(&self, url: &str, format_id: &str) -> Result<Child, DownloadError>;
}
