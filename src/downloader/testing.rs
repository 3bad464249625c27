// Test double for MediaTool

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};

use super::errors::DownloadError;
use super::traits::{MediaTool, ToolOutput};

pub enum ManifestBehavior {
    /// Exit 0 and print this JSON
    Json(serde_json::Value),
    /// Exit 0 and print these bytes
    Raw(Vec<u8>),
    /// Exit 1 with this stderr
    Fail(String),
    /// Sleep (tokio time) before succeeding with `{}`
    Hang(Duration),
    /// Fail as if the binary could not be started
    SpawnError,
}

/// Records every call; streams by running `sh -c <script>`.
pub struct StubTool {
    manifest: ManifestBehavior,
    stream_script: Option<String>,
    manifest_calls: AtomicUsize,
    stream_requests: Mutex<Vec<(String, String)>>,
}

impl StubTool {
    pub fn new(manifest: ManifestBehavior) -> Self {
        Self {
            manifest,
            stream_script: None,
            manifest_calls: AtomicUsize::new(0),
            stream_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stream_script(mut self, script: &str) -> Self {
        self.stream_script = Some(script.to_string());
        self
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_requests.lock().unwrap().len()
    }

    pub fn stream_requests(&self) -> Vec<(String, String)> {
        self.stream_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTool for StubTool {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn dump_manifest(&self, _url: &str) -> Result<ToolOutput, DownloadError> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        match &self.manifest {
            ManifestBehavior::Json(value) => Ok(ToolOutput {
                success: true,
                stdout: serde_json::to_vec(value).unwrap(),
                stderr: Vec::new(),
            }),
            ManifestBehavior::Raw(bytes) => Ok(ToolOutput {
                success: true,
                stdout: bytes.clone(),
                stderr: Vec::new(),
            }),
            ManifestBehavior::Fail(stderr) => Ok(ToolOutput {
                success: false,
                stdout: Vec::new(),
                stderr: stderr.clone().into_bytes(),
            }),
            ManifestBehavior::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(ToolOutput {
                    success: true,
                    stdout: b"{}".to_vec(),
                    stderr: Vec::new(),
                })
            }
            ManifestBehavior::SpawnError => Err(DownloadError::Internal(
                "Failed to start stub: No such file or directory".to_string(),
            )),
        }
    }

    fn spawn_stream(&self, url: &str, format_id: &str) -> Result<Child, DownloadError> {
        self.stream_requests
            .lock()
            .unwrap()
            .push((url.to_string(), format_id.to_string()));

        let script = self
            .stream_script
            .as_deref()
            .ok_or_else(|| DownloadError::Internal("Failed to start stub".to_string()))?;

        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DownloadError::from)
    }
}
