// yt-dlp binary as the media tool
//
// Two invocation shapes:
//   metadata: yt-dlp -J --no-playlist [opts] -- <url>
//   stream:   yt-dlp -f <id> --no-playlist -o - [opts] -- <url>
//
// Both URL and format ID are validated before they get here; `--` keeps
// the URL from ever being read as an option.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

use super::errors::DownloadError;
use super::traits::{MediaTool, ToolOutput};
use super::utils::{find_program, run_output};

/// How to run yt-dlp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Path to the yt-dlp binary
    pub path: String,
    /// SOCKS5/HTTP proxy URL passed as `--proxy`
    pub proxy: Option<String>,
    /// Pass `--force-ipv4` (helps when IPv6 ranges are throttled)
    pub force_ipv4: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            path: find_program("yt-dlp"),
            proxy: None,
            force_ipv4: false,
        }
    }
}

impl ToolConfig {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_force_ipv4(mut self, enabled: bool) -> Self {
        self.force_ipv4 = enabled;
        self
    }
}

/// CLI-based media tool using the yt-dlp binary
pub struct YtDlpTool {
    config: ToolConfig,
}

impl YtDlpTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn push_network_args(&self, args: &mut Vec<String>) {
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
        if self.config.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
    }

    /// Arguments for the single-video JSON dump
    pub fn manifest_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["-J".to_string(), "--no-playlist".to_string()];
        self.push_network_args(&mut args);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Arguments for writing one format to stdout
    pub fn stream_args(&self, url: &str, format_id: &str) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            format_id.to_string(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            "-".to_string(),
        ];
        self.push_network_args(&mut args);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaTool for YtDlpTool {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn dump_manifest(&self, url: &str) -> Result<ToolOutput, DownloadError> {
        let args = self.manifest_args(url);
        debug!("[yt-dlp] {} {}", self.config.path, args.join(" "));

        let output = run_output(&self.config.path, &args).await?;
        Ok(ToolOutput::from(output))
    }

    fn spawn_stream(&self, url: &str, format_id: &str) -> Result<Child, DownloadError> {
        let args = self.stream_args(url, format_id);
        debug!("[yt-dlp] {} {}", self.config.path, args.join(" "));

        Command::new(&self.config.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloadError::Internal(format!("Failed to start {}: {}", self.config.path, e))
            })
    }
}
