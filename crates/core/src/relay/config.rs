//! Configuration for the relay module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration for the ffmpeg relay and ffprobe duration probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Output sink the clip is pushed to (e.g. an RTMP ingest URL with stream key).
    pub output_url: String,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// HTTP headers sent when reading the source stream (e.g. Referer).
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,

    /// Timeout for a single duration probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Grace period between the termination request and a forced kill.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional ffmpeg arguments inserted before the output sink.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_stop_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "error".to_string()
}

impl RelayConfig {
    pub fn new(output_url: impl Into<String>) -> Self {
        Self {
            output_url: output_url.into(),
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            request_headers: BTreeMap::new(),
            probe_timeout_secs: default_probe_timeout(),
            stop_timeout_secs: default_stop_timeout(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.insert(name.into(), value.into());
        self
    }

    /// Headers in the form ffmpeg's `-headers` option expects, or `None` when empty.
    pub fn headers_arg(&self) -> Option<String> {
        if self.request_headers.is_empty() {
            return None;
        }
        Some(
            self.request_headers
                .iter()
                .map(|(name, value)| format!("{}: {}\r\n", name, value))
                .collect(),
        )
    }
}
