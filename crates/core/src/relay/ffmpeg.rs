//! FFmpeg-based relay and ffprobe-based duration probe.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::RelayConfig;
use super::error::RelayError;
use super::traits::{DurationProbe, RelayLauncher, RelayProcess};
use super::types::{RelayExit, RelayJob};

/// Relays clips with ffmpeg and probes them with ffprobe.
pub struct FfmpegRelay {
    config: RelayConfig,
}

impl FfmpegRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Builds ffmpeg arguments for relaying a job to the output sink.
    ///
    /// Streams are copied, read at native rate, and cut at the probed duration.
    fn build_relay_args(&self, job: &RelayJob) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ];

        if let Some(headers) = self.config.headers_arg() {
            args.push("-headers".to_string());
            args.push(headers);
        }

        args.extend(
            [
                "-re",
                "-i",
                job.locator.as_str(),
                "-flags",
                "+low_delay",
                "-map",
                "0:0",
                "-codec:v",
                "copy",
                "-map",
                "0:1",
                "-codec:a",
                "copy",
                "-t",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(format!("{:.3}", job.duration_secs));
        args.push("-shortest".to_string());
        args.push("-f".to_string());
        args.push("flv".to_string());

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(self.config.output_url.clone());

        args
    }

    /// Builds ffprobe arguments that print only the container duration.
    fn build_probe_args(&self, locator: &str) -> Vec<String> {
        let mut args = vec!["-v".to_string(), "error".to_string()];

        if let Some(headers) = self.config.headers_arg() {
            args.push("-headers".to_string());
            args.push(headers);
        }

        args.extend(
            [
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                locator,
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        args
    }
}

/// Parse ffprobe's duration output. Only a finite, positive number counts.
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[async_trait]
impl DurationProbe for FfmpegRelay {
    async fn probe_duration(&self, locator: &str) -> Result<Option<f64>, RelayError> {
        let probe_timeout = Duration::from_secs(self.config.probe_timeout_secs);

        let output = Command::new(&self.config.ffprobe_path)
            .args(self.build_probe_args(locator))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(probe_timeout, output).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RelayError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    RelayError::Io(e)
                }
            })?,
            Err(_) => {
                warn!(
                    "ffprobe timed out after {}s for {}",
                    self.config.probe_timeout_secs, locator
                );
                return Ok(None);
            }
        };

        if !output.status.success() {
            debug!(
                "ffprobe failed for {}: {}",
                locator,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        Ok(parse_duration(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl RelayLauncher for FfmpegRelay {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn launch(&self, job: &RelayJob) -> Result<Box<dyn RelayProcess>, RelayError> {
        let child = Command::new(&self.config.ffmpeg_path)
            .args(self.build_relay_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RelayError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    RelayError::spawn_failed(e.to_string())
                }
            })?;

        debug!(
            handle_id = %job.handle_id,
            pid = ?child.id(),
            "ffmpeg relay spawned for {}",
            job.locator
        );

        Ok(Box::new(ChildProcess { child }))
    }
}

/// A relay backed by an OS child process.
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    #[cfg(unix)]
    fn request_exit(&mut self) -> Result<(), RelayError> {
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return Ok(());
        };

        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            // Exited between the id lookup and the signal.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(RelayError::Io(errno.into())),
        }
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) -> Result<(), RelayError> {
        self.child.start_kill().map_err(RelayError::Io)
    }
}

#[async_trait]
impl RelayProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<RelayExit, RelayError> {
        let status = self.child.wait().await?;
        Ok(if status.success() {
            RelayExit::Completed
        } else {
            RelayExit::Crashed {
                code: status.code(),
            }
        })
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), RelayError> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        self.request_exit()?;

        match timeout(grace, self.child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                warn!(
                    pid = ?self.child.id(),
                    "Relay did not exit within {:?}, killing",
                    grace
                );
                self.child.kill().await?;
            }
        }

        Ok(())
    }
}
