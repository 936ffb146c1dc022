//! Background packet capture that brackets a collection run.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use wifidiag_core::api::{CaptureConfig, CaptureSummary};

const READBACK_TIMEOUT: Duration = Duration::from_secs(20);
const STOP_TIMEOUT: Duration = Duration::from_secs(3);

/// A running capture; `finish` always yields a summary.
pub struct Capture {
    child: Child,
    file: PathBuf,
    started: Instant,
    program: String,
    filter: String,
    min_duration: Duration,
}

/// Arguments for the recording process.
pub fn record_args(cfg: &CaptureConfig, interface: &str, file: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        interface.to_string(),
        "-W".to_string(),
        "1".to_string(),
        "-G".to_string(),
        cfg.rotate_secs.to_string(),
        "-w".to_string(),
        file.display().to_string(),
    ]
}

/// Arguments for reading a finished capture back through the filter.
pub fn readback_args(filter: &str, file: &Path) -> Vec<String> {
    vec![
        filter.to_string(),
        "-n".to_string(),
        "-r".to_string(),
        file.display().to_string(),
    ]
}

impl Capture {
    pub fn start(cfg: &CaptureConfig, interface: &str, file: PathBuf) -> Result<Self, CaptureSummary> {
        let child = Command::new(&cfg.program)
            .args(record_args(cfg, interface, &file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::warn!(program = %cfg.program, error = %e, "capture failed to start");
                CaptureSummary::failed(&cfg.filter, format!("{} failed to start: {e}", cfg.program))
            })?;

        tracing::info!(program = %cfg.program, interface, file = %file.display(), "capture started");
        Ok(Self {
            child,
            file,
            started: Instant::now(),
            program: cfg.program.clone(),
            filter: cfg.filter.clone(),
            min_duration: Duration::from_secs(cfg.min_duration_secs),
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Wait out the minimum duration, stop the recorder and count matches.
    pub async fn finish(mut self) -> CaptureSummary {
        let remaining = self.min_duration.saturating_sub(self.started.elapsed());
        if !remaining.is_zero() {
            tracing::info!(remaining_ms = remaining.as_millis() as u64, "waiting for capture window");
            tokio::time::sleep(remaining).await;
        }

        let early_exit = matches!(self.child.try_wait(), Ok(Some(status)) if !status.success());
        let stderr_pipe = self.child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut text).await;
            }
            text
        });

        stop(&mut self.child).await;
        let stderr = match tokio::time::timeout(STOP_TIMEOUT, stderr_task).await {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(_) => String::new(),
        };

        if !self.file.exists() {
            let reason = if stderr.is_empty() {
                "capture file was not written".to_string()
            } else {
                stderr
            };
            tracing::warn!(%reason, early_exit, "capture produced no file");
            return CaptureSummary::failed(&self.filter, reason);
        }

        read_back(&self.program, &self.filter, &self.file).await
    }
}

/// Ask the recorder to exit so it flushes its buffer, then force it.
async fn stop(child: &mut Child) {
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let pid = pid.to_string();
        let sent = Command::new("kill")
            .args(["-TERM", pid.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match sent {
            Ok(status) if status.success() => {
                if tokio::time::timeout(STOP_TIMEOUT, child.wait()).await.is_ok() {
                    return;
                }
                tracing::warn!(pid = %pid, "capture ignored SIGTERM, killing it");
            }
            Ok(status) => tracing::debug!(code = ?status.code(), "kill -TERM refused"),
            Err(e) => tracing::debug!(error = %e, "cannot run kill"),
        }
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "capture already exited");
    }
    if tokio::time::timeout(STOP_TIMEOUT, child.wait()).await.is_err() {
        tracing::error!("capture still running after kill");
    }
}

pub async fn read_back(program: &str, filter: &str, file: &Path) -> CaptureSummary {
    let fut = Command::new(program)
        .args(readback_args(filter, file))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(READBACK_TIMEOUT, fut).await {
        Ok(Ok(out)) if out.status.success() => {
            let summary = CaptureSummary::from_text(filter, &String::from_utf8_lossy(&out.stdout));
            tracing::info!(
                router_advertisements = summary.router_advertisements,
                lines = summary.lines.len(),
                "capture read back"
            );
            summary
        }
        Ok(Ok(out)) => CaptureSummary::failed(
            filter,
            format!(
                "{program} read-back failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ),
        Ok(Err(e)) => CaptureSummary::failed(filter, format!("{program} read-back failed: {e}")),
        Err(_) => CaptureSummary::failed(filter, format!("{program} read-back timed out")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_rotates_into_a_single_file() {
        let cfg = CaptureConfig::default();
        let args = record_args(&cfg, "wlan0", Path::new("/tmp/x.pcap"));
        assert_eq!(args, ["-i", "wlan0", "-W", "1", "-G", "90", "-w", "/tmp/x.pcap"]);
    }

    #[test]
    fn readback_passes_filter_as_one_expression() {
        let args = readback_args("icmp6 && ip6[40] == 134", Path::new("/tmp/x.pcap"));
        assert_eq!(args[0], "icmp6 && ip6[40] == 134");
        assert_eq!(&args[1..], ["-n", "-r", "/tmp/x.pcap"]);
    }

    #[tokio::test]
    async fn missing_program_yields_a_failed_summary() {
        let cfg = CaptureConfig {
            program: "wifidiag-no-such-capture-tool".into(),
            ..CaptureConfig::default()
        };
        let err = Capture::start(&cfg, "wlan0", PathBuf::from("/tmp/never.pcap"))
            .err()
            .expect("spawn should fail");
        assert!(err.error.unwrap().contains("failed to start"));
        assert_eq!(err.router_advertisements, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recorder_that_writes_nothing_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CaptureConfig {
            program: "true".into(),
            min_duration_secs: 0,
            ..CaptureConfig::default()
        };
        let cap = Capture::start(&cfg, "wlan0", dir.path().join("cap.pcap")).unwrap();
        let summary = cap.finish().await;
        assert_eq!(summary.error.as_deref(), Some("capture file was not written"));
    }

    /// Stand-in recorder that only writes its `-w` file when asked to stop
    /// with SIGTERM, and answers `-r` read-backs with one advertisement.
    #[cfg(unix)]
    const FLUSH_ON_TERM: &str = r#"#!/bin/sh
mode=record
out=
while [ $# -gt 0 ]; do
  case "$1" in
    -w) out="$2"; shift ;;
    -r) mode=read ;;
  esac
  shift
done
if [ "$mode" = read ]; then
  echo "IP6 fe80::1 > ff02::1: ICMP6, router advertisement, length 64"
  exit 0
fi
trap 'echo flushed > "$out"; exit 0' TERM
while :; do sleep 0.1; done
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn recorder_is_asked_to_stop_so_it_can_flush() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fakecap");
        std::fs::write(&tool, FLUSH_ON_TERM).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cfg = CaptureConfig {
            program: tool.display().to_string(),
            min_duration_secs: 0,
            ..CaptureConfig::default()
        };
        let file = dir.path().join("cap.pcap");
        let cap = Capture::start(&cfg, "wlan0", file.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let summary = cap.finish().await;
        assert_eq!(summary.error, None);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "flushed\n");
        assert_eq!(summary.router_advertisements, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn readback_counts_router_advertisements() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cap.pcap");
        std::fs::write(&file, "").unwrap();
        // `echo` stands in for the reader: it prints its arguments back.
        let summary = read_back("echo", "ICMP6, router advertisement", &file).await;
        assert_eq!(summary.error, None);
        assert_eq!(summary.router_advertisements, 1);
    }
}
