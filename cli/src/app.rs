//! Wires config, detection, capture, collection, scoring and persistence into one run.
use std::sync::Arc;

use wifidiag_core::api::{
    assemble_with_capture, score, AppConfig, CaptureSummary, CliError, Collector, Context,
    LoggingConfig, Platform, ProcessRunner, ScoreTable,
};

use crate::capture::Capture;
use crate::commands::cli::RunArgs;
use crate::persist::{RunFolder, RunUser};
use crate::platform;

pub struct RunPlan {
    pub cfg: AppConfig,
    pub platform: Platform,
    pub user: RunUser,
    pub folder: RunFolder,
    pub json: bool,
}

enum CaptureState {
    Off,
    Failed(CaptureSummary),
    Running(Capture),
}

impl CaptureState {
    async fn finish(self) -> Option<CaptureSummary> {
        match self {
            Self::Off => None,
            Self::Failed(summary) => Some(summary),
            Self::Running(capture) => Some(capture.finish().await),
        }
    }
}

/// Fold command-line flags over the loaded config.
pub fn apply_run_args(cfg: &mut AppConfig, run: &RunArgs) {
    if let Some(iface) = &run.interface {
        cfg.collector.interface = Some(iface.clone());
    }
    if let Some(n) = run.concurrency {
        cfg.collector.concurrency = Some(n);
    }
    if let Some(secs) = run.deadline_secs {
        cfg.collector.global_deadline_secs = secs;
    }
    if run.no_ipv6 {
        cfg.collector.ipv6 = false;
    }
    if run.no_capture {
        cfg.capture.enabled = false;
    }
    if let Some(dir) = &run.output_dir {
        cfg.output.folder = dir.clone();
    }
}

/// Logging for one-shot listing commands: console only, never a file.
pub fn listing_logging(logging: &LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        enabled: logging.enabled && logging.console,
        file: false,
        ..logging.clone()
    }
}

fn start_capture(cfg: &AppConfig, user: &RunUser, interface: &str, folder: &RunFolder) -> CaptureState {
    if !cfg.capture.enabled {
        return CaptureState::Off;
    }
    if !user.privileged {
        tracing::info!("capture skipped: requires root");
        return CaptureState::Off;
    }
    match Capture::start(&cfg.capture, interface, folder.capture_path()) {
        Ok(capture) => CaptureState::Running(capture),
        Err(summary) => CaptureState::Failed(summary),
    }
}

#[tracing::instrument(name = "cli.run", skip_all, fields(platform = %plan.platform))]
pub async fn run_diagnostics(plan: RunPlan) -> Result<i32, CliError> {
    let RunPlan {
        cfg,
        platform,
        user,
        folder,
        json,
    } = plan;

    let registry = cfg.registry()?;
    let specs = registry.select(platform);

    let interface = platform::resolve_interface(platform, cfg.collector.interface.as_deref()).await;
    let (v4, v6) = platform::resolve_gateways(platform, &interface).await;
    let ctx = Context::new(platform, interface)
        .with_gateways(v4, v6)
        .with_options(cfg.to_run_options());
    tracing::info!(
        tasks = specs.len(),
        interface = %ctx.interface,
        user = %user.name,
        privileged = user.privileged,
        "starting diagnostics"
    );

    let capture = start_capture(&cfg, &user, &ctx.interface, &folder);

    let progress = !json && atty::is(atty::Stream::Stderr);
    let collector = Collector::builder()
        .runner(Arc::new(ProcessRunner::new(ctx.options.capture_bytes)))
        .progress(progress)
        .build();
    let store = collector.collect(&specs, &ctx).await;

    let table = ScoreTable::build(&cfg.scoring, &specs);
    let score_report = score(&store, &table)?;

    let capture = capture.finish().await;
    let report = assemble_with_capture(&store, &score_report, &ctx, capture);
    folder.write_report(&report, &cfg.output)?;

    if json {
        let doc = report.document.to_json_pretty().map_err(anyhow::Error::from)?;
        println!("{doc}");
    } else {
        print!("{}", report.highlights());
        println!("Report folder: {}", folder.dir.display());
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut cfg = AppConfig::default();
        let run = RunArgs {
            interface: Some("wlx1".into()),
            concurrency: Some(2),
            deadline_secs: Some(15),
            no_ipv6: true,
            no_capture: true,
            output_dir: Some("/tmp/diag".into()),
        };
        apply_run_args(&mut cfg, &run);

        assert_eq!(cfg.collector.interface.as_deref(), Some("wlx1"));
        assert_eq!(cfg.collector.concurrency, Some(2));
        assert_eq!(cfg.collector.global_deadline_secs, 15);
        assert!(!cfg.collector.ipv6);
        assert!(!cfg.capture.enabled);
        assert_eq!(cfg.output.folder, "/tmp/diag");
    }

    #[test]
    fn listing_never_logs_to_a_file() {
        let quiet = listing_logging(&LoggingConfig::default());
        assert!(!quiet.file);
        assert!(!quiet.enabled, "default logging has no console layer");

        let console = LoggingConfig {
            console: true,
            level: "debug".into(),
            ..LoggingConfig::default()
        };
        let listing = listing_logging(&console);
        assert!(listing.enabled && listing.console && !listing.file);
        assert_eq!(listing.level, "debug");
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let mut cfg = AppConfig::default();
        apply_run_args(&mut cfg, &RunArgs::default());
        assert_eq!(cfg.collector.global_deadline_secs, 120);
        assert!(cfg.collector.ipv6);
        assert!(cfg.capture.enabled);
    }
}
