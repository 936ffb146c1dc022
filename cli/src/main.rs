use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use wifidiag_cli::app::{self, RunPlan};
use wifidiag_cli::commands::{cli, tasks};
use wifidiag_cli::persist::{RunFolder, RunUser};
use wifidiag_core::api::{load_default, CliError, LoggingConfig, Platform};

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let mut args = cli::Args::parse();
    let mut cfg = load_default(args.config.as_deref())?;
    let platform = match args.platform {
        Some(p) => p,
        None => Platform::current()?,
    };

    let run = match args.command.take() {
        Some(cli::Commands::Tasks(_)) => {
            init_tracing(&app::listing_logging(&cfg.logging), None).map_err(CliError::Command)?;
            let registry = cfg.registry()?;
            let out = tasks::render(&registry, platform, args.json).map_err(anyhow::Error::from)?;
            print!("{out}");
            if args.json {
                println!();
            }
            return Ok(0);
        }
        Some(cli::Commands::Run(run)) => run,
        None => args.run.clone(),
    };

    app::apply_run_args(&mut cfg, &run);
    cfg.validate()?;

    let user = RunUser::detect(|k| std::env::var(k).ok());
    let folder = RunFolder::create(Path::new(&cfg.output.folder), &user, chrono::Local::now())?;
    let log_file = folder.log_file_name();
    init_tracing(&cfg.logging, Some((folder.dir.as_path(), log_file.as_str()))).map_err(CliError::Command)?;
    tracing::info!(dir = %folder.dir.display(), version = wifidiag_core::VERSION, "run folder ready");

    app::run_diagnostics(RunPlan {
        cfg,
        platform,
        user,
        folder,
        json: args.json,
    })
    .await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: IO / external command error
    // 30: scoring inconsistency
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Score(_) => 30,
        CliError::Anyhow(_) => 50,
    }
}

/// Console and/or file logging. The file is `file_name` under
/// `logging.directory` when set, otherwise under `default_dir`; without a
/// file target only the console layer is considered.
fn init_tracing(logging: &LoggingConfig, file_target: Option<(&Path, &str)>) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if let Some((default_dir, file_name)) = file_target.filter(|_| logging.file) {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => PathBuf::from(d),
            None => default_dir.to_path_buf(),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
