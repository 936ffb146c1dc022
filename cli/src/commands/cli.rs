use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use wifidiag_core::api::Platform;

#[derive(Parser, Debug)]
#[command(name = "wifidiag", version, about = "Wireless network diagnostics and connectivity tests")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file; defaults to ~/.wifidiag/config.toml, then ./wifidiag.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the detected platform (linux, darwin).
    #[arg(long, global = true)]
    pub platform: Option<Platform>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    /// Wireless interface; detected when omitted.
    #[arg(long)]
    pub interface: Option<String>,

    /// Maximum number of tasks running at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Global deadline for the whole collection, in seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Skip every IPv6 test.
    #[arg(long)]
    pub no_ipv6: bool,

    /// Do not run the packet capture.
    #[arg(long)]
    pub no_capture: bool,

    /// Parent folder for run output.
    #[arg(long)]
    pub output_dir: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TasksArgs {}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect, score and report (the default).
    Run(RunArgs),
    /// List the tasks selected for the platform.
    Tasks(TasksArgs),
}
