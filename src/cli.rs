use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "A terminal dashboard for a Kubernetes REST gateway."
)]
pub struct CliArgs {
    /// Base URL of the dashboard API (overrides config)
    #[arg(long)]
    pub server: Option<String>,

    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Upload this kubeconfig at startup when the session is locked
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file; logs are discarded otherwise
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
