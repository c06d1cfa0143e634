pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "latch")]
#[command(about = "Claim a path and publish to it with a password")]
#[command(version)]
pub struct Args {
    /// Gateway URL (defaults to the config file, then http://localhost:8080)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the latch config directory (defaults to ~/.latch)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log level for diagnostics on stderr
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: crate::Command,
}

/// Which path to act on and with which password.
#[derive(clap::Args, Debug, Clone)]
pub struct Credentials {
    /// Path to claim or publish under
    #[arg(long)]
    pub path: String,

    /// Password protecting the path (empty means anyone can write)
    #[arg(long, default_value = "")]
    pub password: String,
}
