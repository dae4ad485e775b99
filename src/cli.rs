use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "devwatch")]
#[command(version = "0.1.0")]
#[command(about = "Device health supervisor with alerting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml, <DEVWATCH_ENV>.toml)
    #[arg(short, long, default_value = "config", env = "DEVWATCH_CONFIG_DIR")]
    pub config: String,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the supervisor and the health API until interrupted
    Run,
    /// Run one probe cycle and print the health report as JSON
    Check,
}
