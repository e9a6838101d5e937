use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;

#[cfg(test)]
mod tests;

const LOG_ENV: &str = "TORCX_LOG";

#[derive(Parser, Debug)]
#[command(name = "torcx")]
#[command(version, about = "Boot-time addon manager", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Config file [default: /etc/torcx/config.toml]")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log at debug level")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Apply the configured profile, then seal the system state")]
    Apply {
        #[arg(long)]
        no_seal: bool,
    },
    #[command(about = "Show the seal record of the current boot")]
    Status,
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    #[command(about = "Download an image from its remote into the user store")]
    Fetch {
        name: String,
        reference: String,
        #[arg(long, help = "Remote to fetch from [default: from the merged profile]")]
        remote: Option<String>,
    },
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommands {
    List,
    #[command(about = "Check that a profile's images are in a local store")]
    Check { name: Option<String> },
    #[command(about = "Print a profile, or the merged profile, as JSON")]
    Show { name: Option<String> },
}

#[derive(Subcommand, Debug)]
enum ImageCommands {
    List,
}

#[derive(Subcommand, Debug)]
enum RemoteCommands {
    List,
    #[command(about = "Print the evaluated base URL of a remote")]
    Url { name: String },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dispatch::run_cli(cli).map_err(dispatch::explain_failure)
}
