use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
use segload::{LoaderConfig, RunSummary};
use segload_cli::{CliError, LoadArgs};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exit with a non-zero status when any input file failed
    #[arg(long, global = true)]
    fail_on_error: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load segmentation results described by command-line flags
    Load {
        #[command(flatten)]
        args: LoadArgs,
        /// Print the resulting configuration as TOML and exit
        #[arg(long)]
        print_config: bool,
    },
    /// Load segmentation results using a TOML or JSON configuration file
    Process {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

fn usage_error(err: CliError) -> ! {
    Cli::command().error(ErrorKind::InvalidValue, err).exit()
}

/// Flip the cancel flag on the first Ctrl-C; running files still finish.
fn cancel_on_interrupt() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing running files");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn load(config: LoaderConfig, fail_on_error: bool) -> Result<()> {
    let summary: RunSummary = segload::run(config, cancel_on_interrupt()).await?;
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped = summary.skipped,
        documents = summary.documents,
        "load complete"
    );
    if fail_on_error && summary.has_failures() {
        bail!("{} of {} input files failed", summary.failed, summary.started);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load { args, print_config } => {
            let config = args.into_config().unwrap_or_else(|e| usage_error(e));
            if print_config {
                println!("{}", config.to_toml()?);
                return Ok(());
            }
            load(config, cli.fail_on_error).await
        }
        Commands::Process { config } => {
            info!("Loading configuration from: {}", config.display());
            let config = LoaderConfig::from_file(&config)?;
            load(config, cli.fail_on_error).await
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(LoaderConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}
