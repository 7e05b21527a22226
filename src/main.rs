use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "courier")]
#[command(version, about = "Webhook delivery and verification relay for agent jobs")]
pub struct Cli {
    /// Log filter when RUST_LOG is not set (e.g. "info", "courier=debug")
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Directory holding courier.toml (defaults to .courier)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides config)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (bind on all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,

        /// Reject terminal events for jobs without a signing secret
        #[arg(long)]
        require_signature: bool,
    },
    /// Register a job and print its signing secret
    Register {
        /// Job identifier
        job_id: String,

        /// URL that receives the signed completion event
        callback_url: String,

        /// Metadata JSON attached to the job and echoed back on completion
        #[arg(long)]
        metadata: Option<String>,

        /// Database path (overrides config)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs);

    match &cli.command {
        Commands::Serve {
            port,
            db_path,
            dev,
            require_signature,
        } => {
            cmd::cmd_serve(&cli, *port, db_path.clone(), *dev, *require_signature).await?;
        }
        Commands::Register {
            job_id,
            callback_url,
            metadata,
            db_path,
        } => {
            cmd::cmd_register(
                &cli,
                job_id,
                callback_url,
                metadata.as_deref(),
                db_path.clone(),
            )
            .await?;
        }
    }

    Ok(())
}
