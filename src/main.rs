//! quickgpt - chat relay for hosted LLM APIs
//!
//! Serves a browser chat client: forwards conversations to Groq or Hugging
//! Face and replays the reply as JSON or as a paced SSE stream.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickgpt::config::Config;
use quickgpt::proxy::run_server;

#[derive(Parser)]
#[command(name = "quickgpt")]
#[command(about = "Chat relay for hosted LLM APIs with simulated SSE streaming")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Optional TOML configuration file (environment variables take precedence)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Resolve and validate configuration, then print it
    Check {
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside development.
    let dotenv_path = dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut config = Config::load(config.as_deref())?;
            init_tracing(&config.logging.level);

            if let Some(path) = dotenv_path {
                tracing::info!(path = %path.display(), "Loaded environment file");
            }
            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let config = Config::load(config.as_deref())?;
            init_tracing(&config.logging.level);

            match &config.provider.api_key {
                Some(_) => tracing::info!(provider = %config.provider.kind, "API key present"),
                None => tracing::warn!(
                    var = config.provider.kind.api_key_var(),
                    "API key missing - requests will fail with a configuration error"
                ),
            }

            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
