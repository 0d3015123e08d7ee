//! `ark-evaluator` -- CLI binary for the evaluation service.
//!
//! Provides two subcommands:
//!
//! - `ark-evaluator serve` -- start the HTTP facade.
//! - `ark-evaluator check-config` -- print resolved configuration and exit.

use clap::{Parser, Subcommand};

/// ark-evaluator: Kubernetes-native LLM evaluation service.
#[derive(Parser)]
#[command(name = "ark-evaluator", about = "Kubernetes-native LLM evaluation service", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP facade.
    Serve,

    /// Print resolved configuration and exit, without starting a server.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Serve => serve().await?,
        Commands::CheckConfig => check_config(),
    }

    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    let config = ark_evaluator_core::config::load_config();
    let bind_address = config.bind_address.clone();

    let state = ark_evaluator_api::AppState::new(config);
    let app = ark_evaluator_api::build_router(state);

    tracing::info!(bind_address = %bind_address, "starting ark-evaluator");
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(bind_address = %bind_address, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    axum::serve(listener, app).await?;
    Ok(())
}

fn check_config() {
    let config = ark_evaluator_core::config::load_config();
    match serde_yaml::to_string(&config) {
        Ok(yaml) => println!("{yaml}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
