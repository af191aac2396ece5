use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use kaiwa::chat::api::ApiTarget;
use kaiwa::config::RelaySettings;
use kaiwa::relay::{RelayState, app};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kaiwa-relay", about = "Stateless relay for hosted chat models")]
struct Cli {
    /// Path to the JSON settings file
    #[arg(long, default_value = "relay-settings.json")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = match RelaySettings::load(&cli.settings) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let state = Arc::new(RelayState {
        target: ApiTarget::new(settings.endpoint.clone(), settings.api_key.clone()),
        client: reqwest::Client::new(),
    });

    let listener = match tokio::net::TcpListener::bind(&settings.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("Failed to bind {}: {err}", settings.listen);
            process::exit(1);
        }
    };

    info!(addr = %settings.listen, endpoint = %settings.endpoint, "kaiwa-relay listening");
    if let Err(err) = axum::serve(listener, app(state)).await {
        eprintln!("Server error: {err}");
        process::exit(1);
    }
}
