mod application;
mod cli;
mod config;
mod domain;
mod infrastructure;

pub use application::{agent, chat, events, registrar};
pub use domain::types;
pub use infrastructure::stack;

use chat::{ChatError, ChatOptions, StdinPrompter};
use clap::Parser;
use cli::Cli;
use config::{AppConfig, Endpoints};
use stack::StackClient;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Optional .env, applied before logging and flag parsing.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let endpoints = Endpoints::resolve(cli.remote);
    let settings = AppConfig::load(cli.config.as_deref().map(Path::new))?;

    let service = Arc::new(StackClient::new(endpoints.base_url.clone()));
    info!(base_url = %endpoints.base_url, "Connected to Llama Stack server");

    let mut prompter = StdinPrompter::new();
    let mut out = std::io::stdout();
    let options = ChatOptions {
        auto: cli.auto,
        session_info_on_exit: cli.session_info_on_exit,
    };

    match chat::run(
        service,
        &settings,
        &endpoints.mcp_url,
        options,
        &mut prompter,
        &mut out,
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(ChatError::Registration(err)) => {
            error!(error = %err, "Tool group registration failed; exiting");
            std::process::exit(1);
        }
        Err(other) => Err(other.into()),
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init();
    });
}
