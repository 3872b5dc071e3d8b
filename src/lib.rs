// Declare the modules
pub mod activity;
pub mod api;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod profile;
pub mod prompts;
pub mod schedule;
pub mod state;
pub mod storage;

use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use state::AppState;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    if let Command::SetKey { api_key } = &cli.command {
        config::set_api_key_in_keyring(&config.completion, api_key.trim())?;
        println!("API key stored in the keyring for model '{}'.", config.completion.model);
        return Ok(());
    }

    let command = cli.command;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let state = AppState::initialize(&config).await?;
        let output = cli::execute(&state, command).await?;
        println!("{output}");
        Ok::<(), anyhow::Error>(())
    })
}
