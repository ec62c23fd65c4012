use anyhow::Context;
use clap::Parser;
use colored::*;
use std::process::ExitCode;

mod cli;
mod commands;

use cli::{Cli, Command};
use dockerfile_transform::config::Config;
use dockerfile_transform::context::RootContext;
use dockerfile_transform::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "[X]".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    config.apply_env_overrides();
    if cli.log_json {
        config.logging.json = true;
    }

    logging::init_tracing(&config.logging, cli.debug);
    tracing::debug!(?cli, "starting");

    // Ctrl-C는 빌드 컨텍스트 취소로 전파
    let ctx = RootContext::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling build");
            signal_ctx.cancel();
        }
    });

    match cli.command {
        Command::Render(args) => commands::render(args, config, ctx).await?,
        Command::Fetch(args) => commands::fetch(args).await?,
    }

    Ok(())
}
