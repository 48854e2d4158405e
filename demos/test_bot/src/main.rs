//! A small robot that chats from the terminal.
//!
//! ```text
//! test-bot run [CONFIG_PATH]
//! ```

mod handlers;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use pewter::framework::RouteTable;
use pewter::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(name = "test-bot", version, about = "A demonstration robot built on Pewter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the robot
    Run {
        /// Configuration file; defaults to `pewter.toml` in the current directory
        config_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Run { config_path } => run(config_path.as_deref()).await,
    }
}

async fn run(config_path: Option<&Path>) -> Result<()> {
    let registry = Arc::new(Registry::new());
    registry.register_adapter_type::<ShellAdapter>()?;
    registry.register_handler(handlers::ping::handler()?);
    registry.register_handler(handlers::remember::handler()?);
    registry.register_handler(handlers::help::handler(Arc::downgrade(&registry))?);

    let http = Arc::new(RouteTable::new());
    let robot = Robot::builder(registry, RunMode::Normal)
        .http_router(http.clone())
        .build();

    robot.run(config_path).await?;
    info!(http_routes = http.len(), "test-bot exited");
    Ok(())
}
