use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use tokio::sync::mpsc;

mod catalog;
mod config;
mod download;
mod engine;
mod env;
mod error;
mod jre;
mod networking;
mod process;
mod progress;
mod resolver;
mod store;
#[cfg(test)]
mod testing;
mod ui;
mod util;

use crate::config::LauncherConfig;
use crate::engine::LauncherEngine;
use crate::engine::models::{DEFAULT_PROFILE_NAME, DEFAULT_USERNAME, Profile, Server};
use crate::env::AppDirs;
use crate::error::LauncherError;

#[derive(Parser, Debug)]
#[command(
    name = "AoS Launcher",
    author,
    version,
    about = "Command-line launcher for Ace of Shades 2 client builds"
)]
struct Cli {
    /// Launcher data directory.
    #[arg(long, env = "AOS_LAUNCHER_HOME", global = true)]
    home: Option<PathBuf>,

    /// Release list endpoint.
    #[arg(long, env = "AOS_RELEASES_URL", global = true)]
    releases_url: Option<String>,

    #[arg(long, global = true)]
    metadata_timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    transfer_timeout_secs: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List published and locally available client versions.
    Versions,
    /// Make a client version available locally and print its path.
    Resolve { version: String },
    /// Make sure the Java runtime is installed and print its path.
    Runtime,
    /// Prepare everything and run the game until it exits.
    Play {
        #[arg(long, default_value = DEFAULT_USERNAME)]
        username: String,
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// Defaults to the latest release.
        #[arg(long)]
        client_version: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        jvm_args: Option<String>,
        #[arg(long, default_value = DEFAULT_PROFILE_NAME)]
        profile: String,
    },
}

impl Cli {
    fn config(&self) -> LauncherConfig {
        let mut config = LauncherConfig::default();
        if let Some(home) = &self.home {
            config.dirs = AppDirs::new(home);
        }
        if let Some(url) = &self.releases_url {
            config.releases_url = url.clone();
        }
        if let Some(secs) = self.metadata_timeout_secs {
            config.metadata_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.transfer_timeout_secs {
            config.transfer_timeout = Duration::from_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = cli.config();
    if let Err(err) = config.dirs.ensure() {
        error!(
            "startup: failed to create {}: {err}",
            config.dirs.root().display()
        );
        return ExitCode::FAILURE;
    }
    info!("startup: using {}", config.dirs.root().display());

    let engine = LauncherEngine::from_config(&config);
    let view = ui::ProgressView::attach(engine.progress());
    let result = run(cli.command, &engine).await;
    view.finish();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, engine: &LauncherEngine) -> Result<(), LauncherError> {
    match command {
        Command::Versions => {
            for version in engine.resolver().available_versions().await? {
                println!("{}", ui::version_line(&version));
            }
        }
        Command::Resolve { version } => {
            let location = engine.resolver().resolve(&version, engine.progress()).await?;
            info!("resolve: {} is ready", location.identifier());
            println!("{}", location.path().display());
        }
        Command::Runtime => {
            let java = engine.prepare_runtime().await?;
            println!("{}", java.display());
        }
        Command::Play {
            username,
            host,
            port,
            client_version,
            jvm_args,
            profile,
        } => {
            let mut profile = Profile::new(profile, username, engine.dirs());
            profile.client_version = client_version;
            profile.jvm_args = jvm_args;
            let server = Server { host, port };

            let (tx, rx) = mpsc::unbounded_channel();
            let printer = ui::spawn_state_printer(rx);
            let result = engine.play(&profile, &server, &tx).await;
            drop(tx);
            printer.await.ok();
            result?;
        }
    }
    Ok(())
}
