//! lanshare-ftp - Entry Point
//!
//! Shares one folder over FTP until Ctrl-C.

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use lanshare_ftp::{FtpServer, LogCrateSink, ServerConfig};

#[derive(Parser)]
#[command(name = "lanshare-ftp")]
#[command(about = "Share a local folder over FTP on loopback or the LAN", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); LANSHARE_FTP_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to share
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Login name
    #[arg(short, long)]
    user: Option<String>,

    /// Login password
    #[arg(short, long, env = "LANSHARE_FTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Control port (0 picks a free one)
    #[arg(long)]
    port: Option<u16>,

    /// Listen on every interface instead of loopback only
    #[arg(long)]
    lan: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, lanshare_ftp::ConfigError> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        if let Some(root) = self.root {
            config.root_directory = root;
        }
        if let Some(user) = self.user {
            config.username = user;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.lan {
            config.bind_all_interfaces = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let display_host = config.display_host();
    let username = config.username.clone();

    info!("Launching FTP server...");
    let server = FtpServer::new(Arc::new(LogCrateSink));
    let addr = match server.start(config.clone()).await {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Sharing as {username}: {}", config.access_url(&display_host, addr.port()));
    println!("Press Ctrl-C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
    }

    match server.stop().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to stop cleanly: {e}");
            ExitCode::FAILURE
        }
    }
}
