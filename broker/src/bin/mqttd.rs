// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;

use mqttd::{Config, Error, Server};

/// MQTT 3.1.1 / 5.0 broker.
#[derive(Parser, Debug)]
#[command(name = "mqttd", version)]
struct Cli {
    /// Listener port, used when no config file supplies one.
    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// Path to a plain-text config file.
    #[arg(short = 'c', long = "config", value_name = "config_file")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    std::env::set_var("RUST_LOG", "info");
    let _ = env_logger::try_init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config {}: {}", path.display(), err);
                return ExitCode::from(2);
            }
        },
        None => Config::default(),
    };
    if cli.config.is_none() {
        for listener in &mut config.listeners {
            listener.port = cli.port;
        }
    }

    if let Err(err) = mqttd::logging::init(&config.log_level) {
        eprintln!("failed to initialize logging: {}", err);
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("server error: {}", err);
            ExitCode::from(2)
        }
    }
}

#[tokio::main]
async fn run(config: Config) -> Result<(), Error> {
    let server = Server::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        log::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    server.run(shutdown_rx).await
}
