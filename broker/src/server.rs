// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Listener accept loop and the 1 Hz sweeper task.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::time::interval;

use crate::broker::Broker;
use crate::config::Config;
use crate::connection;
use crate::error::Error;
use crate::transport::Transport;

pub struct Server {
    config: Config,
    broker: Arc<Mutex<Broker>>,
}

impl Server {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let broker = Broker::new(config.clone());
        Self {
            config,
            broker: Arc::new(Mutex::new(broker)),
        }
    }

    /// Runs every configured listener plus the sweeper task until `shutdown`
    /// is signalled. Returns once all listener tasks have wound down.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        let mut listener_tasks = Vec::new();

        for listener_cfg in &self.config.listeners {
            let addr = format!("{}:{}", listener_cfg.bind, listener_cfg.port);
            let listener = TcpListener::bind(&addr).await?;
            log::info!("listening on {}", addr);

            let broker = Arc::clone(&self.broker);
            let shutdown_rx = shutdown.clone();
            listener_tasks.push(tokio::spawn(accept_loop(listener, broker, shutdown_rx)));
        }

        let broker = Arc::clone(&self.broker);
        let sweeper_shutdown = shutdown.clone();
        let sweeper = tokio::spawn(run_sweeper(broker, sweeper_shutdown));

        let _ = shutdown.changed().await;

        for task in listener_tasks {
            let _ = task.await;
        }
        let _ = sweeper.await;
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, broker: Arc<Mutex<Broker>>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        log::debug!("accepted connection from {}", peer);
                        let broker = Arc::clone(&broker);
                        let shutdown_rx = shutdown.clone();
                        tokio::spawn(connection::run(Transport::from(socket), broker, shutdown_rx));
                    }
                    Err(err) => {
                        log::warn!("accept() failed: {}", err);
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn run_sweeper(broker: Arc<Mutex<Broker>>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                broker.lock().await.sweep().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
