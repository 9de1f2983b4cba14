// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Drives a sequence of `Action`s against a live broker connection and
//! collects the resulting `Observation`s. Inbound packets are read by a
//! dedicated task and handed to the caller through a bounded channel: if
//! the caller falls behind, the reader blocks on `send`, the same
//! back-pressured posture the design notes describe for the harness's
//! observation channel.

use tokio::sync::mpsc;

use crate::client::{MqttTestClient, MqttTestWriter};
use crate::model::{Action, Observation};

/// How many observations may be buffered before the reader task blocks.
const OBSERVATION_CHANNEL_CAPACITY: usize = 16;

pub struct Executor {
    writer: MqttTestWriter,
    observations: mpsc::Receiver<Observation>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl Executor {
    /// Takes ownership of a connected client, splits it, and spawns the
    /// background reader that feeds the observation channel.
    #[must_use]
    pub fn new(client: MqttTestClient) -> Self {
        let (writer, mut reader) = client.into_split();
        let (tx, rx) = mpsc::channel(OBSERVATION_CHANNEL_CAPACITY);

        let reader_task = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(Some(packet)) => {
                        if tx.send(Observation::from(packet)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        log::debug!("harness reader: connection closed by peer");
                        let _ = tx.send(Observation::Closed).await;
                        break;
                    }
                    Err(err) => {
                        log::debug!("harness reader: {}", err);
                        let _ = tx.send(Observation::Closed).await;
                        break;
                    }
                }
            }
        });

        Self {
            writer,
            observations: rx,
            reader_task,
        }
    }

    pub async fn act(&mut self, action: &Action) -> std::io::Result<()> {
        self.writer.send(&action.to_v3_packet()).await
    }

    /// Waits for the next observation the reader produced. `None` once the
    /// reader task has exited and the channel is drained.
    pub async fn next_observation(&mut self) -> Option<Observation> {
        self.observations.recv().await
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
