// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared test scaffolding: an in-memory client driving a real
//! `connection::run` worker task against a shared `Broker`, the same way
//! the conformance harness drives the broker without touching a socket.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Mutex};

use mqttd::broker::Broker;
use mqttd::config::Config;
use mqttd::connection;
use mqttd::transport::Transport;

use codec::{ByteArray, DecodePacket, EncodePacket, VarInt};

pub struct TestClient {
    stream: tokio::io::DuplexStream,
}

impl TestClient {
    pub async fn send_v3(&mut self, packet: &codec::v3::Packet) {
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        self.stream.write_all(&buf).await.unwrap();
    }

    pub async fn recv_v3(&mut self) -> codec::v3::Packet {
        let frame = self.read_frame().await;
        codec::v3::Packet::decode(&frame).unwrap()
    }

    pub async fn send_v5(&mut self, packet: &codec::v5::Packet) {
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        self.stream.write_all(&buf).await.unwrap();
    }

    pub async fn recv_v5(&mut self) -> codec::v5::Packet {
        let frame = self.read_frame().await;
        codec::v5::Packet::decode(&frame).unwrap()
    }

    async fn read_frame(&mut self) -> Vec<u8> {
        let mut first_byte = [0u8; 1];
        self.stream.read_exact(&mut first_byte).await.unwrap();

        let mut vbi_bytes = Vec::new();
        loop {
            let mut b = [0u8; 1];
            self.stream.read_exact(&mut b).await.unwrap();
            vbi_bytes.push(b[0]);
            if b[0] & 0x80 == 0 {
                break;
            }
        }
        let mut ba = ByteArray::new(&vbi_bytes);
        let remaining = VarInt::decode(&mut ba).unwrap();

        let mut body = vec![0u8; remaining.value()];
        if !body.is_empty() {
            self.stream.read_exact(&mut body).await.unwrap();
        }

        let mut frame = Vec::with_capacity(1 + vbi_bytes.len() + body.len());
        frame.push(first_byte[0]);
        frame.extend_from_slice(&vbi_bytes);
        frame.extend_from_slice(&body);
        frame
    }
}

pub struct TestBroker {
    pub broker: Arc<Mutex<Broker>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TestBroker {
    pub fn new() -> Self {
        let broker = Arc::new(Mutex::new(Broker::new(Config::default())));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            broker,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn connect_client(&self) -> TestClient {
        let (client_half, server_half) = tokio::io::duplex(4096);
        let broker = Arc::clone(&self.broker);
        let shutdown_rx = self.shutdown_rx.clone();
        tokio::spawn(connection::run(Transport::from(server_half), broker, shutdown_rx));
        TestClient { stream: client_half }
    }
}
