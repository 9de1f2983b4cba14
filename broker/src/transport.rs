// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Duplex byte transport abstraction for a client connection.
//!
//! A real deployment reads and writes a `TcpStream` (optionally wrapped in a
//! WebSocket framing layer upstream of this type). The conformance harness
//! instead drives the broker against an in-memory `tokio::io::duplex` pair,
//! so the same connection-handling code path runs under test without ever
//! touching a socket.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;

use crate::error::Error;

#[derive(Debug)]
pub enum Transport {
    Tcp(TcpStream),
    Memory(DuplexStream),
}

impl Transport {
    /// Reads whatever is available into `buf`, returning the number of
    /// bytes read. `0` means the peer closed the connection.
    pub async fn read_buf(&mut self, buf: &mut Vec<u8>) -> Result<usize, Error> {
        match self {
            Self::Tcp(stream) => Ok(stream.read_buf(buf).await?),
            Self::Memory(stream) => Ok(stream.read_buf(buf).await?),
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        match self {
            Self::Tcp(stream) => Ok(stream.write_all(buf).await?),
            Self::Memory(stream) => Ok(stream.write_all(buf).await?),
        }
    }
}

impl From<TcpStream> for Transport {
    fn from(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

impl From<DuplexStream> for Transport {
    fn from(stream: DuplexStream) -> Self {
        Self::Memory(stream)
    }
}
