// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! A minimal MQTT client over a real TCP socket, used to drive a broker
//! subprocess the way the harness's generated traces are meant to be
//! replayed: no shortcuts through the broker's internals, just bytes on a
//! socket, the same posture as any third-party client.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use codec::{ByteArray, DecodePacket, EncodePacket, VarInt};

pub struct MqttTestClient {
    stream: TcpStream,
}

impl MqttTestClient {
    pub async fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, packet: &codec::v3::Packet) -> std::io::Result<()> {
        let mut buf = Vec::new();
        packet
            .encode(&mut buf)
            .map_err(|e| std::io::Error::other(format!("{e:?}")))?;
        self.stream.write_all(&buf).await
    }

    pub async fn recv(&mut self) -> std::io::Result<codec::v3::Packet> {
        let frame = read_frame(&mut self.stream).await?;
        codec::v3::Packet::decode(&frame).map_err(|e| std::io::Error::other(format!("{e:?}")))
    }

    /// Splits into an owned write half (kept by the caller to issue
    /// actions) and read half (handed to a background reader task).
    #[must_use]
    pub fn into_split(self) -> (MqttTestWriter, MqttTestReader) {
        let (read, write) = self.stream.into_split();
        (MqttTestWriter { write }, MqttTestReader { read })
    }
}

pub struct MqttTestWriter {
    write: OwnedWriteHalf,
}

impl MqttTestWriter {
    pub async fn send(&mut self, packet: &codec::v3::Packet) -> std::io::Result<()> {
        let mut buf = Vec::new();
        packet
            .encode(&mut buf)
            .map_err(|e| std::io::Error::other(format!("{e:?}")))?;
        self.write.write_all(&buf).await
    }
}

pub struct MqttTestReader {
    read: OwnedReadHalf,
}

impl MqttTestReader {
    /// Reads one frame and decodes it. `Ok(None)` on a clean EOF.
    pub async fn recv(&mut self) -> std::io::Result<Option<codec::v3::Packet>> {
        match read_frame(&mut self.read).await {
            Ok(frame) => codec::v3::Packet::decode(&frame)
                .map(Some)
                .map_err(|e| std::io::Error::other(format!("{e:?}"))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reads exactly one fixed-header-plus-body frame off an async byte stream:
/// one header byte, then the variable-byte-integer remaining-length field,
/// then that many body bytes.
async fn read_frame<R: AsyncReadExt + Unpin>(stream: &mut R) -> std::io::Result<Vec<u8>> {
    let mut first_byte = [0u8; 1];
    stream.read_exact(&mut first_byte).await?;

    let mut vbi_bytes = Vec::new();
    loop {
        let mut b = [0u8; 1];
        stream.read_exact(&mut b).await?;
        vbi_bytes.push(b[0]);
        if b[0] & 0x80 == 0 {
            break;
        }
    }
    let mut ba = ByteArray::new(&vbi_bytes);
    let remaining = VarInt::decode(&mut ba)
        .map_err(|e| std::io::Error::other(format!("{e:?}")))?
        .value();

    let mut body = vec![0u8; remaining];
    if !body.is_empty() {
        stream.read_exact(&mut body).await?;
    }

    let mut frame = Vec::with_capacity(1 + vbi_bytes.len() + body.len());
    frame.push(first_byte[0]);
    frame.extend_from_slice(&vbi_bytes);
    frame.extend_from_slice(&body);
    Ok(frame)
}
