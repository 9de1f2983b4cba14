// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The per-connection worker task: reads frames off a `Transport`, decodes
//! them with whichever protocol version CONNECT negotiated, dispatches them
//! against the shared `Broker`, and serializes outbound packets back onto
//! the same transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::interval;

use codec::{v3, v5, ByteArray, DecodePacket, EncodePacket, ProtocolLevel, VarInt};

use crate::broker::Broker;
use crate::commands::{BrokerToSessionCmd, OutgoingPacket};
use crate::dispatcher::{self, ConnectionState, DispatchAction};
use crate::error::Error;
use crate::transport::Transport;
use crate::types::ProtocolVersion;

const READ_CHUNK_HINT: usize = 1024;

pub async fn run(
    mut transport: Transport,
    broker: Arc<Mutex<Broker>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK_HINT);
    let mut state = ConnectionState::default();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
    let mut poll = interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = transport.read_buf(&mut buf) => {
                match result {
                    Ok(0) => break,
                    Ok(_) => {
                        if let Err(err) = drain_frames(
                            &mut buf,
                            &broker,
                            &mut state,
                            &outbound_tx,
                            &mut transport,
                        ).await {
                            log::warn!("closing connection: {}", err);
                            break;
                        }
                    }
                    Err(err) => {
                        log::warn!("transport read failed: {}", err);
                        break;
                    }
                }
            }
            Some(cmd) = outbound_rx.recv() => {
                if !handle_broker_cmd(cmd, &mut transport).await {
                    break;
                }
            }
            _ = poll.tick() => {
                if is_keep_alive_expired(&broker, &state).await {
                    log::info!("[MQTT-3.1.2-24] keep-alive expired for {:?}", state.client_id);
                    break;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if !state.disconnect_handled {
        if let Some(client_id) = &state.client_id {
            let mut broker = broker.lock().await;
            let expiry = broker
                .session(client_id)
                .map(|s| s.session_expiry_interval)
                .unwrap_or(0);
            broker.disconnect(client_id, true, expiry);
        }
    }
}

async fn is_keep_alive_expired(broker: &Arc<Mutex<Broker>>, state: &ConnectionState) -> bool {
    let Some(client_id) = &state.client_id else {
        return false;
    };
    let broker = broker.lock().await;
    broker
        .session(client_id)
        .map(|s| s.is_keep_alive_expired())
        .unwrap_or(false)
}

async fn handle_broker_cmd(cmd: BrokerToSessionCmd, transport: &mut Transport) -> bool {
    match cmd {
        BrokerToSessionCmd::Packet(packet) => {
            if let Err(err) = write_packet(transport, packet).await {
                log::warn!("dropping packet on send: {}", err);
            }
            true
        }
        BrokerToSessionCmd::Kick(reason) => {
            log::info!("session kicked: {}", reason);
            false
        }
    }
}

async fn write_packet(transport: &mut Transport, packet: OutgoingPacket) -> Result<(), Error> {
    let mut buf = Vec::new();
    match packet {
        OutgoingPacket::V3(p) => {
            p.encode(&mut buf)?;
        }
        OutgoingPacket::V5(p) => {
            p.encode(&mut buf)?;
        }
    }
    transport.write_all(&buf).await
}

/// Pulls every complete frame out of `buf`, dispatches each, writes any
/// immediate replies, and leaves a trailing partial frame (if any) in place.
async fn drain_frames(
    buf: &mut Vec<u8>,
    broker: &Arc<Mutex<Broker>>,
    state: &mut ConnectionState,
    outbound_tx: &mpsc::Sender<BrokerToSessionCmd>,
    transport: &mut Transport,
) -> Result<(), Error> {
    loop {
        let Some(frame_len) = next_frame_len(buf) else {
            break;
        };
        let frame = buf[..frame_len].to_vec();
        buf.drain(..frame_len);

        let action = dispatch_one(&frame, broker, state, outbound_tx).await?;
        match action {
            DispatchAction::Reply(packets) => {
                for packet in packets {
                    write_packet(transport, packet).await?;
                }
            }
            DispatchAction::ReplyAndClose(packets) => {
                for packet in packets {
                    write_packet(transport, packet).await?;
                }
                return Err(Error::new(crate::error::ErrorKind::IoError, "peer disconnected"));
            }
            DispatchAction::CloseWithWill => {
                return Err(Error::new(
                    crate::error::ErrorKind::IoError,
                    "closing due to protocol violation",
                ));
            }
            DispatchAction::None => {}
        }
    }
    Ok(())
}

async fn dispatch_one(
    frame: &[u8],
    broker: &Arc<Mutex<Broker>>,
    state: &mut ConnectionState,
    outbound_tx: &mpsc::Sender<BrokerToSessionCmd>,
) -> Result<DispatchAction, Error> {
    let mut broker = broker.lock().await;

    let version = match state.protocol_version {
        Some(v) => v,
        None => peek_protocol_version(frame)?,
    };

    let action = match version {
        ProtocolVersion::V311 => {
            let packet = v3::Packet::decode(frame)?;
            dispatcher::dispatch_v3(&mut broker, state, outbound_tx, packet).await
        }
        ProtocolVersion::V5 => {
            let packet = v5::Packet::decode(frame)?;
            dispatcher::dispatch_v5(&mut broker, state, outbound_tx, packet).await
        }
    };
    Ok(action)
}

fn peek_protocol_version(frame: &[u8]) -> Result<ProtocolVersion, Error> {
    if frame.is_empty() || frame[0] & 0xf0 != 0x10 {
        return Err(Error::new(
            crate::error::ErrorKind::DecodeError,
            "[MQTT-3.1.0-1] first packet was not CONNECT",
        ));
    }
    // Fixed header (>=2 bytes) + "MQTT" string (2-byte length + 4 bytes) = protocol level byte.
    let mut offset = 1;
    let mut remaining_len_bytes = 0;
    loop {
        if offset >= frame.len() {
            return Err(Error::new(crate::error::ErrorKind::DecodeError, "truncated CONNECT"));
        }
        let byte = frame[offset];
        offset += 1;
        remaining_len_bytes += 1;
        if byte & 0x80 == 0 || remaining_len_bytes == 4 {
            break;
        }
    }
    let level_offset = offset + 2 + 4;
    let level_byte = *frame
        .get(level_offset)
        .ok_or_else(|| Error::new(crate::error::ErrorKind::DecodeError, "truncated CONNECT"))?;
    let level = ProtocolLevel::try_from(level_byte)?;
    Ok(ProtocolVersion::from(level))
}

/// Determines how many bytes the next complete frame occupies, or `None`
/// if `buf` does not yet hold a full fixed header plus body.
fn next_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    let mut ba = ByteArray::new(&buf[1..]);
    let remaining = VarInt::decode(&mut ba).ok()?;
    let header_len = 1 + remaining.bytes();
    let total = header_len + remaining.value();
    if buf.len() >= total {
        Some(total)
    } else {
        None
    }
}
