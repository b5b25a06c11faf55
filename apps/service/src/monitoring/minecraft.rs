//! Minecraft "Server List Ping" framing.
//!
//! Every packet is `VarInt length | VarInt packet id | payload`. A status
//! query is a handshake (next state = 1), an empty status request, a JSON
//! status response, and finally a ping/pong carrying the same `i64`.

use std::io;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version sent in the handshake. Servers answer status queries for any version.
pub const PROTOCOL_VERSION: i32 = 47;

/// Handshake `next state` asking for the status sequence
const NEXT_STATE_STATUS: i32 = 1;

pub const PACKET_HANDSHAKE: i32 = 0x00;
pub const PACKET_STATUS: i32 = 0x00;
pub const PACKET_PING: i32 = 0x01;

/// Upper bound for an incoming packet; status JSON with a favicon stays well below this
pub const MAX_PACKET_LEN: usize = 1 << 20;

/// Fields of the status JSON worth reporting. Anything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub version: Option<StatusVersion>,
    pub players: Option<StatusPlayers>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusPlayers {
    pub online: i64,
    pub max: i64,
}

impl StatusResponse {
    pub fn summary(&self) -> String {
        let version = self.version.as_ref().map_or("unknown version", |v| v.name.as_str());
        match &self.players {
            Some(players) => format!("{version}, {}/{} players", players.online, players.max),
            None => version.to_string(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
}

pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<i32> {
    let mut result: u32 = 0;
    for position in 0..5 {
        let byte = reader.read_u8().await?;
        result |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(invalid("VarInt is longer than 5 bytes"))
}

/// Decode a VarInt from the front of a slice, returning the value and bytes consumed
pub fn decode_varint(bytes: &[u8]) -> io::Result<(i32, usize)> {
    let mut result: u32 = 0;
    for (position, byte) in bytes.iter().take(5).enumerate() {
        result |= u32::from(byte & 0x7F) << (7 * position);
        if byte & 0x80 == 0 {
            return Ok((result as i32, position + 1));
        }
    }
    Err(invalid("truncated or oversized VarInt"))
}

/// Prefix `body` (packet id + payload) with its length
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(body);
    packet
}

pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::new();
    write_varint(&mut body, PACKET_HANDSHAKE);
    write_varint(&mut body, PROTOCOL_VERSION);
    write_string(&mut body, host);
    body.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut body, NEXT_STATE_STATUS);
    frame(&body)
}

pub fn status_request_packet() -> Vec<u8> {
    let mut body = Vec::new();
    write_varint(&mut body, PACKET_STATUS);
    frame(&body)
}

pub fn ping_packet(payload: i64) -> Vec<u8> {
    let mut body = Vec::new();
    write_varint(&mut body, PACKET_PING);
    body.extend_from_slice(&payload.to_be_bytes());
    frame(&body)
}

/// Read one framed packet, returning its id and the remaining payload
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<(i32, Vec<u8>)> {
    let length = read_varint(reader).await?;
    let length = usize::try_from(length).map_err(|_| invalid("negative packet length"))?;
    if length == 0 || length > MAX_PACKET_LEN {
        return Err(invalid(format!("packet length {length} out of range")));
    }

    let mut packet = vec![0u8; length];
    reader.read_exact(&mut packet).await?;

    let (id, used) = decode_varint(&packet)?;
    packet.drain(..used);
    Ok((id, packet))
}

/// Run the full status sequence over an established stream
pub async fn query_status<S>(stream: &mut S, host: &str, port: u16) -> io::Result<StatusResponse>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = handshake_packet(host, port);
    request.extend_from_slice(&status_request_packet());
    stream.write_all(&request).await?;
    stream.flush().await?;

    let (id, payload) = read_packet(stream).await?;
    if id != PACKET_STATUS {
        return Err(invalid(format!("expected status packet, got id {id:#04x}")));
    }
    let (json_len, used) = decode_varint(&payload)?;
    let json = usize::try_from(json_len)
        .ok()
        .and_then(|len| payload.get(used..used + len))
        .ok_or_else(|| invalid("status string length exceeds packet"))?;
    let status: StatusResponse = serde_json::from_slice(json)
        .map_err(|e| invalid(format!("malformed status JSON: {e}")))?;

    let nonce: i64 = rand::random();
    stream.write_all(&ping_packet(nonce)).await?;
    stream.flush().await?;

    let (id, payload) = read_packet(stream).await?;
    if id != PACKET_PING {
        return Err(invalid(format!("expected pong packet, got id {id:#04x}")));
    }
    let echoed: [u8; 8] = payload
        .as_slice()
        .try_into()
        .map_err(|_| invalid("pong payload is not 8 bytes"))?;
    if i64::from_be_bytes(echoed) != nonce {
        return Err(invalid("pong payload does not match ping"));
    }

    Ok(status)
}
