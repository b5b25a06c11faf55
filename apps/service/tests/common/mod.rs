//! Loopback servers shared by the integration tests.
#![allow(dead_code)]

use std::time::Duration;

use servertracker::monitoring::Protocol;
use servertracker::monitoring::minecraft;
use servertracker::registry::Service;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub fn service(name: &str, port: u16, protocol: Protocol) -> Service {
    Service {
        name: name.into(),
        hostname: "127.0.0.1".into(),
        port,
        protocol,
        recipients: vec!["+15550000001".into()],
        unexpected_content: Vec::new(),
        alert_on_blank_page: false,
    }
}

/// Read one HTTP request (headers plus Content-Length body) and return it as text
pub async fn read_http_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).into_owned();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve `body` with status 200 to every connection, after `delay`
pub async fn spawn_http_server(body: &'static str, delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                read_http_request(&mut stream).await;
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    port
}

/// How the fake Minecraft server behaves
#[derive(Debug, Clone, Copy)]
pub enum GameBehaviour {
    /// Full status + pong exchange
    Healthy,
    /// Replies to the handshake with bytes that are not a status packet
    Garbage,
    /// Sends a valid status but never answers the ping
    NoPong,
}

pub async fn spawn_game_server(behaviour: GameBehaviour) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let Ok((0x00, _handshake)) = minecraft::read_packet(&mut stream).await else {
                    return;
                };
                let Ok((0x00, _request)) = minecraft::read_packet(&mut stream).await else {
                    return;
                };

                if let GameBehaviour::Garbage = behaviour {
                    let _ = stream.write_all(&[0x05, 0x7f, 0x01, 0x02, 0x03, 0x04]).await;
                    return;
                }

                let json = r#"{"version":{"name":"1.20.4","protocol":765},
                    "players":{"max":20,"online":2},"description":{"text":"test"}}"#;
                let mut body = Vec::new();
                minecraft::write_varint(&mut body, minecraft::PACKET_STATUS);
                minecraft::write_string(&mut body, json);
                let _ = stream.write_all(&minecraft::frame(&body)).await;

                let Ok((0x01, payload)) = minecraft::read_packet(&mut stream).await else { return };
                if let GameBehaviour::NoPong = behaviour {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    return;
                }

                let mut pong = Vec::new();
                minecraft::write_varint(&mut pong, minecraft::PACKET_PING);
                pong.extend_from_slice(&payload);
                let _ = stream.write_all(&minecraft::frame(&pong)).await;
            });
        }
    });

    port
}

/// Fake Twilio Messages endpoint. Every request is forwarded on the returned channel;
/// messages to `rejected_number` get Twilio's invalid-number error.
pub async fn spawn_twilio_server(
    rejected_number: Option<&'static str>,
) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { return };
            let tx = tx.clone();
            tokio::spawn(async move {
                let request = read_http_request(&mut stream).await;
                let rejected = rejected_number
                    .map(|n| request.contains(&format!("To={}", n.replace('+', "%2B"))))
                    .unwrap_or(false);
                let _ = tx.send(request);

                let (status, body) = if rejected {
                    ("400 Bad Request", r#"{"code":21211,"message":"Invalid 'To'","status":400}"#)
                } else {
                    ("201 Created", r#"{"sid":"SM123","status":"queued"}"#)
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (base, rx)
}
