//! Shared test doubles: a scripted DAW TCP endpoint and a scripted OSC
//! bridge device, both on real loopback sockets.
//!
//! Each integration suite compiles this module independently and uses a
//! different subset of it.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Mutex;

/// What the fake DAW does with one received command.
pub enum FakeAction {
    Respond(Value),
    DropConnection,
    Silent,
}

pub type Script = Arc<dyn Fn(usize, &Value) -> FakeAction + Send + Sync>;

/// A scripted line-delimited JSON TCP endpoint. Accepts any number of
/// connections so reconnect behavior is observable; the request counter
/// spans connections.
pub struct FakeDaw {
    pub port: u16,
    log: Arc<Mutex<Vec<(Instant, Value)>>>,
}

impl FakeDaw {
    pub async fn spawn(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let log: Arc<Mutex<Vec<(Instant, Value)>>> = Arc::new(Mutex::new(Vec::new()));

        let task_log = Arc::clone(&log);
        tokio::spawn(async move {
            let counter = AtomicUsize::new(0);
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                    let Ok(command) = serde_json::from_str::<Value>(line.trim()) else {
                        break;
                    };
                    let index = counter.fetch_add(1, Ordering::SeqCst);
                    task_log.lock().await.push((Instant::now(), command.clone()));
                    match script(index, &command) {
                        FakeAction::Respond(resp) => {
                            let mut out = serde_json::to_vec(&resp).unwrap();
                            out.push(b'\n');
                            if write_half.write_all(&out).await.is_err() {
                                break;
                            }
                        }
                        FakeAction::DropConnection => break,
                        FakeAction::Silent => {}
                    }
                }
            }
        });

        Self { port, log }
    }

    pub async fn request_count(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<Value> {
        self.log.lock().await.iter().map(|(_, v)| v.clone()).collect()
    }

    pub async fn receive_times(&self) -> Vec<Instant> {
        self.log.lock().await.iter().map(|(t, _)| *t).collect()
    }
}

/// Build a datagram the way the in-DAW device's UDP sender does: the
/// payload string sits in the OSC address slot, NUL-padded, followed by an
/// empty type tag.
pub fn device_datagram(payload: &str) -> Vec<u8> {
    let mut buf = payload.as_bytes().to_vec();
    buf.push(0);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
    buf.extend_from_slice(b",\0\0\0");
    buf
}

/// Encode a JSON response body as the device would.
pub fn encode_device_json(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string().as_bytes())
}

/// Extract the trailing request-id string from an incoming OSC request.
pub fn request_id_of(datagram: &[u8]) -> Option<(String, String)> {
    let (_, packet) = rosc::decoder::decode_udp(datagram).ok()?;
    match packet {
        rosc::OscPacket::Message(msg) => {
            let id = msg.args.iter().rev().find_map(|a| match a {
                rosc::OscType::String(s) => Some(s.clone()),
                _ => None,
            })?;
            Some((msg.addr, id))
        }
        _ => None,
    }
}

/// A scripted OSC bridge device: receives requests on its own socket and
/// replies to the client's receive port.
pub struct FakeBridge {
    pub device_port: u16,
    pub client_recv_port: u16,
}

pub type BridgeScript =
    Arc<dyn Fn(usize, &str, &str) -> Vec<Value> + Send + Sync>;

impl FakeBridge {
    /// `script(request_index, address, request_id)` returns the response
    /// bodies to send, each as its own datagram (chunk envelopes included).
    pub async fn spawn(script: BridgeScript) -> Self {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_port = device.local_addr().unwrap().port();

        // Reserve a port for the client side, then free it for the client
        // to bind.
        let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_recv_port = probe.local_addr().unwrap().port();
        drop(probe);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65_535];
            let mut index = 0usize;
            loop {
                let Ok((n, _from)) = device.recv_from(&mut buf).await else {
                    break;
                };
                let Some((addr, request_id)) = request_id_of(&buf[..n]) else {
                    continue;
                };
                let responses = script(index, &addr, &request_id);
                index += 1;
                for body in responses {
                    let datagram = device_datagram(&encode_device_json(&body));
                    let _ = device
                        .send_to(&datagram, ("127.0.0.1", client_recv_port))
                        .await;
                    // Small gap so chunk ordering is realistic but not
                    // guaranteed in-order delivery.
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                }
            }
        });

        Self {
            device_port,
            client_recv_port,
        }
    }
}
