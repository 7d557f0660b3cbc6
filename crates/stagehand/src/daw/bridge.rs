//! OSC bridge client.
//!
//! Request/response over two UDP ports to the in-DAW scripting device.
//! Every outgoing packet carries a fresh short request id as its final
//! argument; responses are matched on the `id` field of the decoded JSON
//! and stale arrivals from earlier timed-out calls are discarded. Large
//! responses arrive as chunk envelopes and are reassembled per request.
//!
//! The device handles one discovery and one batch at a time. The client
//! does not enforce that: requests are forwarded as issued and the
//! device's own "busy" rejections map to `BridgeBusy`. Known-queueable
//! commands go through [`OscBridge::request_queued`], which retries busy
//! on a short ladder. Receives on the shared socket are serialized behind
//! a socket guard (waiting counts against the caller's deadline); the
//! client never multiplexes by request id across overlapping operations.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use stageproto::{
    chunk::{ChunkEnvelope, Reassembly},
    encode_json_arg, encode_request,
    osc::decode_payload,
    BridgeError, OscArg,
};

/// Ping results are cached this long; lookups within the TTL skip the wire.
const PING_TTL: Duration = Duration::from_secs(5);
/// Datagram receive buffer, matching the device's maximum packet size.
const RECV_BUF_BYTES: usize = 65_535;
/// Busy retry ladder for queueable commands.
const BUSY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub send_port: u16,
    pub recv_port: u16,
}

impl BridgeConfig {
    pub fn loopback(send_port: u16, recv_port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            send_port,
            recv_port,
        }
    }
}

/// One bridge request: OSC address, typed arguments, dynamic timeout.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    pub address: String,
    pub args: Vec<OscArg>,
    pub timeout: Duration,
}

impl BridgeRequest {
    pub fn ping() -> Self {
        Self {
            address: "/ping".into(),
            args: vec![],
            timeout: Duration::from_secs(5),
        }
    }

    /// Chunked discovery runs inside the device; give it room.
    pub fn discover_params(track_index: i32, device_index: i32) -> Self {
        Self {
            address: "/discover_params".into(),
            args: vec![OscArg::Int(track_index), OscArg::Int(device_index)],
            timeout: Duration::from_secs(15),
        }
    }

    pub fn get_hidden_params(track_index: i32, device_index: i32) -> Self {
        Self {
            address: "/get_hidden_params".into(),
            args: vec![OscArg::Int(track_index), OscArg::Int(device_index)],
            timeout: Duration::from_secs(15),
        }
    }

    pub fn set_hidden_param(
        track_index: i32,
        device_index: i32,
        parameter_index: i32,
        value: f32,
    ) -> Self {
        Self {
            address: "/set_hidden_param".into(),
            args: vec![
                OscArg::Int(track_index),
                OscArg::Int(device_index),
                OscArg::Int(parameter_index),
                OscArg::Float(value),
            ],
            timeout: Duration::from_secs(5),
        }
    }

    /// Batch timeout scales with the declared input size: ~150 ms per
    /// parameter, floor 10 s.
    pub fn batch_set_hidden_params(
        track_index: i32,
        device_index: i32,
        parameters: &Value,
    ) -> Self {
        let count = parameters.as_array().map(Vec::len).unwrap_or(0);
        let timeout = Duration::from_millis((count as u64 * 150).max(10_000));
        Self {
            address: "/batch_set_hidden_params".into(),
            args: vec![
                OscArg::Int(track_index),
                OscArg::Int(device_index),
                OscArg::Str(encode_json_arg(parameters)),
            ],
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

struct BridgeSockets {
    send: UdpSocket,
    recv: UdpSocket,
    target: SocketAddr,
}

struct PingCache {
    at: Instant,
    version: String,
}

pub struct OscBridge {
    config: BridgeConfig,
    /// Lazily created socket pair, shared by every in-flight call.
    sockets: Mutex<Option<Arc<BridgeSockets>>>,
    /// One receiver on the shared socket at a time. Sends are never
    /// gated: the device decides for itself whether it is busy.
    recv_lock: Mutex<()>,
    ping_cache: StdMutex<Option<PingCache>>,
}

impl OscBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            sockets: Mutex::new(None),
            recv_lock: Mutex::new(()),
            ping_cache: StdMutex::new(None),
        }
    }

    /// Whether the bridge answered a ping within the cache TTL.
    pub fn is_connected(&self) -> bool {
        self.cached_version().is_some()
    }

    /// The most recently pinged bridge version, if still within TTL.
    pub fn cached_version(&self) -> Option<String> {
        let cache = self.ping_cache.lock().expect("ping cache poisoned");
        cache
            .as_ref()
            .filter(|c| c.at.elapsed() < PING_TTL)
            .map(|c| c.version.clone())
    }

    /// Ping the bridge, returning its declared version. Served from the
    /// cache when fresh.
    pub async fn ping(&self) -> Result<String, BridgeError> {
        if let Some(version) = self.cached_version() {
            return Ok(version);
        }
        let result = self.request(&BridgeRequest::ping()).await?;
        let version = result
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        *self.ping_cache.lock().expect("ping cache poisoned") = Some(PingCache {
            at: Instant::now(),
            version: version.clone(),
        });
        Ok(version)
    }

    /// Send one request and wait for its (possibly chunked) response.
    ///
    /// The request goes on the wire immediately even when another call is
    /// in flight; overlap on a long operation is the device's to reject.
    pub async fn request(&self, req: &BridgeRequest) -> Result<Value, BridgeError> {
        let sockets = self.ensure_sockets().await?;

        let request_id = short_id();
        let packet = encode_request(&req.address, req.args.clone(), &request_id)?;
        let deadline = Instant::now() + req.timeout;

        // Stale data from a previous timed-out call must not be matched
        // against this request. Skip the drain when another call is
        // mid-receive: that receiver discards mismatched ids itself.
        if let Ok(_draining) = self.recv_lock.try_lock() {
            drain_socket(&sockets.recv);
        }

        if let Err(e) = sockets.send.send_to(&packet, sockets.target).await {
            self.reset_sockets().await;
            return Err(BridgeError::Disconnected(format!("bridge send: {}", e)));
        }

        // Receives are serialized on the shared socket; waiting for the
        // slot counts against this call's own deadline.
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(guard) = tokio::time::timeout(remaining, self.recv_lock.lock()).await else {
            return Err(BridgeError::Timeout(format!(
                "bridge response to {}",
                req.address
            )));
        };
        let outcome = receive_matching(&sockets.recv, &req.address, &request_id, deadline).await;
        drop(guard);

        if matches!(outcome, Err(BridgeError::Disconnected(_))) {
            self.reset_sockets().await;
        }
        interpret(outcome?)
    }

    /// Busy-retry wrapper for commands the device can queue: three sends
    /// with 0.5 s and 1.0 s pauses, then `BridgeBusy` with the attempt
    /// count.
    pub async fn request_queued(&self, req: &BridgeRequest) -> Result<Value, BridgeError> {
        for attempt in 1..=BUSY_ATTEMPTS {
            match self.request(req).await {
                Err(BridgeError::BridgeBusy { .. }) if attempt < BUSY_ATTEMPTS => {
                    let delay = Duration::from_millis(500 * attempt as u64);
                    warn!(
                        address = %req.address,
                        attempt,
                        ?delay,
                        "bridge busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(BridgeError::BridgeBusy { .. }) => {
                    return Err(BridgeError::BridgeBusy {
                        attempts: BUSY_ATTEMPTS,
                    })
                }
                other => return other,
            }
        }
        unreachable!("busy retry loop always returns")
    }

    async fn ensure_sockets(&self) -> Result<Arc<BridgeSockets>, BridgeError> {
        let mut slot = self.sockets.lock().await;
        if let Some(sockets) = slot.as_ref() {
            return Ok(Arc::clone(sockets));
        }
        let recv = UdpSocket::bind((self.config.host.as_str(), self.config.recv_port))
            .await
            .map_err(|e| {
                BridgeError::Disconnected(format!(
                    "cannot bind bridge receive port {}: {}",
                    self.config.recv_port, e
                ))
            })?;
        let send = UdpSocket::bind((self.config.host.as_str(), 0))
            .await
            .map_err(|e| BridgeError::Disconnected(format!("bridge send socket: {}", e)))?;
        let target = SocketAddr::new(
            self.config
                .host
                .parse()
                .map_err(|e| BridgeError::Internal(format!("bridge host: {}", e)))?,
            self.config.send_port,
        );
        let sockets = Arc::new(BridgeSockets { send, recv, target });
        *slot = Some(Arc::clone(&sockets));
        debug!(
            send_port = self.config.send_port,
            recv_port = self.config.recv_port,
            "bridge UDP sockets ready"
        );
        Ok(sockets)
    }

    /// Drop the shared sockets so the next call rebuilds them.
    async fn reset_sockets(&self) {
        *self.sockets.lock().await = None;
    }
}

/// Receive datagrams until one decodes to a response matching
/// `request_id`, reassembling chunk envelopes along the way.
async fn receive_matching(
    recv: &UdpSocket,
    address: &str,
    request_id: &str,
    deadline: Instant,
) -> Result<Value, BridgeError> {
    let mut buf = vec![0u8; RECV_BUF_BYTES];
    loop {
        let datagram = recv_until(recv, &mut buf, deadline, address).await?;
        let decoded = match decode_payload(&datagram) {
            Ok(v) => v,
            Err(e) => {
                warn!("undecodable bridge datagram: {}", e);
                continue;
            }
        };

        let value = match ChunkEnvelope::from_value(&decoded) {
            Some(Ok(first)) => reassemble(recv, &mut buf, first, address).await?,
            Some(Err(e)) => return Err(e.into()),
            None => decoded,
        };

        match value.get("id").and_then(Value::as_str) {
            Some(id) if id != request_id => {
                warn!(
                    expected = request_id,
                    got = id,
                    "discarding stale bridge response"
                );
                continue;
            }
            _ => return Ok(value),
        }
    }
}

/// Collect the remaining chunks of a response that started with `first`.
///
/// The chunk window gets its own deadline scaled by the declared total;
/// non-chunk packets arriving mid-reassembly are ignored with a warning.
async fn reassemble(
    recv: &UdpSocket,
    buf: &mut [u8],
    first: ChunkEnvelope,
    address: &str,
) -> Result<Value, BridgeError> {
    let total = first.total;
    debug!(total, address, "chunked bridge response, reassembling");
    let mut re = Reassembly::new(first)?;

    let window = Duration::from_millis(total as u64 * 100 + 5_000);
    let deadline = Instant::now() + window;

    while !re.is_complete() {
        let datagram = match recv_until(recv, buf, deadline, address).await {
            Ok(d) => d,
            Err(BridgeError::Timeout(_)) => return Err(re.to_failure()),
            Err(e) => return Err(e),
        };
        match decode_payload(&datagram) {
            Ok(v) => match ChunkEnvelope::from_value(&v) {
                Some(Ok(env)) => re.insert(env)?,
                Some(Err(e)) => return Err(e.into()),
                None => warn!("non-chunk packet during reassembly, ignoring"),
            },
            Err(e) => warn!("undecodable packet during reassembly: {}", e),
        }
    }

    let assembled = re.assemble()?;
    debug!(address, "chunked bridge response reassembled");
    Ok(assembled)
}

async fn recv_until(
    recv: &UdpSocket,
    buf: &mut [u8],
    deadline: Instant,
    address: &str,
) -> Result<Vec<u8>, BridgeError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(BridgeError::Timeout(format!("bridge response to {}", address)));
    }
    match tokio::time::timeout(remaining, recv.recv_from(buf)).await {
        Ok(Ok((n, _addr))) => Ok(buf[..n].to_vec()),
        Ok(Err(e)) => Err(BridgeError::Disconnected(format!("bridge recv: {}", e))),
        Err(_) => Err(BridgeError::Timeout(format!(
            "bridge response to {}",
            address
        ))),
    }
}

/// Interpret a decoded bridge response body.
fn interpret(value: Value) -> Result<Value, BridgeError> {
    let status = value.get("status").and_then(Value::as_str);
    match status {
        Some("success") => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        Some("error") => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("bridge reported an error without a message")
                .to_string();
            if message.to_lowercase().contains("busy") {
                Err(BridgeError::BridgeBusy { attempts: 1 })
            } else {
                Err(BridgeError::BridgeReported(message))
            }
        }
        _ => Err(BridgeError::Protocol(format!(
            "bridge response without a status field: {}",
            value
        ))),
    }
}

/// Throw away anything sitting in the receive queue.
fn drain_socket(recv: &UdpSocket) {
    let mut scratch = [0u8; RECV_BUF_BYTES];
    for _ in 0..100 {
        match recv.try_recv_from(&mut scratch) {
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn busy_message_maps_to_bridge_busy() {
        let v = json!({"status": "error", "message": "Bridge busy: discovery in progress"});
        assert!(matches!(
            interpret(v),
            Err(BridgeError::BridgeBusy { .. })
        ));
    }

    #[test]
    fn error_message_is_forwarded() {
        let v = json!({"status": "error", "message": "no such device"});
        match interpret(v) {
            Err(BridgeError::BridgeReported(m)) => assert_eq!(m, "no such device"),
            other => panic!("expected BridgeReported, got {:?}", other),
        }
    }

    #[test]
    fn success_unwraps_result() {
        let v = json!({"status": "success", "id": "abc", "result": {"version": "2.1.0"}});
        assert_eq!(interpret(v).unwrap()["version"], "2.1.0");
    }

    #[test]
    fn missing_status_is_protocol_error() {
        assert!(matches!(
            interpret(json!({"id": "abc"})),
            Err(BridgeError::Protocol(_))
        ));
    }

    #[test]
    fn batch_timeout_scales_with_size() {
        let few = BridgeRequest::batch_set_hidden_params(0, 0, &json!([{"index":0,"value":0.5}]));
        assert_eq!(few.timeout, Duration::from_secs(10));
        let params: Vec<Value> =
            (0..93).map(|i| json!({"index": i, "value": 0.5})).collect();
        let many = BridgeRequest::batch_set_hidden_params(0, 0, &Value::Array(params));
        assert_eq!(many.timeout, Duration::from_millis(93 * 150));
    }

    #[test]
    fn short_ids_are_eight_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
