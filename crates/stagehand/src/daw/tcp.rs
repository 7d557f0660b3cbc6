//! TCP command client.
//!
//! One long-lived loopback connection to the DAW scripting endpoint. The
//! socket is exclusively owned behind the writer mutex: whoever holds the
//! guard is the only writer *and* the only reader, so responses pair with
//! requests by construction. Reconnection uses capped exponential backoff;
//! the first successful connect sets the DAW-connected readiness flag.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use stageproto::{
    encode_line,
    line::{decode_response, LineReader},
    BridgeError, DawCommand, DawResponse,
};

use crate::readiness::ReadyFlag;

/// Backoff schedule for reconnect attempts.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
const BACKOFF_MAX: Duration = Duration::from_secs(5);
/// Reconnect attempts per `ensure_session` call before giving up.
const MAX_CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
}

impl TcpConfig {
    pub fn loopback(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
        }
    }
}

/// An established session: split stream plus the incremental line buffer.
pub struct TcpSession {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    lines: LineReader,
}

pub struct TcpClient {
    config: TcpConfig,
    session: Mutex<Option<TcpSession>>,
    ready: ReadyFlag,
}

impl TcpClient {
    pub fn new(config: TcpConfig, ready: ReadyFlag) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            ready,
        }
    }

    /// Acquire the writer mutex. The pipeline holds this across the whole
    /// send/read/post-delay sequence.
    pub async fn lock(&self) -> MutexGuard<'_, Option<TcpSession>> {
        self.session.lock().await
    }

    /// Make sure the guarded slot holds a live session, reconnecting with
    /// backoff if it does not.
    pub async fn ensure_session(
        &self,
        slot: &mut Option<TcpSession>,
    ) -> Result<(), BridgeError> {
        if slot.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let mut backoff = BACKOFF_BASE;
        let mut last_err = String::new();

        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("set_nodelay failed: {}", e);
                    }
                    let (reader, writer) = stream.into_split();
                    *slot = Some(TcpSession {
                        reader,
                        writer,
                        lines: LineReader::default(),
                    });
                    if !self.ready.is_set() {
                        info!("DAW command channel connected at {}", addr);
                    } else {
                        debug!("DAW command channel reconnected at {}", addr);
                    }
                    self.ready.set();
                    return Ok(());
                }
                Err(e) => {
                    last_err = e.to_string();
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        warn!(
                            "connect to DAW at {} failed (attempt {}/{}): {}, retrying in {:?}",
                            addr, attempt, MAX_CONNECT_ATTEMPTS, e, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_MAX);
                    }
                }
            }
        }

        Err(BridgeError::Disconnected(format!(
            "could not reach DAW at {}: {}",
            addr, last_err
        )))
    }

    /// Drop the current session so the next caller reconnects with a
    /// drained buffer.
    pub fn reset(slot: &mut Option<TcpSession>) {
        *slot = None;
    }

    /// Write one command line and read exactly one response line, all
    /// within `timeout`.
    pub async fn exchange(
        slot: &mut Option<TcpSession>,
        command: &DawCommand,
        timeout: Duration,
    ) -> Result<DawResponse, BridgeError> {
        let session = slot
            .as_mut()
            .ok_or_else(|| BridgeError::Disconnected("no session".to_string()))?;

        let frame = encode_line(command)?;

        let outcome = tokio::time::timeout(timeout, async {
            session
                .writer
                .write_all(&frame)
                .await
                .map_err(|e| BridgeError::Disconnected(format!("write failed: {}", e)))?;

            let mut buf = [0u8; 8192];
            loop {
                match session.lines.next_line() {
                    Ok(Some(line)) => return decode_response(&line).map_err(BridgeError::from),
                    Ok(None) => {}
                    Err(e) => return Err(BridgeError::from(e)),
                }
                let n = session
                    .reader
                    .read(&mut buf)
                    .await
                    .map_err(|e| BridgeError::Disconnected(format!("read failed: {}", e)))?;
                if n == 0 {
                    return Err(BridgeError::Disconnected("peer closed connection".into()));
                }
                session.lines.push_bytes(&buf[..n]);
            }
        })
        .await;

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                // Transport-level failures invalidate the session. A
                // protocol error on one line leaves the stream aligned, so
                // the connection stays usable.
                if matches!(e, BridgeError::Disconnected(_)) {
                    Self::reset(slot);
                }
                Err(e)
            }
            Err(_) => {
                // The response may still arrive later and would then pair
                // with the wrong request; start over with a fresh stream.
                Self::reset(slot);
                Err(BridgeError::Timeout(format!(
                    "response to '{}'",
                    command.command_type
                )))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ready.is_set()
    }
}
