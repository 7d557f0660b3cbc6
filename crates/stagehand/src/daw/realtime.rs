//! UDP realtime sender.
//!
//! Fire-and-forget datagrams for high-frequency parameter updates. No
//! reader loop, no retries, no acknowledgement; out-of-order delivery is
//! the caller's problem. Rate limiting, if any, also belongs to callers.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::trace;

use stageproto::{BridgeError, DawCommand};

/// Stay well under the loopback MTU so a datagram never fragments.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

pub struct RealtimeSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl RealtimeSender {
    /// Bind an ephemeral loopback port aimed at the DAW's realtime port.
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        Ok(Self {
            socket,
            target: SocketAddr::from(([127, 0, 0, 1], port)),
        })
    }

    /// Send one minimal `{type, params}` datagram and return immediately.
    pub async fn send(&self, command: &DawCommand) -> Result<(), BridgeError> {
        let payload = serde_json::to_vec(command)
            .map_err(|e| BridgeError::Internal(format!("realtime encode: {}", e)))?;
        if payload.len() > MAX_DATAGRAM_BYTES {
            return Err(BridgeError::invalid_input(
                "params",
                format!(
                    "realtime payload is {} bytes, cap is {}",
                    payload.len(),
                    MAX_DATAGRAM_BYTES
                ),
            ));
        }
        self.socket
            .send_to(&payload, self.target)
            .await
            .map_err(|e| BridgeError::Disconnected(format!("realtime send: {}", e)))?;
        trace!(command = %command.command_type, bytes = payload.len(), "realtime datagram sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_one_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let sender = RealtimeSender::bind(port).await.unwrap();

        let cmd = DawCommand::new("set_device_parameter")
            .with_param("track_index", 0)
            .with_param("device_index", 1)
            .with_param("value", 0.42);
        sender.send(&cmd).await.unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(v["type"], "set_device_parameter");
        assert_eq!(v["params"]["value"], 0.42);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_without_sending() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let sender = RealtimeSender::bind(port).await.unwrap();

        let cmd = DawCommand::new("set_device_parameter").with_param("blob", "x".repeat(4000));
        match sender.send(&cmd).await {
            Err(BridgeError::InvalidInput { .. }) => {}
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }
}
