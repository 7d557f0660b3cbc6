//! The command pipeline - the single waypoint between handlers and the
//! TCP transport.
//!
//! For each command: classify tier and idempotency, resolve the timeout,
//! take the writer mutex, exchange, retry once on a connection failure if
//! (and only if) the command is idempotent, apply the tier post-delay
//! while still holding the mutex, release. Handlers never see the socket
//! and never reason about pacing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use stageproto::{classify, is_idempotent, timeout_for, BridgeError, DawCommand};

use crate::daw::tcp::TcpClient;

#[derive(Clone)]
pub struct CommandPipeline {
    tcp: Arc<TcpClient>,
}

impl CommandPipeline {
    pub fn new(tcp: Arc<TcpClient>) -> Self {
        Self { tcp }
    }

    pub fn tcp(&self) -> &Arc<TcpClient> {
        &self.tcp
    }

    /// Execute with the classified per-command timeout.
    pub async fn execute(&self, command: DawCommand) -> Result<Value, BridgeError> {
        self.execute_with_timeout(command, None).await
    }

    /// Execute; an explicit caller timeout takes precedence over the
    /// classification table.
    pub async fn execute_with_timeout(
        &self,
        command: DawCommand,
        timeout: Option<Duration>,
    ) -> Result<Value, BridgeError> {
        let tier = classify(&command.command_type);
        let idempotent = is_idempotent(&command.command_type);
        let timeout = timeout.unwrap_or_else(|| timeout_for(&command.command_type));

        let mut slot = self.tcp.lock().await;

        self.tcp.ensure_session(&mut slot).await?;
        let first = TcpClient::exchange(&mut slot, &command, timeout).await;

        // Idempotent commands get exactly one more attempt after a
        // connection-level failure; anything non-idempotent fails as-is.
        let outcome = match first {
            Err(e) if idempotent && e.is_connection_failure() => {
                warn!(
                    command = %command.command_type,
                    error = %e,
                    "connection failure on idempotent command, reconnecting for one retry"
                );
                TcpClient::reset(&mut slot);
                self.tcp.ensure_session(&mut slot).await?;
                TcpClient::exchange(&mut slot, &command, timeout).await
            }
            other => other,
        };

        let result = match outcome {
            Ok(response) if response.is_success() => {
                Ok(response.result.unwrap_or(Value::Null))
            }
            Ok(response) => Err(BridgeError::DawReported(response.err_message())),
            Err(e) => Err(e),
        };

        if result.is_ok() {
            let delay = tier.post_delay();
            if !delay.is_zero() {
                debug!(
                    command = %command.command_type,
                    ?delay,
                    "tier post-delay before releasing the writer"
                );
                tokio::time::sleep(delay).await;
            }
        }

        drop(slot);
        result
    }
}
