//! Error taxonomy for the bridge.
//!
//! [`BridgeError`] is the closed set every transport and handler resolves
//! into; the dispatcher maps it onto the user-visible envelope.
//! [`FrameError`] covers parse-level failures (line framing, OSC packets,
//! chunk envelopes) and folds into `BridgeError::Protocol`.

use thiserror::Error;

/// Parse-level failures in the wire formats.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
    #[error("invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("OSC encode failed: {0}")]
    OscEncode(String),
    #[error("datagram carries no parseable payload")]
    UnparseablePayload,
    #[error("invalid base64 in {context}")]
    InvalidBase64 { context: &'static str },
    #[error("chunk index {index} out of range (total {total})")]
    ChunkIndexOutOfRange { index: usize, total: usize },
    #[error("chunk envelope missing field {0}")]
    ChunkFieldMissing(&'static str),
}

/// The closed error set of the bridge runtime.
///
/// Handlers either return a value or fail with one of these; nothing else
/// crosses the dispatcher boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Validation failed before any I/O.
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// A precondition resource is unavailable.
    #[error("{0} is not ready")]
    NotReady(&'static str),

    /// A bounded wait expired without resolution.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// A transport was lost and could not be re-established.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// The DAW returned `status=error`; the message is forwarded verbatim.
    #[error("DAW error: {0}")]
    DawReported(String),

    /// The OSC bridge rejected an operation because another is in flight.
    #[error("bridge busy after {attempts} attempt(s)")]
    BridgeBusy { attempts: u32 },

    /// The OSC bridge returned `status=error` for any other reason.
    #[error("bridge error: {0}")]
    BridgeReported(String),

    /// Unparseable framing, wrong field types, or failed reassembly.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Chunk reassembly gave up; enumerates what never arrived.
    #[error("chunk reassembly incomplete: {received}/{expected} received, missing {missing:?}")]
    Reassembly {
        missing: Vec<usize>,
        received: usize,
        expected: usize,
    },

    /// Everything else. The caller-facing message stays generic; details
    /// go to the log.
    #[error("internal error")]
    Internal(String),
}

impl BridgeError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The wire label used in error envelopes and dashboard counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotReady(_) => "not_ready",
            Self::Timeout(_) => "timeout",
            Self::Disconnected(_) => "disconnected",
            Self::DawReported(_) => "daw_error",
            Self::BridgeBusy { .. } => "bridge_busy",
            Self::BridgeReported(_) => "bridge_error",
            Self::Protocol(_) | Self::Reassembly { .. } => "protocol_error",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the pipeline may retry a command that failed this way.
    /// Only connection-level failures qualify; everything else is final.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Timeout(_))
    }
}

impl From<FrameError> for BridgeError {
    fn from(e: FrameError) -> Self {
        BridgeError::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(BridgeError::Timeout("read".into()).kind(), "timeout");
        assert_eq!(BridgeError::BridgeBusy { attempts: 3 }.kind(), "bridge_busy");
        assert_eq!(
            BridgeError::Reassembly {
                missing: vec![2],
                received: 3,
                expected: 4
            }
            .kind(),
            "protocol_error"
        );
    }

    #[test]
    fn only_connection_failures_retry() {
        assert!(BridgeError::Disconnected("reset".into()).is_connection_failure());
        assert!(BridgeError::Timeout("read".into()).is_connection_failure());
        assert!(!BridgeError::DawReported("nope".into()).is_connection_failure());
        assert!(!BridgeError::Protocol("bad frame".into()).is_connection_failure());
    }

    #[test]
    fn frame_error_folds_into_protocol() {
        let e: BridgeError = FrameError::LineTooLong { limit: 16 }.into();
        assert_eq!(e.kind(), "protocol_error");
    }
}
