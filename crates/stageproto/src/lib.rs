//! Wire protocol for the stagehand DAW bridge.
//!
//! This crate is the I/O-free leaf of the workspace. It defines:
//! - the DAW command/response types and their newline-delimited JSON framing
//!   ([`command`], [`line`]),
//! - the OSC packet encoding used by the in-DAW bridge device, including the
//!   base64 payload conventions ([`osc`]),
//! - the chunk envelope used to carry large bridge responses over UDP
//!   ([`chunk`]),
//! - command tier / idempotency / timeout classification ([`tier`]),
//! - the closed error taxonomy shared by every transport ([`error`]).
//!
//! Everything here is testable without a socket; the daemon crate drives it.

pub mod chunk;
pub mod command;
pub mod error;
pub mod line;
pub mod osc;
pub mod tier;

pub use chunk::{split_chunks, ChunkEnvelope, Reassembly};
pub use command::{DawCommand, DawResponse, Status};
pub use error::{BridgeError, FrameError};
pub use line::{encode_line, LineReader, MAX_LINE_BYTES};
pub use osc::{decode_payload, encode_json_arg, encode_request, OscArg};
pub use tier::{classify, is_idempotent, timeout_for, CommandTier};
