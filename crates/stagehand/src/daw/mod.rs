//! DAW-facing transports and the command pipeline.
//!
//! Three channels to the in-DAW scripting endpoints:
//! - [`tcp`]: the reliable command channel (line-delimited JSON, one
//!   command on the wire at a time),
//! - [`realtime`]: best-effort UDP for high-frequency parameter updates,
//! - [`bridge`]: the OSC-framed deep-API bridge (two UDP ports).
//!
//! [`pipeline`] is the only place pacing, idempotency and retry policy
//! live; handlers go through it, never straight to a socket.

pub mod bridge;
pub mod pipeline;
pub mod realtime;
pub mod tcp;
