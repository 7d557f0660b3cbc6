//! OSC framing for the in-DAW bridge device.
//!
//! Outgoing packets are real OSC 1.0 messages built with `rosc`; the final
//! argument is always the caller's request id, by bridge contract.
//!
//! Incoming packets are *not* strict OSC: the device's UDP sender emits the
//! payload as the message's address slot, so the decoder extracts the first
//! NUL-terminated string and runs it through the base64/JSON fallback chain
//! instead of a structural OSC parse.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use serde_json::Value;

use crate::error::FrameError;

/// Typed positional argument for an outgoing bridge request.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl From<OscArg> for OscType {
    fn from(arg: OscArg) -> Self {
        match arg {
            OscArg::Int(i) => OscType::Int(i),
            OscArg::Float(f) => OscType::Float(f),
            OscArg::Str(s) => OscType::String(s),
        }
    }
}

/// Build an outgoing bridge request; `request_id` is appended as the final
/// string argument.
pub fn encode_request(
    address: &str,
    args: Vec<OscArg>,
    request_id: &str,
) -> Result<Vec<u8>, FrameError> {
    let mut osc_args: Vec<OscType> = args.into_iter().map(OscType::from).collect();
    osc_args.push(OscType::String(request_id.to_string()));
    let packet = OscPacket::Message(OscMessage {
        addr: address.to_string(),
        args: osc_args,
    });
    encoder::encode(&packet).map_err(|e| FrameError::OscEncode(e.to_string()))
}

/// Encode a JSON value for transport inside an OSC string argument.
///
/// Compact JSON, URL-safe base64, no padding: the in-DAW runtime mangles
/// `+`, `/` and `=` in symbols.
pub fn encode_json_arg(value: &Value) -> String {
    let compact = serde_json::to_string(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(compact.as_bytes())
}

/// Decode an incoming bridge datagram into JSON.
///
/// The payload is the first NUL-terminated string in the packet. Decode
/// order: URL-safe base64 (the common path), standard base64, then raw
/// JSON for bridges that skip encoding.
pub fn decode_payload(datagram: &[u8]) -> Result<Value, FrameError> {
    let text = first_string(datagram);
    let text = text.trim().trim_end_matches(',').trim();

    if let Some(v) = try_b64_json(text) {
        return Ok(v);
    }
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Ok(v);
    }

    // Last resort: strip every NUL from the whole datagram and retry.
    let cleaned: Vec<u8> = datagram.iter().copied().filter(|&b| b != 0).collect();
    let cleaned = String::from_utf8_lossy(&cleaned);
    let cleaned = cleaned.trim().trim_end_matches(',').trim();
    if let Some(v) = try_b64_json(cleaned) {
        return Ok(v);
    }
    serde_json::from_str::<Value>(cleaned).map_err(|_| FrameError::UnparseablePayload)
}

/// Decode one URL-safe-no-pad base64 piece (chunk `_d` fields).
pub fn decode_b64_piece(piece: &str, context: &'static str) -> Result<Vec<u8>, FrameError> {
    let trimmed = piece.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed.as_bytes())
        .map_err(|_| FrameError::InvalidBase64 { context })
}

fn first_string(datagram: &[u8]) -> String {
    match datagram.iter().position(|&b| b == 0) {
        Some(0) | None => String::from_utf8_lossy(datagram).into_owned(),
        Some(pos) => String::from_utf8_lossy(&datagram[..pos]).into_owned(),
    }
}

fn try_b64_json(text: &str) -> Option<Value> {
    let trimmed = text.trim_end_matches('=');
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(trimmed.as_bytes()) {
        if let Ok(v) = serde_json::from_slice::<Value>(&bytes) {
            return Some(v);
        }
    }
    if let Ok(bytes) = STANDARD.decode(text.as_bytes()) {
        if let Ok(v) = serde_json::from_slice::<Value>(&bytes) {
            return Some(v);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Mimic the device side: payload as OSC address, then the type tag.
    fn fake_bridge_datagram(payload: &str) -> Vec<u8> {
        let mut buf = payload.as_bytes().to_vec();
        buf.push(0);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        buf.extend_from_slice(b",\0\0\0");
        buf
    }

    #[test]
    fn encode_appends_request_id_last() {
        let buf = encode_request(
            "/discover_params",
            vec![OscArg::Int(2), OscArg::Int(0)],
            "ab12cd34",
        )
        .unwrap();
        // Decode with rosc to check structure on the strict-OSC side.
        let (_, packet) = rosc::decoder::decode_udp(&buf).unwrap();
        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, "/discover_params");
                assert_eq!(msg.args.len(), 3);
                assert_eq!(msg.args[2], OscType::String("ab12cd34".into()));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn decodes_urlsafe_b64_payload() {
        let inner = json!({"status": "success", "id": "ab12cd34", "result": {"version": "2.1.0"}});
        let encoded = encode_json_arg(&inner);
        let datagram = fake_bridge_datagram(&encoded);
        let decoded = decode_payload(&datagram).unwrap();
        assert_eq!(decoded, inner);
    }

    #[test]
    fn decodes_raw_json_fallback() {
        let datagram = fake_bridge_datagram(r#"{"status":"error","message":"busy"}"#);
        let decoded = decode_payload(&datagram).unwrap();
        assert_eq!(decoded["message"], "busy");
    }

    #[test]
    fn garbage_is_a_frame_error() {
        let datagram = fake_bridge_datagram("!!not-base64-not-json!!");
        assert!(matches!(
            decode_payload(&datagram),
            Err(FrameError::UnparseablePayload)
        ));
    }

    #[test]
    fn json_arg_roundtrip() {
        let v = json!([{"index": 3, "value": 0.5}, {"index": 7, "value": 1.0}]);
        let encoded = encode_json_arg(&v);
        assert!(!encoded.contains('='));
        let bytes = decode_b64_piece(&encoded, "test").unwrap();
        let back: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, v);
    }
}
