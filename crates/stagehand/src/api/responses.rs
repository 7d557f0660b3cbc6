//! Uniform response envelopes.
//!
//! Every tool call resolves to one of two JSON shapes:
//! success `{"status":"ok","message",...,"data"?}` or error
//! `{"status":"error","kind","message","details"?}`. Handlers never format
//! errors themselves; the dispatcher wraps them here with the tool's
//! registered error prefix.

use serde_json::{json, Value};

use stageproto::BridgeError;

pub fn ok(message: impl Into<String>, data: Option<Value>) -> Value {
    let mut envelope = json!({
        "status": "ok",
        "message": message.into(),
    });
    if let Some(data) = data {
        envelope["data"] = data;
    }
    envelope
}

pub fn error(prefix: &str, err: &BridgeError) -> Value {
    // Internal details stay in the log; the caller gets a generic message.
    let message = match err {
        BridgeError::Internal(_) => format!("{}: internal error", prefix),
        other => format!("{}: {}", prefix, other),
    };
    let mut envelope = json!({
        "status": "error",
        "kind": err.kind(),
        "message": message,
    });
    if let Some(details) = details_for(err) {
        envelope["details"] = details;
    }
    envelope
}

fn details_for(err: &BridgeError) -> Option<Value> {
    match err {
        BridgeError::InvalidInput { field, .. } => Some(json!({ "field": field })),
        BridgeError::BridgeBusy { attempts } => Some(json!({ "attempts": attempts })),
        BridgeError::Reassembly {
            missing,
            received,
            expected,
        } => Some(json!({
            "missing_indices": missing,
            "received": received,
            "expected": expected,
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_shape() {
        let v = ok("tempo set to 128 BPM", Some(json!({"bpm": 128})));
        assert_eq!(v["status"], "ok");
        assert_eq!(v["data"]["bpm"], 128);
    }

    #[test]
    fn success_without_data_omits_field() {
        let v = ok("done", None);
        assert!(v.get("data").is_none());
    }

    #[test]
    fn error_shape_carries_kind_and_prefix() {
        let v = error(
            "Failed to set tempo",
            &BridgeError::DawReported("tempo out of range".into()),
        );
        assert_eq!(v["status"], "error");
        assert_eq!(v["kind"], "daw_error");
        assert!(v["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to set tempo:"));
    }

    #[test]
    fn internal_errors_stay_generic() {
        let v = error(
            "Failed to list tracks",
            &BridgeError::Internal("panic: index out of bounds".into()),
        );
        assert_eq!(v["message"], "Failed to list tracks: internal error");
        assert!(!v.to_string().contains("index out of bounds"));
    }

    #[test]
    fn reassembly_details_enumerate_missing() {
        let v = error(
            "Discovery failed",
            &BridgeError::Reassembly {
                missing: vec![1, 4],
                received: 3,
                expected: 5,
            },
        );
        assert_eq!(v["details"]["missing_indices"], json!([1, 4]));
        assert_eq!(v["kind"], "protocol_error");
    }

    #[test]
    fn busy_details_carry_attempts() {
        let v = error("Batch failed", &BridgeError::BridgeBusy { attempts: 3 });
        assert_eq!(v["details"]["attempts"], 3);
    }
}
