//! DAW command and response types.
//!
//! A command is `{"type": ..., "params": {...}}` and a response is
//! `{"status": "success"|"error", "result"?, "message"?}`, one JSON object
//! per line on the TCP channel. The bridge treats `type` as an opaque
//! classifier except for the tier/idempotency tables in [`crate::tier`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One outgoing DAW command. Created by a tool handler, consumed exactly
/// once by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DawCommand {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl DawCommand {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            params: Map::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }
}

/// Response status as reported by the DAW scripting endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// One DAW response line. Non-success responses carry a human-readable
/// `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DawResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DawResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: Status::Success,
            result: Some(result),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// The error message, or a placeholder when the DAW sent none.
    pub fn err_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "DAW reported an error without a message".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_serializes_with_type_key() {
        let cmd = DawCommand::new("set_tempo").with_param("tempo", 128.0);
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["type"], "set_tempo");
        assert_eq!(v["params"]["tempo"], 128.0);
    }

    #[test]
    fn command_without_params_omits_field() {
        let cmd = DawCommand::new("get_session_info");
        let s = serde_json::to_string(&cmd).unwrap();
        assert!(!s.contains("params"));
        let back: DawCommand = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn response_roundtrip() {
        let resp = DawResponse::success(json!({"track_index": 3}));
        let s = serde_json::to_string(&resp).unwrap();
        let back: DawResponse = serde_json::from_str(&s).unwrap();
        assert!(back.is_success());
        assert_eq!(back.result.unwrap()["track_index"], 3);
    }

    #[test]
    fn error_status_parses() {
        let back: DawResponse =
            serde_json::from_str(r#"{"status":"error","message":"unknown device"}"#).unwrap();
        assert!(!back.is_success());
        assert_eq!(back.err_message(), "unknown device");
    }
}
