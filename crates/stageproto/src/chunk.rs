//! Chunk envelope for large bridge responses.
//!
//! Responses bigger than one safe datagram arrive as a sequence of
//! envelopes `{"_c": index, "_t": total, "_d": piece}` where each `_d` is
//! an independently URL-safe-base64-encoded fragment of the original JSON
//! text. Reassembly is per-request state owned by the caller; there is no
//! shared table of in-flight assemblies.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{BridgeError, FrameError};
use crate::osc::decode_b64_piece;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Default fragment size, matching the device's ~1500-char split threshold.
pub const DEFAULT_PIECE_BYTES: usize = 1500;

/// A parsed chunk envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEnvelope {
    pub index: usize,
    pub total: usize,
    pub piece: String,
}

impl ChunkEnvelope {
    /// Try to read a decoded datagram as a chunk envelope. `None` means the
    /// value is an ordinary (unchunked) response.
    pub fn from_value(value: &Value) -> Option<Result<Self, FrameError>> {
        let obj = value.as_object()?;
        if !obj.contains_key("_c") || !obj.contains_key("_t") {
            return None;
        }
        let index = match obj.get("_c").and_then(Value::as_u64) {
            Some(i) => i as usize,
            None => return Some(Err(FrameError::ChunkFieldMissing("_c"))),
        };
        let total = match obj.get("_t").and_then(Value::as_u64) {
            Some(t) => t as usize,
            None => return Some(Err(FrameError::ChunkFieldMissing("_t"))),
        };
        let piece = match obj.get("_d").and_then(Value::as_str) {
            Some(d) => d.to_string(),
            None => return Some(Err(FrameError::ChunkFieldMissing("_d"))),
        };
        Some(Ok(Self {
            index,
            total,
            piece,
        }))
    }
}

/// Split a JSON payload into chunk envelopes of at most `piece_bytes` of
/// source text each. Used by test harnesses that play the device side.
pub fn split_chunks(payload: &Value, piece_bytes: usize) -> Vec<Value> {
    let text = serde_json::to_string(payload).unwrap_or_default();
    let bytes = text.as_bytes();
    let piece_bytes = piece_bytes.max(1);
    let total = bytes.len().div_ceil(piece_bytes).max(1);
    (0..total)
        .map(|i| {
            let start = i * piece_bytes;
            let end = (start + piece_bytes).min(bytes.len());
            json!({
                "_c": i,
                "_t": total,
                "_d": URL_SAFE_NO_PAD.encode(&bytes[start..end]),
            })
        })
        .collect()
}

/// Per-request reassembly buffer.
#[derive(Debug)]
pub struct Reassembly {
    total: usize,
    pieces: BTreeMap<usize, String>,
}

impl Reassembly {
    /// Start a reassembly from the first envelope seen for a request.
    pub fn new(first: ChunkEnvelope) -> Result<Self, FrameError> {
        let mut r = Self {
            total: first.total.max(1),
            pieces: BTreeMap::new(),
        };
        r.insert(first)?;
        Ok(r)
    }

    /// Record one envelope. Duplicate indices are ignored with a log line.
    pub fn insert(&mut self, env: ChunkEnvelope) -> Result<(), FrameError> {
        if env.index >= self.total {
            return Err(FrameError::ChunkIndexOutOfRange {
                index: env.index,
                total: self.total,
            });
        }
        if self.pieces.contains_key(&env.index) {
            warn!(index = env.index, "duplicate chunk ignored");
            return Ok(());
        }
        self.pieces.insert(env.index, env.piece);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.pieces.len() >= self.total
    }

    pub fn received(&self) -> usize {
        self.pieces.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The indices that have not arrived yet, for timeout diagnostics.
    pub fn missing_indices(&self) -> Vec<usize> {
        (0..self.total)
            .filter(|i| !self.pieces.contains_key(i))
            .collect()
    }

    /// Produce the reassembly-failure error for the current state.
    pub fn to_failure(&self) -> BridgeError {
        BridgeError::Reassembly {
            missing: self.missing_indices(),
            received: self.received(),
            expected: self.total,
        }
    }

    /// Decode each piece, concatenate in index order, parse the JSON.
    pub fn assemble(self) -> Result<Value, BridgeError> {
        if !self.is_complete() {
            return Err(self.to_failure());
        }
        let mut text = Vec::new();
        for (_, piece) in self.pieces {
            text.extend(decode_b64_piece(&piece, "chunk piece")?);
        }
        serde_json::from_slice(&text)
            .map_err(|e| BridgeError::Protocol(format!("reassembled JSON invalid: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_of_parameters(n: usize) -> Value {
        let params: Vec<Value> = (0..n)
            .map(|i| json!({"index": i, "name": format!("Osc {} Gain", i), "value": 0.5}))
            .collect();
        json!({"status": "success", "id": "ab12cd34", "result": {"parameters": params}})
    }

    #[test]
    fn split_then_assemble_is_identity() {
        let payload = payload_of_parameters(93);
        let chunks = split_chunks(&payload, 256);
        assert!(chunks.len() >= 2);

        let mut iter = chunks.into_iter();
        let first = ChunkEnvelope::from_value(&iter.next().unwrap())
            .unwrap()
            .unwrap();
        let mut re = Reassembly::new(first).unwrap();
        for c in iter {
            re.insert(ChunkEnvelope::from_value(&c).unwrap().unwrap())
                .unwrap();
        }
        assert!(re.is_complete());
        assert_eq!(re.assemble().unwrap(), payload);
    }

    #[test]
    fn identity_for_any_piece_size() {
        let payload = json!({"k": "v", "n": [1, 2, 3]});
        for piece in [1, 7, 64, 10_000] {
            let chunks = split_chunks(&payload, piece);
            let mut iter = chunks.into_iter();
            let mut re = Reassembly::new(
                ChunkEnvelope::from_value(&iter.next().unwrap())
                    .unwrap()
                    .unwrap(),
            )
            .unwrap();
            for c in iter {
                re.insert(ChunkEnvelope::from_value(&c).unwrap().unwrap())
                    .unwrap();
            }
            assert_eq!(re.assemble().unwrap(), payload, "piece={}", piece);
        }
    }

    #[test]
    fn missing_indices_are_enumerated() {
        let payload = payload_of_parameters(50);
        let chunks = split_chunks(&payload, 128);
        assert!(chunks.len() > 3);

        let first = ChunkEnvelope::from_value(&chunks[0]).unwrap().unwrap();
        let mut re = Reassembly::new(first).unwrap();
        // Deliver everything except index 2.
        for c in chunks.iter().skip(1) {
            let env = ChunkEnvelope::from_value(c).unwrap().unwrap();
            if env.index != 2 {
                re.insert(env).unwrap();
            }
        }
        assert!(!re.is_complete());
        assert_eq!(re.missing_indices(), vec![2]);
        match re.assemble() {
            Err(BridgeError::Reassembly {
                missing, expected, ..
            }) => {
                assert_eq!(missing, vec![2]);
                assert_eq!(expected, chunks.len());
            }
            other => panic!("expected reassembly failure, got {:?}", other),
        }
    }

    #[test]
    fn duplicates_ignored_out_of_range_rejected() {
        let chunks = split_chunks(&json!({"a": 1}), 2);
        let first = ChunkEnvelope::from_value(&chunks[0]).unwrap().unwrap();
        let total = first.total;
        let mut re = Reassembly::new(first.clone()).unwrap();
        re.insert(first).unwrap(); // duplicate: no error, no double count
        assert_eq!(re.received(), 1);
        let bad = ChunkEnvelope {
            index: total + 5,
            total,
            piece: "AA".into(),
        };
        assert!(re.insert(bad).is_err());
    }

    #[test]
    fn ordinary_responses_are_not_envelopes() {
        assert!(ChunkEnvelope::from_value(&json!({"status": "success"})).is_none());
    }
}
