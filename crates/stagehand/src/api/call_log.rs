//! Tool-call log: a bounded ring of recent calls plus per-tool counters.
//!
//! Feeds the dashboard, which polls every few seconds; a plain mutex
//! around append + read is plenty at that cadence.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const RING_CAPACITY: usize = 200;
const SUMMARY_CAP: usize = 120;

#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub args_summary: String,
    pub duration_ms: u64,
    pub outcome: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ToolCounter {
    pub calls: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Inner {
    ring: VecDeque<CallRecord>,
    counters: HashMap<String, ToolCounter>,
}

#[derive(Default)]
pub struct CallLog {
    inner: Mutex<Inner>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: CallRecord) {
        let mut inner = self.inner.lock().expect("call log poisoned");
        let counter = inner.counters.entry(record.tool.clone()).or_default();
        counter.calls += 1;
        if record.outcome != "ok" {
            counter.errors += 1;
        }
        inner.ring.push_back(record);
        while inner.ring.len() > RING_CAPACITY {
            inner.ring.pop_front();
        }
    }

    /// Most recent calls, newest last.
    pub fn recent(&self, limit: usize) -> Vec<CallRecord> {
        let inner = self.inner.lock().expect("call log poisoned");
        inner
            .ring
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    /// Busiest tools first.
    pub fn top_tools(&self, limit: usize) -> Vec<(String, ToolCounter)> {
        let inner = self.inner.lock().expect("call log poisoned");
        let mut all: Vec<_> = inner
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        all.sort_by(|a, b| b.1.calls.cmp(&a.1.calls).then(a.0.cmp(&b.0)));
        all.truncate(limit);
        all
    }
}

/// Compact single-line argument summary, truncated for the log.
pub fn summarize_args(args: &Value) -> String {
    let mut s = args.to_string();
    if s.len() > SUMMARY_CAP {
        s.truncate(SUMMARY_CAP.saturating_sub(1));
        s.push('…');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(tool: &str, outcome: &str) -> CallRecord {
        CallRecord {
            timestamp: Utc::now(),
            tool: tool.to_string(),
            args_summary: "{}".to_string(),
            duration_ms: 3,
            outcome: outcome.to_string(),
        }
    }

    #[test]
    fn ring_is_bounded() {
        let log = CallLog::new();
        for _ in 0..(RING_CAPACITY + 50) {
            log.record(record("set_tempo", "ok"));
        }
        assert_eq!(log.recent(RING_CAPACITY * 2).len(), RING_CAPACITY);
    }

    #[test]
    fn counters_track_errors() {
        let log = CallLog::new();
        log.record(record("set_tempo", "ok"));
        log.record(record("set_tempo", "timeout"));
        log.record(record("get_tracks", "ok"));
        let top = log.top_tools(10);
        assert_eq!(top[0].0, "set_tempo");
        assert_eq!(top[0].1.calls, 2);
        assert_eq!(top[0].1.errors, 1);
    }

    #[test]
    fn summaries_are_truncated() {
        let long = json!({"notes": "x".repeat(500)});
        let s = summarize_args(&long);
        assert!(s.len() <= SUMMARY_CAP + 3);
        assert!(s.ends_with('…'));
    }
}
