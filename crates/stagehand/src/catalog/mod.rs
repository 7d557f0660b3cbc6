//! Browser catalog cache.
//!
//! Keeps the DAW's browser tree out of the hot path: a flat item list, a
//! by-category index, and a normalized name -> URI map, all rebuilt
//! together and swapped atomically under one mutex. Populated by a
//! breadth-first walk over the TCP channel; persisted to disk between
//! sessions. The cache never rescans mid-session on its own - refresh is
//! explicit.

pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use stageproto::{BridgeError, DawCommand};

use crate::daw::pipeline::CommandPipeline;
use crate::readiness::ReadyFlag;

/// The browser roots walked during populate, in resolution-priority order:
/// a name collision resolves to the earlier category.
pub const CATEGORY_ORDER: [&str; 5] = [
    "instruments",
    "drums",
    "sounds",
    "audio_effects",
    "midi_effects",
];

/// Walk limits. Truncation at the item cap is logged, not an error.
const MAX_DEPTH: usize = 4;
const MAX_ITEMS: usize = 5000;

/// URI prefixes that bypass name resolution entirely.
const URI_PREFIXES: [&str; 3] = ["query:", "device:", "userlib:"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub uri: String,
    pub name: String,
    pub category: String,
    pub is_loadable: bool,
    pub depth: usize,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    pub populated: bool,
    pub populating: bool,
    pub item_count: usize,
    pub categories: HashMap<String, usize>,
}

/// Outcome of a populate request.
#[derive(Debug, PartialEq, Eq)]
pub enum PopulateOutcome {
    Completed { items: usize },
    AlreadyRunning,
}

#[derive(Default)]
struct Indices {
    items: Arc<Vec<CatalogItem>>,
    by_category: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, String>,
}

struct CatalogInner {
    indices: Indices,
    populating: bool,
}

pub struct CatalogCache {
    inner: Mutex<CatalogInner>,
    populated: ReadyFlag,
    dir: PathBuf,
}

impl CatalogCache {
    pub fn new(dir: PathBuf, populated: ReadyFlag) -> Self {
        Self {
            inner: Mutex::new(CatalogInner {
                indices: Indices::default(),
                populating: false,
            }),
            populated,
            dir,
        }
    }

    /// Try to warm the cache from the on-disk snapshot. Sets the populated
    /// flag when the snapshot is usable.
    pub fn load_from_disk(&self) {
        match store::load(&self.dir) {
            Ok(Some(stored)) => {
                let count = stored.items.len();
                self.commit(stored.items, Some(stored.by_name));
                info!(count, "catalog loaded from disk snapshot");
            }
            Ok(None) => debug!("no usable catalog snapshot on disk"),
            Err(e) => warn!("catalog snapshot load failed: {}", e),
        }
    }

    /// Walk the DAW browser and rebuild all three indices.
    ///
    /// At most one populate runs at a time; a second request while one is
    /// in flight is a no-op.
    pub async fn populate(
        &self,
        pipeline: &CommandPipeline,
    ) -> Result<PopulateOutcome, BridgeError> {
        {
            let mut inner = self.inner.lock().expect("catalog mutex poisoned");
            if inner.populating {
                return Ok(PopulateOutcome::AlreadyRunning);
            }
            inner.populating = true;
        }

        let result = match self.walk(pipeline).await {
            Ok(items) => {
                let count = items.len();
                let by_name = build_name_index(&items);
                if let Err(e) = store::save(&self.dir, &items, &by_name) {
                    warn!("catalog snapshot save failed: {}", e);
                }
                self.commit(items, Some(by_name));
                info!(count, "catalog populate complete");
                Ok(PopulateOutcome::Completed { items: count })
            }
            Err(e) => {
                warn!("catalog populate failed: {}", e);
                Err(e)
            }
        };

        self.inner
            .lock()
            .expect("catalog mutex poisoned")
            .populating = false;
        result
    }

    /// Breadth-first walk of the browser roots, concurrency 1, through the
    /// command pipeline.
    async fn walk(&self, pipeline: &CommandPipeline) -> Result<Vec<CatalogItem>, BridgeError> {
        let mut items: Vec<CatalogItem> = Vec::new();
        let mut queue: std::collections::VecDeque<(String, String, usize)> = CATEGORY_ORDER
            .iter()
            .map(|root| (root.to_string(), root.to_string(), 0))
            .collect();

        while let Some((path, category, depth)) = queue.pop_front() {
            if items.len() >= MAX_ITEMS {
                warn!(cap = MAX_ITEMS, "catalog item cap reached, truncating walk");
                break;
            }

            let command =
                DawCommand::new("get_browser_items_at_path").with_param("path", path.clone());
            let result = match pipeline.execute(command).await {
                Ok(v) => v,
                Err(e) => {
                    // A missing root is survivable; a dead transport is not.
                    if e.is_connection_failure() {
                        return Err(e);
                    }
                    debug!(path, "browser path skipped: {}", e);
                    continue;
                }
            };

            let children = result
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for child in children {
                if items.len() >= MAX_ITEMS {
                    break;
                }
                let name = child.get("name").and_then(Value::as_str).unwrap_or("");
                if name.is_empty() {
                    continue;
                }
                let uri = child.get("uri").and_then(Value::as_str).unwrap_or("");
                let is_folder = child
                    .get("is_folder")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let is_loadable = child
                    .get("is_loadable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                if is_loadable && !uri.is_empty() {
                    let mut item_path: Vec<String> =
                        path.split('/').map(str::to_string).collect();
                    item_path.push(name.to_string());
                    items.push(CatalogItem {
                        uri: uri.to_string(),
                        name: name.to_string(),
                        category: category.clone(),
                        is_loadable,
                        depth: depth + 1,
                        path: item_path,
                    });
                }
                if is_folder && depth + 1 < MAX_DEPTH {
                    queue.push_back((format!("{}/{}", path, name), category.clone(), depth + 1));
                }
            }
        }

        Ok(items)
    }

    /// Swap in a freshly built index set. Readers see either the old set
    /// or the new set, never a mix. A pre-built name index (from the walk
    /// that produced the items, or from the disk snapshot) is installed
    /// as-is instead of being rebuilt.
    fn commit(&self, items: Vec<CatalogItem>, by_name: Option<HashMap<String, String>>) {
        let mut indices = build_indices(items);
        if let Some(by_name) = by_name {
            indices.by_name = by_name;
        }
        let non_empty = !indices.items.is_empty();
        {
            let mut inner = self.inner.lock().expect("catalog mutex poisoned");
            inner.indices = indices;
        }
        if non_empty {
            self.populated.set();
        }
    }

    /// Resolve a device name (or pass a URI through).
    ///
    /// Waits up to `timeout` for the catalog to be populated; on expiry or
    /// on a miss the input comes back unchanged so the DAW gets the final
    /// word.
    pub async fn resolve(&self, name_or_uri: &str, timeout: Duration) -> String {
        if URI_PREFIXES.iter().any(|p| name_or_uri.starts_with(p)) {
            return name_or_uri.to_string();
        }

        if !self.populated.wait_timeout(timeout).await {
            warn!(
                input = name_or_uri,
                "catalog not populated within {:?}, passing name through", timeout
            );
            return name_or_uri.to_string();
        }

        let key = normalize_name(name_or_uri);
        let inner = self.inner.lock().expect("catalog mutex poisoned");
        match inner.indices.by_name.get(&key) {
            Some(uri) => uri.clone(),
            None => {
                debug!(input = name_or_uri, "no catalog entry, passing through");
                name_or_uri.to_string()
            }
        }
    }

    /// Case-insensitive substring search over the flat list.
    pub fn search(
        &self,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Vec<CatalogItem> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().expect("catalog mutex poisoned");
        inner
            .indices
            .items
            .iter()
            .filter(|item| category.is_none_or(|c| item.category == c))
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn status(&self) -> CatalogStatus {
        let inner = self.inner.lock().expect("catalog mutex poisoned");
        CatalogStatus {
            populated: self.populated.is_set(),
            populating: inner.populating,
            item_count: inner.indices.items.len(),
            categories: inner
                .indices
                .by_category
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.inner
            .lock()
            .expect("catalog mutex poisoned")
            .indices
            .items
            .len()
    }

    /// Test/seed hook: install items directly, as a populate would.
    pub fn install(&self, items: Vec<CatalogItem>) {
        self.commit(items, None);
    }
}

/// Lower-case, strip punctuation to spaces, collapse runs of whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_space = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

fn category_rank(category: &str) -> usize {
    CATEGORY_ORDER
        .iter()
        .position(|c| *c == category)
        .unwrap_or(CATEGORY_ORDER.len())
}

/// Build the normalized-name index from a flat list.
///
/// Name collisions resolve to (1) shallower depth, (2) earlier category,
/// (3) first encountered.
fn build_name_index(items: &[CatalogItem]) -> HashMap<String, String> {
    let mut winners: HashMap<String, usize> = HashMap::new();

    for (i, item) in items.iter().enumerate() {
        let key = normalize_name(&item.name);
        if key.is_empty() {
            continue;
        }
        match winners.get(&key) {
            None => {
                winners.insert(key, i);
            }
            Some(&existing) => {
                let cur = &items[existing];
                let better = (item.depth, category_rank(&item.category))
                    < (cur.depth, category_rank(&cur.category));
                if better {
                    winners.insert(key, i);
                }
            }
        }
    }

    winners
        .into_iter()
        .map(|(k, i)| (k, items[i].uri.clone()))
        .collect()
}

/// Rebuild all three indices from one flat list.
fn build_indices(items: Vec<CatalogItem>) -> Indices {
    let by_name = build_name_index(&items);
    let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        by_category
            .entry(item.category.clone())
            .or_default()
            .push(i);
    }

    Indices {
        items: Arc::new(items),
        by_category,
        by_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str, depth: usize, uri: &str) -> CatalogItem {
        CatalogItem {
            uri: uri.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            is_loadable: true,
            depth,
            path: vec![category.to_string(), name.to_string()],
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_name("Wavetable"), "wavetable");
        assert_eq!(normalize_name("Grand Piano.adg"), "grand piano adg");
        assert_eq!(normalize_name("  EQ-Eight!!  "), "eq eight");
    }

    #[test]
    fn shallower_depth_wins_name_collisions() {
        let items = vec![
            item("Wavetable", "sounds", 3, "query:deep"),
            item("Wavetable", "instruments", 1, "query:shallow"),
        ];
        let idx = build_indices(items);
        assert_eq!(idx.by_name["wavetable"], "query:shallow");
    }

    #[test]
    fn category_order_breaks_depth_ties() {
        let items = vec![
            item("Kick", "sounds", 2, "query:sound-kick"),
            item("Kick", "drums", 2, "query:drum-kick"),
        ];
        let idx = build_indices(items);
        assert_eq!(idx.by_name["kick"], "query:drum-kick");
    }

    #[test]
    fn first_encountered_breaks_full_ties() {
        let items = vec![
            item("Pad", "sounds", 2, "query:first"),
            item("Pad", "sounds", 2, "query:second"),
        ];
        let idx = build_indices(items);
        assert_eq!(idx.by_name["pad"], "query:first");
    }

    #[test]
    fn indices_are_mutually_consistent() {
        let items = vec![
            item("Wavetable", "instruments", 1, "query:wt"),
            item("Operator", "instruments", 1, "query:op"),
            item("808 Kit", "drums", 2, "query:808"),
        ];
        let idx = build_indices(items.clone());
        for it in &items {
            let positions = &idx.by_category[&it.category];
            assert!(positions.iter().any(|&i| idx.items[i].uri == it.uri));
            assert_eq!(idx.by_name[&normalize_name(&it.name)], it.uri);
        }
    }

    #[tokio::test]
    async fn resolve_passes_uris_through_without_waiting() {
        let cache = CatalogCache::new(std::env::temp_dir(), ReadyFlag::new());
        let start = std::time::Instant::now();
        let out = cache
            .resolve("query:Synths#Wavetable", Duration::from_secs(5))
            .await;
        assert_eq!(out, "query:Synths#Wavetable");
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn resolve_cold_cache_times_out_to_passthrough() {
        let cache = CatalogCache::new(std::env::temp_dir(), ReadyFlag::new());
        let out = cache.resolve("Wavetable", Duration::from_millis(30)).await;
        assert_eq!(out, "Wavetable");
    }

    #[tokio::test]
    async fn resolve_hits_after_install() {
        let cache = CatalogCache::new(std::env::temp_dir(), ReadyFlag::new());
        cache.install(vec![item("Wavetable", "instruments", 1, "query:wt")]);
        let out = cache.resolve("wavetable", Duration::from_secs(1)).await;
        assert_eq!(out, "query:wt");
        // Miss: unchanged input.
        let miss = cache.resolve("No Such Synth", Duration::from_secs(1)).await;
        assert_eq!(miss, "No Such Synth");
    }

    #[test]
    fn search_filters_by_category() {
        let cache = CatalogCache::new(std::env::temp_dir(), ReadyFlag::new());
        cache.install(vec![
            item("Wavetable", "instruments", 1, "query:wt"),
            item("Wavetable Pad", "sounds", 2, "query:wtp"),
        ]);
        let all = cache.search("wavetable", None, 10);
        assert_eq!(all.len(), 2);
        let instruments = cache.search("wavetable", Some("instruments"), 10);
        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].uri, "query:wt");
    }
}
