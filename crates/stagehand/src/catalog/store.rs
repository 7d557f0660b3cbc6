//! Catalog disk persistence.
//!
//! One gzip-compressed JSON document with a format-revision header, the
//! flat item list, and the normalized name -> URI index, written via
//! temp-file-plus-rename so readers never see a torn snapshot. Loads
//! reject unknown revisions and snapshots older than seven days; both
//! cases just mean a fresh populate.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::CatalogItem;

/// Bump when the snapshot layout changes.
const FORMAT_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "catalog.json.gz";
const MAX_AGE_DAYS: i64 = 7;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    items: Vec<CatalogItem>,
    by_name: HashMap<String, String>,
}

/// What a successful load hands back.
pub struct StoredCatalog {
    pub items: Vec<CatalogItem>,
    pub by_name: HashMap<String, String>,
}

/// Persist the flat list together with the by-name index built from it.
pub fn save(
    dir: &Path,
    items: &[CatalogItem],
    by_name: &HashMap<String, String>,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating catalog dir {}", dir.display()))?;

    let snapshot = Snapshot {
        version: FORMAT_VERSION,
        saved_at: Utc::now(),
        items: items.to_vec(),
        by_name: by_name.clone(),
    };

    let tmp_path = dir.join(format!("{}.tmp", SNAPSHOT_FILE));
    let final_path = dir.join(SNAPSHOT_FILE);

    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        let json = serde_json::to_vec(&snapshot).context("encoding catalog snapshot")?;
        encoder.write_all(&json).context("writing catalog snapshot")?;
        encoder.finish().context("finishing gzip stream")?;
    }

    fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("renaming into {}", final_path.display()))?;
    Ok(())
}

/// Load the snapshot if present, current, and fresh.
pub fn load(dir: &Path) -> Result<Option<StoredCatalog>> {
    let path = dir.join(SNAPSHOT_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut decoder = GzDecoder::new(file);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .context("decompressing catalog snapshot")?;

    let snapshot: Snapshot =
        serde_json::from_slice(&json).context("parsing catalog snapshot")?;

    if snapshot.version != FORMAT_VERSION {
        bail!(
            "catalog snapshot has format revision {}, expected {}",
            snapshot.version,
            FORMAT_VERSION
        );
    }
    if Utc::now() - snapshot.saved_at > ChronoDuration::days(MAX_AGE_DAYS) {
        return Ok(None);
    }

    Ok(Some(StoredCatalog {
        items: snapshot.items,
        by_name: snapshot.by_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<CatalogItem> {
        vec![CatalogItem {
            uri: "query:Synths#Wavetable".into(),
            name: "Wavetable".into(),
            category: "instruments".into(),
            is_loadable: true,
            depth: 1,
            path: vec!["instruments".into(), "Wavetable".into()],
        }]
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([(
            "wavetable".to_string(),
            "query:Synths#Wavetable".to_string(),
        )])
    }

    fn write_raw_snapshot(dir: &Path, snapshot: &Snapshot) {
        let file = File::create(dir.join(SNAPSHOT_FILE)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(&serde_json::to_vec(snapshot).unwrap())
            .unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn save_then_load_roundtrips_items_and_name_index() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), &items(), &names()).unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.items, items());
        assert_eq!(loaded.by_name, names());
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn stale_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_snapshot(
            dir.path(),
            &Snapshot {
                version: FORMAT_VERSION,
                saved_at: Utc::now() - ChronoDuration::days(MAX_AGE_DAYS + 1),
                items: items(),
                by_name: names(),
            },
        );
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn wrong_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_raw_snapshot(
            dir.path(),
            &Snapshot {
                version: FORMAT_VERSION + 1,
                saved_at: Utc::now(),
                items: items(),
                by_name: names(),
            },
        );
        assert!(load(dir.path()).is_err());
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        save(dir.path(), &items(), &names()).unwrap();
        save(dir.path(), &[], &HashMap::new()).unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert!(loaded.items.is_empty());
        assert!(loaded.by_name.is_empty());
    }
}
