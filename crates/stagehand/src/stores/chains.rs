//! Effect-chain templates.
//!
//! An ordered list of device URIs with parameter overrides, persisted to
//! disk as one JSON document. Every mutation writes through; startup
//! reloads whatever the last session saved.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use stageproto::BridgeError;

const TEMPLATE_FILE: &str = "effect_chains.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDevice {
    pub uri: String,
    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTemplate {
    pub name: String,
    pub devices: Vec<ChainDevice>,
}

pub struct ChainTemplateStore {
    inner: Mutex<BTreeMap<String, ChainTemplate>>,
    path: PathBuf,
}

impl ChainTemplateStore {
    /// Open the store, loading any templates the last session persisted.
    pub fn open(dir: PathBuf) -> Self {
        let path = dir.join(TEMPLATE_FILE);
        let templates = match load_file(&path) {
            Ok(t) => t,
            Err(e) => {
                warn!("effect chain templates not loaded: {}", e);
                BTreeMap::new()
            }
        };
        Self {
            inner: Mutex::new(templates),
            path,
        }
    }

    pub fn save(&self, template: ChainTemplate) -> Result<(), BridgeError> {
        let copy = {
            let mut map = self.inner.lock().expect("chain store poisoned");
            map.insert(template.name.clone(), template);
            map.clone()
        };
        self.persist(&copy)
    }

    pub fn get(&self, name: &str) -> Result<ChainTemplate, BridgeError> {
        self.inner
            .lock()
            .expect("chain store poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| {
                BridgeError::invalid_input("name", format!("no effect chain template '{}'", name))
            })
    }

    pub fn remove(&self, name: &str) -> Result<(), BridgeError> {
        let copy = {
            let mut map = self.inner.lock().expect("chain store poisoned");
            if map.remove(name).is_none() {
                return Err(BridgeError::invalid_input(
                    "name",
                    format!("no effect chain template '{}'", name),
                ));
            }
            map.clone()
        };
        self.persist(&copy)
    }

    pub fn list(&self) -> Vec<ChainTemplate> {
        self.inner
            .lock()
            .expect("chain store poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn persist(&self, templates: &BTreeMap<String, ChainTemplate>) -> Result<(), BridgeError> {
        write_file(&self.path, templates)
            .map_err(|e| BridgeError::Internal(format!("persisting effect chains: {}", e)))
    }
}

fn load_file(path: &Path) -> Result<BTreeMap<String, ChainTemplate>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_file(path: &Path, templates: &BTreeMap<String, ChainTemplate>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(templates).context("encoding templates")?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str) -> ChainTemplate {
        ChainTemplate {
            name: name.to_string(),
            devices: vec![
                ChainDevice {
                    uri: "query:AudioFx#Compressor".into(),
                    parameter_overrides: BTreeMap::from([("Threshold".to_string(), -18.0)]),
                },
                ChainDevice {
                    uri: "query:AudioFx#Reverb".into(),
                    parameter_overrides: BTreeMap::new(),
                },
            ],
        }
    }

    #[test]
    fn save_then_get_is_structural_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChainTemplateStore::open(dir.path().to_path_buf());
        let t = template("vocal-chain");
        store.save(t.clone()).unwrap();
        assert_eq!(store.get("vocal-chain").unwrap(), t);
    }

    #[test]
    fn templates_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ChainTemplateStore::open(dir.path().to_path_buf());
            store.save(template("vocal-chain")).unwrap();
        }
        let reopened = ChainTemplateStore::open(dir.path().to_path_buf());
        assert_eq!(reopened.get("vocal-chain").unwrap(), template("vocal-chain"));
        assert_eq!(reopened.list().len(), 1);
    }

    #[test]
    fn remove_unknown_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChainTemplateStore::open(dir.path().to_path_buf());
        assert!(matches!(
            store.remove("ghost"),
            Err(BridgeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ChainTemplateStore::open(dir.path().to_path_buf());
            store.save(template("a")).unwrap();
            store.save(template("b")).unwrap();
            store.remove("a").unwrap();
        }
        let reopened = ChainTemplateStore::open(dir.path().to_path_buf());
        assert!(reopened.get("a").is_err());
        assert!(reopened.get("b").is_ok());
    }
}
