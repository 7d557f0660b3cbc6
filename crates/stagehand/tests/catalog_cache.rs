//! Catalog populate, resolution, and persistence against a scripted DAW.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use stagehand::catalog::{CatalogCache, PopulateOutcome};
use stagehand::daw::pipeline::CommandPipeline;
use stagehand::daw::tcp::{TcpClient, TcpConfig};
use stagehand::readiness::ReadyFlag;

use common::{FakeAction, FakeDaw};

/// A DAW whose browser has two instruments at the top level of
/// `instruments`, one nested folder with a deeper duplicate name, and one
/// drum kit. Every other root is empty.
async fn browser_daw() -> FakeDaw {
    FakeDaw::spawn(Arc::new(|_, cmd| {
        assert_eq!(cmd["type"], "get_browser_items_at_path");
        let path = cmd["params"]["path"].as_str().unwrap_or("");
        let items = match path {
            "instruments" => json!([
                {"name": "Wavetable", "uri": "query:Synths#Wavetable", "is_loadable": true, "is_folder": false},
                {"name": "Operator", "uri": "query:Synths#Operator", "is_loadable": true, "is_folder": false},
                {"name": "Pads", "uri": "", "is_loadable": false, "is_folder": true},
            ]),
            "instruments/Pads" => json!([
                {"name": "Wavetable", "uri": "query:Pads#WavetableDeep", "is_loadable": true, "is_folder": false},
            ]),
            "drums" => json!([
                {"name": "808 Kit", "uri": "query:Drums#808", "is_loadable": true, "is_folder": false},
            ]),
            _ => json!([]),
        };
        FakeAction::Respond(json!({"status": "success", "result": {"items": items}}))
    }))
    .await
}

fn pipeline_for(port: u16) -> CommandPipeline {
    let tcp = Arc::new(TcpClient::new(TcpConfig::loopback(port), ReadyFlag::new()));
    CommandPipeline::new(tcp)
}

#[tokio::test]
async fn populate_builds_consistent_indices() {
    let daw = browser_daw().await;
    let dir = tempfile::tempdir().unwrap();
    let populated = ReadyFlag::new();
    let cache = CatalogCache::new(dir.path().to_path_buf(), populated.clone());
    let pipeline = pipeline_for(daw.port);

    let outcome = cache.populate(&pipeline).await.unwrap();
    assert_eq!(outcome, PopulateOutcome::Completed { items: 4 });
    assert!(populated.is_set());

    let status = cache.status();
    assert_eq!(status.item_count, 4);
    assert_eq!(status.categories["instruments"], 3);
    assert_eq!(status.categories["drums"], 1);

    // The shallow Wavetable wins the by-name entry over the nested one.
    let uri = cache.resolve("wavetable", Duration::from_secs(1)).await;
    assert_eq!(uri, "query:Synths#Wavetable");

    // Search still sees both.
    assert_eq!(cache.search("wavetable", None, 10).len(), 2);
}

#[tokio::test]
async fn populate_persists_and_a_fresh_cache_loads_it() {
    let daw = browser_daw().await;
    let dir = tempfile::tempdir().unwrap();

    {
        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        cache.populate(&pipeline_for(daw.port)).await.unwrap();
    }

    // New process, no DAW: warm from disk alone.
    let populated = ReadyFlag::new();
    let cache = CatalogCache::new(dir.path().to_path_buf(), populated.clone());
    assert_eq!(cache.item_count(), 0);
    cache.load_from_disk();
    assert_eq!(cache.item_count(), 4);
    assert!(populated.is_set());
    assert_eq!(
        cache.resolve("808 kit", Duration::from_secs(1)).await,
        "query:Drums#808"
    );
}

#[tokio::test]
async fn resolver_passes_through_when_cold() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());

    let started = std::time::Instant::now();
    let out = cache.resolve("Wavetable", Duration::from_millis(200)).await;
    assert_eq!(out, "Wavetable");
    assert!(started.elapsed() >= Duration::from_millis(200));

    // URIs never wait at all.
    let started = std::time::Instant::now();
    let out = cache
        .resolve("query:Synths#Wavetable", Duration::from_secs(30))
        .await;
    assert_eq!(out, "query:Synths#Wavetable");
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_populate_is_a_noop() {
    // The DAW answers slowly so the first populate is still running when
    // the second request lands.
    let daw = FakeDaw::spawn(Arc::new(|_, cmd| {
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(cmd["type"], "get_browser_items_at_path");
        FakeAction::Respond(json!({"status": "success", "result": {"items": [
            {"name": "Wavetable", "uri": "query:Synths#Wavetable", "is_loadable": true, "is_folder": false}
        ]}}))
    }))
    .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CatalogCache::new(
        dir.path().to_path_buf(),
        ReadyFlag::new(),
    ));
    let pipeline = Arc::new(pipeline_for(daw.port));

    let first = {
        let cache = Arc::clone(&cache);
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { cache.populate(&pipeline).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = cache.populate(&pipeline).await.unwrap();
    assert_eq!(second, PopulateOutcome::AlreadyRunning);

    match first.await.unwrap().unwrap() {
        PopulateOutcome::Completed { items } => assert!(items >= 1),
        other => panic!("first populate should complete, got {:?}", other),
    }
}
