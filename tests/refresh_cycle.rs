use async_trait::async_trait;
use dispo::domains::DomainCache;
use dispo::error::FetchError;
use dispo::fetch::SourceFetcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

// --- Mocks ---

struct MapFetcher {
    bodies: HashMap<String, String>,
}

impl MapFetcher {
    fn new(bodies: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            bodies: bodies
                .iter()
                .map(|(s, b)| (s.to_string(), b.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl SourceFetcher for MapFetcher {
    async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        self.bodies
            .get(source)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: source.to_string(),
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
    }
}

/// Blocks each fetch until the test releases a permit.
struct GatedFetcher {
    body: String,
    entered: Notify,
    gate: Semaphore,
}

#[async_trait]
impl SourceFetcher for GatedFetcher {
    async fn fetch(&self, _source: &str) -> Result<String, FetchError> {
        self.entered.notify_one();
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        Ok(self.body.clone())
    }
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn first_run_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("domains.json");
    let cache = DomainCache::new(
        sources(&["https://lists.example/one.txt"]),
        &path,
        MapFetcher::new(&[("https://lists.example/one.txt", "foo.com\nBAR.com\nfoo.com\n")]),
    );

    assert_eq!(cache.load_snapshot().await.unwrap(), 0);
    let report = cache.refresh_cycle().await.unwrap();

    assert_eq!(report.total_added, 2);
    assert_eq!(report.size, 2);
    let written: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, vec!["bar.com", "foo.com"]);
}

#[tokio::test]
async fn failing_source_does_not_abort_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DomainCache::new(
        sources(&["https://down.example/list.txt", "https://up.example/list.txt"]),
        dir.path().join("domains.json"),
        MapFetcher::new(&[("https://up.example/list.txt", "x.com")]),
    );

    let report = cache.refresh_cycle().await.unwrap();

    assert_eq!(report.failed(), 1);
    assert!(report.persisted);
    assert!(cache.lookup("x.com"));
    assert!(cache.lookup("X.COM"));
}

#[tokio::test]
async fn lookups_during_cycle_see_previous_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("domains.json");
    std::fs::write(&path, r#"["old-a.com", "old-b.com"]"#).unwrap();

    let fetcher = Arc::new(GatedFetcher {
        body: "new-a.com\nnew-b.com\nnew-c.com".to_string(),
        entered: Notify::new(),
        gate: Semaphore::new(0),
    });
    let cache = Arc::new(DomainCache::new(
        sources(&["first", "second"]),
        &path,
        fetcher.clone(),
    ));
    cache.load_snapshot().await.unwrap();
    assert_eq!(cache.size(), 2);

    let cycle = tokio::spawn({
        let cache = cache.clone();
        async move { cache.refresh_cycle().await }
    });

    // First source merged into the private copy, second one still pending.
    fetcher.entered.notified().await;
    fetcher.gate.add_permits(1);
    fetcher.entered.notified().await;

    assert_eq!(cache.size(), 2);
    assert!(cache.lookup("old-a.com"));
    assert!(!cache.lookup("new-a.com"));

    // A second cycle while one is in flight is dropped.
    assert!(cache.refresh_cycle().await.is_none());

    fetcher.gate.add_permits(1);
    let report = tokio::time::timeout(Duration::from_secs(5), cycle)
        .await
        .expect("cycle did not finish")
        .unwrap()
        .expect("cycle was skipped");

    assert_eq!(report.total_added, 3);
    assert_eq!(cache.size(), 5);
    assert!(cache.lookup("new-c.com"));
    assert!(cache.lookup("old-b.com"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_never_see_shrinking_set() {
    let dir = tempfile::tempdir().unwrap();
    let body: String = (0..2000).map(|i| format!("d{i}.example\n")).collect();
    let cache = Arc::new(DomainCache::new(
        sources(&["a", "b", "c"]),
        dir.path().join("domains.json"),
        MapFetcher::new(&[("a", body.as_str()), ("b", body.as_str()), ("c", "extra.example")]),
    ));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..500 {
                    let size = cache.size();
                    assert!(size >= last, "set shrank from {last} to {size}");
                    // Only the empty and the fully merged set are ever published.
                    assert!(size == 0 || size == 2001, "partial set of {size}");
                    last = size;
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    cache.refresh_cycle().await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(cache.size(), 2001);
}

#[tokio::test]
async fn restart_reloads_persisted_set_when_sources_are_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("domains.json");
    let online = DomainCache::new(
        sources(&["list"]),
        &path,
        MapFetcher::new(&[("list", "mailinator.com\nyopmail.com")]),
    );
    online.refresh_cycle().await.unwrap();

    let offline = DomainCache::new(sources(&["list"]), &path, MapFetcher::new(&[]));
    assert_eq!(offline.load_snapshot().await.unwrap(), 2);
    offline.refresh_cycle().await.unwrap();

    assert!(offline.lookup("Mailinator.com"));
    assert!(offline.lookup("yopmail.com"));
    let written: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, vec!["mailinator.com", "yopmail.com"]);
}
