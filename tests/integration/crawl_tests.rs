//! Integration tests for the crawler
//!
//! These tests drive the coordinator against scripted link sources and
//! real checkpoint files, and use wiremock to run the full crawl cycle
//! against a mock wiki API end-to-end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiki_graph::config::{ApiConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use wiki_graph::crawler::{run_crawl, Coordinator, CrawlSettings, FetchError, LinkFetcher};
use wiki_graph::storage::{
    CheckpointStore, JsonCheckpointStore, LoadOrigin, Snapshot, StorageResult,
};
use wiki_graph::{CrawlState, DriverState, GraphStore};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Link source answering from a fixed table
///
/// Titles listed in `fail_once` fail on their first fetch. When `cancel_on`
/// is set, fetching that title fires the token before returning.
struct ScriptedFetcher {
    links: HashMap<String, Vec<String>>,
    fail_once: Mutex<HashSet<String>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl ScriptedFetcher {
    fn new(entries: &[(&str, &[&str])]) -> Self {
        Self {
            links: entries
                .iter()
                .map(|(title, links)| {
                    (
                        title.to_string(),
                        links.iter().map(|l| l.to_string()).collect(),
                    )
                })
                .collect(),
            fail_once: Mutex::new(HashSet::new()),
            calls: Arc::new(Mutex::new(HashMap::new())),
            cancel_on: None,
        }
    }

    fn failing_once(self, title: &str) -> Self {
        self.fail_once.lock().unwrap().insert(title.to_string());
        self
    }

    fn cancelling_on(mut self, title: &str, token: &CancellationToken) -> Self {
        self.cancel_on = Some((title.to_string(), token.clone()));
        self
    }
}

#[async_trait]
impl LinkFetcher for ScriptedFetcher {
    async fn fetch_links(&self, title: &str) -> Result<Vec<String>, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(title.to_string())
            .or_insert(0) += 1;

        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == title {
                token.cancel();
            }
        }

        if self.fail_once.lock().unwrap().remove(title) {
            return Err(FetchError::Status {
                title: title.to_string(),
                status: 503,
            });
        }

        Ok(self.links.get(title).cloned().unwrap_or_default())
    }
}

/// In-memory checkpoint store that keeps every saved state
#[derive(Default)]
struct RecordingStore {
    saves: Vec<(GraphStore, CrawlState)>,
}

impl CheckpointStore for RecordingStore {
    fn save(&mut self, graph: &GraphStore, state: &CrawlState) -> StorageResult<DateTime<Utc>> {
        self.saves.push((graph.clone(), state.clone()));
        Ok(Utc::now())
    }

    fn load(&self) -> StorageResult<Snapshot> {
        Ok(Snapshot::empty(LoadOrigin::Missing))
    }
}

fn titles(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn fast_settings() -> CrawlSettings {
    CrawlSettings {
        retry_delay: Duration::ZERO,
        checkpoint_retry_delay: Duration::ZERO,
        ..CrawlSettings::default()
    }
}

fn xyz_fetcher() -> ScriptedFetcher {
    ScriptedFetcher::new(&[("X", &["Y", "Z"]), ("Y", &[]), ("Z", &["X"])])
}

fn inbound(graph: &GraphStore, title: &str) -> Vec<String> {
    graph
        .get(title)
        .map(|r| r.inbound_links.iter().cloned().collect())
        .unwrap_or_default()
}

/// Creates a test configuration pointing at `endpoint`
fn create_test_config(endpoint: &str, seeds: Vec<String>, checkpoint_path: &str) -> Config {
    Config {
        seeds,
        crawler: CrawlerConfig {
            retry_delay_ms: 0,
            ..CrawlerConfig::default()
        },
        api: ApiConfig {
            endpoint: endpoint.to_string(),
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            checkpoint_path: checkpoint_path.to_string(),
            checkpoint_retries: 0,
        },
    }
}

#[tokio::test]
async fn test_crawl_small_cycle() {
    let mut coordinator = Coordinator::new(xyz_fetcher(), RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["X"]));

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.processed, 3);
    assert_eq!(report.remaining, 0);
    assert_eq!(coordinator.state(), DriverState::Stopped);

    let graph = coordinator.graph();
    assert_eq!(graph.get("X").unwrap().outbound_links, titles(&["Y", "Z"]));
    assert!(graph.get("Y").unwrap().outbound_links.is_empty());
    assert_eq!(graph.get("Z").unwrap().outbound_links, titles(&["X"]));
    assert_eq!(inbound(graph, "X"), titles(&["Z"]));
    assert_eq!(inbound(graph, "Y"), titles(&["X"]));
    assert_eq!(inbound(graph, "Z"), titles(&["X"]));

    let (_, last) = coordinator.store().saves.last().unwrap();
    assert_eq!(
        last.visited.iter().cloned().collect::<Vec<_>>(),
        titles(&["X", "Y", "Z"])
    );
    assert!(last.to_visit.is_empty());
}

#[tokio::test]
async fn test_cancel_during_fetch_saves_once() {
    let cancel = CancellationToken::new();
    let fetcher = xyz_fetcher().cancelling_on("X", &cancel);
    let calls = fetcher.calls.clone();
    let mut coordinator = Coordinator::new(fetcher, RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["X"]));

    let report = coordinator.run(&cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.processed, 1);
    assert_eq!(calls.lock().unwrap().len(), 1);

    // The in-flight fetch is recorded, then exactly one final checkpoint
    let saves = &coordinator.store().saves;
    assert_eq!(saves.len(), 1);
    let (graph, state) = &saves[0];
    assert!(state.visited.contains("X"));
    assert_eq!(state.to_visit, titles(&["Y", "Z"]));
    assert_eq!(inbound(graph, "Y"), titles(&["X"]));
}

#[tokio::test]
async fn test_failed_fetch_is_requeued_and_retried() {
    let fetcher = ScriptedFetcher::new(&[("A", &["B"]), ("B", &[])]).failing_once("A");
    let calls = fetcher.calls.clone();
    let mut coordinator = Coordinator::new(fetcher, RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["A"]));

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed_fetches, 1);
    assert_eq!(report.dead_lettered, 0);
    assert_eq!(calls.lock().unwrap().get("A"), Some(&2));
    assert!(coordinator.scheduler().is_visited("A"));
    assert!(coordinator.scheduler().is_visited("B"));
}

#[tokio::test]
async fn test_failure_moves_title_to_back_of_queue() {
    let fetcher =
        ScriptedFetcher::new(&[("Seed", &["A", "B"]), ("A", &[]), ("B", &[])]).failing_once("A");
    let mut coordinator = Coordinator::new(fetcher, RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["Seed"]));

    coordinator.run(&CancellationToken::new()).await.unwrap();

    // Checkpoints after Seed, B, A: B was visited before A's retry
    let saves = &coordinator.store().saves;
    assert!(saves[1].1.visited.contains("B"));
    assert!(!saves[1].1.visited.contains("A"));
    assert_eq!(saves[1].1.to_visit, titles(&["A"]));
}

#[tokio::test]
async fn test_self_link_not_requeued() {
    let fetcher = ScriptedFetcher::new(&[("Loop", &["Loop", "Other"]), ("Other", &[])]);
    let calls = fetcher.calls.clone();
    let mut coordinator = Coordinator::new(fetcher, RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["Loop"]));

    coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(calls.lock().unwrap().get("Loop"), Some(&1));
    assert_eq!(inbound(coordinator.graph(), "Loop"), titles(&["Loop"]));
}

#[tokio::test]
async fn test_saved_frontier_is_disjoint_from_visited() {
    let fetcher = ScriptedFetcher::new(&[
        ("A", &["B", "C", "A"]),
        ("B", &["A", "C", "D"]),
        ("C", &["D", "B"]),
        ("D", &["A", "E"]),
        ("E", &["E", "C"]),
    ])
    .failing_once("C");
    let mut coordinator = Coordinator::new(fetcher, RecordingStore::default(), fast_settings());
    coordinator.seed(&titles(&["A", "D"]));

    coordinator.run(&CancellationToken::new()).await.unwrap();

    for (graph, state) in &coordinator.store().saves {
        let mut seen = HashSet::new();
        for title in &state.to_visit {
            assert!(seen.insert(title), "duplicate '{}' in frontier", title);
            assert!(!state.visited.contains(title), "'{}' queued and visited", title);
        }
        for title in state.visited.iter().chain(&state.to_visit) {
            assert!(graph.contains(title), "no record for '{}'", title);
        }
    }
}

#[tokio::test]
async fn test_resume_from_json_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("graph.json");

    // First run is interrupted while X is being fetched
    let cancel = CancellationToken::new();
    let fetcher = xyz_fetcher().cancelling_on("X", &cancel);
    let first_calls = fetcher.calls.clone();
    let mut first = Coordinator::open(
        fetcher,
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        false,
    )
    .unwrap();
    first.run(&cancel).await.unwrap();
    assert_eq!(first_calls.lock().unwrap().len(), 1);

    // Second run picks up the saved frontier
    let fetcher = xyz_fetcher();
    let second_calls = fetcher.calls.clone();
    let mut second = Coordinator::open(
        fetcher,
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        false,
    )
    .unwrap();
    assert!(second.scheduler().is_visited("X"));
    second.run(&CancellationToken::new()).await.unwrap();

    let calls = second_calls.lock().unwrap();
    assert!(!calls.contains_key("X"));
    assert_eq!(calls.get("Y"), Some(&1));
    assert_eq!(calls.get("Z"), Some(&1));

    let snapshot = JsonCheckpointStore::new(&checkpoint).load().unwrap();
    assert_eq!(snapshot.origin, LoadOrigin::Clean);
    assert_eq!(snapshot.state.visited.len(), 3);
    assert!(snapshot.state.to_visit.is_empty());
    assert_eq!(inbound(&snapshot.graph, "X"), titles(&["Z"]));
    assert!(snapshot.state.last_save.is_some());
}

#[tokio::test]
async fn test_fresh_ignores_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("graph.json");

    let mut first = Coordinator::open(
        xyz_fetcher(),
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        false,
    )
    .unwrap();
    first.run(&CancellationToken::new()).await.unwrap();

    let fetcher = xyz_fetcher();
    let calls = fetcher.calls.clone();
    let mut second = Coordinator::open(
        fetcher,
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        true,
    )
    .unwrap();
    second.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_resume_after_truncated_checkpoint() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("graph.json");

    let mut first = Coordinator::open(
        xyz_fetcher(),
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        false,
    )
    .unwrap();
    first.run(&CancellationToken::new()).await.unwrap();

    // Simulate a write torn partway through
    let raw = std::fs::read(&checkpoint).unwrap();
    std::fs::write(&checkpoint, &raw[..raw.len() / 2]).unwrap();

    let mut second = Coordinator::open(
        xyz_fetcher(),
        JsonCheckpointStore::new(&checkpoint),
        fast_settings(),
        &titles(&["X"]),
        false,
    )
    .unwrap();
    second.run(&CancellationToken::new()).await.unwrap();

    let snapshot = JsonCheckpointStore::new(&checkpoint).load().unwrap();
    assert_eq!(snapshot.origin, LoadOrigin::Clean);
    assert_eq!(snapshot.state.visited.len(), 3);
    assert!(snapshot.state.to_visit.is_empty());
}

#[tokio::test]
async fn test_full_crawl_against_mock_api() {
    let mock_server = MockServer::start().await;
    let endpoint = format!("{}/api.php", mock_server.uri());

    let pages = [
        ("Alpha", r#"[{"ns": 0, "title": "Beta"}, {"ns": 0, "title": "Gamma"}]"#),
        ("Beta", r#"[{"ns": 0, "title": "Alpha"}]"#),
        ("Gamma", r#"[]"#),
    ];
    for (index, (title, links)) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/api.php"))
            .and(query_param("titles", *title))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"batchcomplete": "", "query": {{"pages": {{"{}": {{"pageid": {}, "ns": 0, "title": "{}", "links": {}}}}}}}}}"#,
                index + 1,
                index + 1,
                title,
                links
            )))
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("graph.json");
    let config = create_test_config(
        &endpoint,
        titles(&["Alpha"]),
        checkpoint.to_str().unwrap(),
    );

    let report = run_crawl(
        &config,
        Some("test-hash".to_string()),
        false,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.total_pages, 3);

    let raw = std::fs::read_to_string(&checkpoint).unwrap();
    let document: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        document["graph_data"]["Alpha"]["links_to"],
        serde_json::json!(["Beta", "Gamma"])
    );
    assert_eq!(
        document["graph_data"]["Gamma"]["linked_by"],
        serde_json::json!(["Alpha"])
    );
    assert_eq!(document["metadata"]["total_pages"], serde_json::json!(3));
    assert_eq!(document["metadata"]["config_hash"], serde_json::json!("test-hash"));
    assert_eq!(document["metadata"]["to_visit"], serde_json::json!([]));
}

#[tokio::test]
async fn test_api_errors_dead_letter_title() {
    let mock_server = MockServer::start().await;
    let endpoint = format!("{}/api.php", mock_server.uri());

    Mock::given(method("GET"))
        .and(query_param("titles", "Start"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"query": {"pages": {"1": {"title": "Start", "links": [{"ns": 0, "title": "Broken"}]}}}}"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("titles", "Broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("graph.json");
    let mut config = create_test_config(&endpoint, titles(&["Start"]), checkpoint.to_str().unwrap());
    config.crawler.max_retries = 2;

    let report = run_crawl(&config, None, false, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.dead_lettered, 1);
    assert_eq!(report.remaining, 0);

    let snapshot = JsonCheckpointStore::new(&checkpoint).load().unwrap();
    assert_eq!(snapshot.state.dead_letter, titles(&["Broken"]));
    assert!(snapshot.graph.contains("Broken"));
}
