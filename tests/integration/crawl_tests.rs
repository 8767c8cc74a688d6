//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with an in-memory transport that serves
//! fixed pages per address. The final tests run the real proxy transport
//! against a wiremock server standing in for an HTTP proxy.

use async_trait::async_trait;
use onion_harvest::config::{
    AssetConfig, Config, CrawlerConfig, OutputConfig, RecrawlPolicy, StorageBackend,
    TargetConfig, TransportConfig,
};
use onion_harvest::crawler::{
    Coordinator, FetchOutcome, FetchResponse, HttpTransport, LinkExtractor, Transport,
    TransportFailure,
};
use onion_harvest::state::FailureKind;
use onion_harvest::storage::{
    ArchiveStore, FsStore, SqliteStore, StorageError, StorageResult,
};
use onion_harvest::url::Target;
use onion_harvest::HarvestError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// How the in-memory transport answers one address
#[derive(Clone)]
enum Reply {
    Page(&'static str, String),
    Fail(TransportFailure),
    /// Never answers; resolves to `Timeout` after the transport timeout
    Silent,
}

/// In-memory transport keyed by canonical address
struct ScenarioTransport {
    replies: HashMap<String, Reply>,
    timeout: Duration,
    delay: Duration,
    fetches: Mutex<HashMap<String, usize>>,
}

impl ScenarioTransport {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            timeout: Duration::from_secs(1),
            delay: Duration::ZERO,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    fn html(self, address: &str, body: &str) -> Self {
        self.reply(address, Reply::Page("text/html; charset=utf-8", body.to_string()))
    }

    fn reply(mut self, address: &str, reply: Reply) -> Self {
        self.replies.insert(address.to_string(), reply);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn fetch_count(&self, address: &str) -> usize {
        self.fetches.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    fn fetched(&self) -> HashMap<String, usize> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScenarioTransport {
    async fn fetch(&self, address: &Url) -> FetchOutcome {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.replies.get(address.as_str()) {
            Some(Reply::Page(content_type, body)) => Ok(FetchResponse::ok(
                address.clone(),
                content_type,
                body.clone().into_bytes(),
            )),
            Some(Reply::Fail(failure)) => Err(failure.clone()),
            Some(Reply::Silent) => {
                let _ = tokio::time::timeout(self.timeout, std::future::pending::<()>()).await;
                Err(TransportFailure::Timeout)
            }
            None => Err(TransportFailure::NonSuccessStatus(404)),
        }
    }
}

/// Archive that refuses every write for one site key
struct FailingSiteStore {
    inner: FsStore,
    failing_key: &'static str,
}

impl ArchiveStore for FailingSiteStore {
    fn put(&self, site_key: &str, name: &str, bytes: &[u8]) -> StorageResult<()> {
        if site_key == self.failing_key {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only site directory",
            )));
        }
        self.inner.put(site_key, name, bytes)
    }

    fn exists(&self, site_key: &str, name: &str) -> StorageResult<bool> {
        self.inner.exists(site_key, name)
    }

    fn location(&self, site_key: &str) -> String {
        self.inner.location(site_key)
    }
}

/// Creates a test configuration archiving under `dir`
fn create_test_config(dir: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            worker_pool_size: 4,
            asset_pool_size: 3,
            request_timeout_secs: 1,
            max_depth: None,
            max_pages: None,
            fetch_assets: true,
        },
        transport: TransportConfig {
            proxy_url: "socks5h://127.0.0.1:9150".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; rv:115.0) Gecko/20100101 Firefox/115.0"
                .to_string(),
            check_url: "https://check.torproject.org/".to_string(),
            check_marker: "Congratulations".to_string(),
        },
        target: TargetConfig::default(),
        output: OutputConfig {
            backend: StorageBackend::Filesystem,
            archive_dir: dir.path().join("scan").display().to_string(),
            database_path: dir.path().join("archive.db").display().to_string(),
            recrawl_policy: RecrawlPolicy::Overwrite,
            report_path: None,
        },
        assets: AssetConfig::default(),
        seeds: vec![],
    }
}

fn coordinator(config: Config, transport: Arc<ScenarioTransport>, dir: &TempDir) -> Coordinator {
    let store = Arc::new(FsStore::new(&dir.path().join("scan")).unwrap());
    Coordinator::with_components(config, transport, store)
}

fn seeds(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(|s| s.to_string()).collect()
}

const ALPHA: &str = "http://alpha.example.onion/";
const BETA: &str = "http://beta.example.onion/";
const GAMMA: &str = "http://gamma.example.onion/";

#[tokio::test]
async fn test_duplicate_links_claimed_once() {
    let dir = TempDir::new().unwrap();
    let alpha_body = r#"<html><head><title>Alpha</title></head><body>
        <a href="http://beta.example.onion/">Beta</a>
        <p>Also at http://beta.example.onion/</p>
        </body></html>"#;
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(ALPHA, alpha_body)
            .html(BETA, "<html><body>leaf</body></html>"),
    );

    // Extraction yields exactly the one canonical address
    let extractor = LinkExtractor::new(Target::onion()).unwrap();
    let links = extractor.extract_links(alpha_body.as_bytes(), &Url::parse(ALPHA).unwrap());
    let links: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
    assert_eq!(links, vec![BETA]);

    let summary = coordinator(create_test_config(&dir), transport.clone(), &dir)
        .run(&seeds(&["http://alpha.example.onion"]))
        .await
        .unwrap();

    assert_eq!(transport.fetch_count(ALPHA), 1);
    assert_eq!(transport.fetch_count(BETA), 1);
    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);

    let keys: Vec<&str> = summary.sites.iter().map(|s| s.site_key.as_str()).collect();
    assert_eq!(keys, vec!["alpha.example", "beta.example"]);
    assert!(dir.path().join("scan/alpha.example/index.html").is_file());
    assert!(dir.path().join("scan/beta.example/index.html").is_file());
}

#[tokio::test]
async fn test_equivalent_seeds_claim_one_site() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScenarioTransport::new().html(ALPHA, "<p>alpha</p>"));

    let summary = coordinator(create_test_config(&dir), transport.clone(), &dir)
        .run(&seeds(&[
            "http://alpha.example.onion",
            "HTTP://ALPHA.example.onion:80/#top",
        ]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.sites.len(), 1);
    assert_eq!(transport.fetch_count(ALPHA), 1);
}

#[tokio::test]
async fn test_untyped_and_plain_text_bodies_are_scanned() {
    for content_type in ["", "text/plain"] {
        let dir = TempDir::new().unwrap();
        let body = r#"mirrors: http://beta.example.onion/ <a href="http://gamma.example.onion/">g</a>"#;
        let transport = Arc::new(
            ScenarioTransport::new()
                .reply(ALPHA, Reply::Page(content_type, body.to_string()))
                .html(BETA, "<p>beta</p>")
                .html(GAMMA, "<p>gamma</p>"),
        );

        let summary = coordinator(create_test_config(&dir), transport.clone(), &dir)
            .run(&seeds(&[ALPHA]))
            .await
            .unwrap();

        assert_eq!(summary.claimed, 3, "content type {:?}", content_type);
        assert_eq!(transport.fetch_count(BETA), 1, "content type {:?}", content_type);
        assert_eq!(transport.fetch_count(GAMMA), 1, "content type {:?}", content_type);
    }
}

#[tokio::test]
async fn test_timeout_does_not_block_other_addresses() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(
                ALPHA,
                r#"<a href="http://silent.example.onion/">s</a>
                   <a href="http://beta.example.onion/">b</a>
                   <a href="http://gamma.example.onion/">g</a>
                   <a href="http://refused.example.onion/">r</a>"#,
            )
            .reply("http://silent.example.onion/", Reply::Silent)
            .reply(
                "http://refused.example.onion/",
                Reply::Fail(TransportFailure::Refused),
            )
            .html(BETA, "<p>beta</p>")
            .html(GAMMA, "<p>gamma</p>"),
    );

    let started = Instant::now();
    let summary = coordinator(create_test_config(&dir), transport, &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.claimed, 5);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failures_of(FailureKind::Timeout), 1);
    assert_eq!(summary.failures_of(FailureKind::Refused), 1);
    assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
}

#[tokio::test]
async fn test_unrecognized_asset_content_type_skipped() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(
                ALPHA,
                r#"<img src="/logo.png"><script src="/blob.bin"></script>"#,
            )
            .reply(
                "http://alpha.example.onion/logo.png",
                Reply::Page("image/png", "PNG".to_string()),
            )
            .reply(
                "http://alpha.example.onion/blob.bin",
                Reply::Page("application/x-unknown", "??".to_string()),
            ),
    );

    let summary = coordinator(create_test_config(&dir), transport, &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.assets.stored, 1);
    assert_eq!(summary.assets.skipped, 1);
    assert_eq!(summary.assets.failed, 0);

    let stored_png = std::fs::read_dir(dir.path().join("scan/alpha.example"))
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.starts_with("asset-") && name.ends_with(".png")
        });
    assert!(stored_png);
}

#[tokio::test]
async fn test_storage_failure_still_follows_links() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(ALPHA, r#"<a href="http://beta.example.onion/">b</a>"#)
            .html(BETA, "<p>beta</p>"),
    );
    let store = Arc::new(FailingSiteStore {
        inner: FsStore::new(&dir.path().join("scan")).unwrap(),
        failing_key: "alpha.example",
    });

    let summary = Coordinator::with_components(create_test_config(&dir), transport.clone(), store)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures_of(FailureKind::Storage), 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(transport.fetch_count(BETA), 1);
}

#[tokio::test]
async fn test_max_depth_one_is_single_hop() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(ALPHA, r#"<a href="http://beta.example.onion/">b</a>"#)
            .html(BETA, r#"<a href="http://gamma.example.onion/">g</a>"#)
            .html(GAMMA, "<p>gamma</p>"),
    );
    let mut config = create_test_config(&dir);
    config.crawler.max_depth = Some(1);

    let summary = coordinator(config, transport.clone(), &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.depth_skipped, 1);
    assert_eq!(transport.fetch_count(GAMMA), 0);
}

#[tokio::test]
async fn test_transitive_expansion_by_default() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(ALPHA, r#"<a href="http://beta.example.onion/">b</a>"#)
            .html(BETA, r#"<a href="http://gamma.example.onion/">g</a>"#)
            .html(GAMMA, r#"<a href="http://alpha.example.onion/">a</a>"#),
    );

    let summary = coordinator(create_test_config(&dir), transport.clone(), &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 3);
    assert_eq!(transport.fetch_count(GAMMA), 1);
    assert_eq!(transport.fetch_count(ALPHA), 1);
}

#[tokio::test]
async fn test_cancel_stops_new_claims() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(
                ALPHA,
                r#"<a href="http://beta.example.onion/">b</a><a href="http://gamma.example.onion/">g</a>"#,
            )
            .html(BETA, "<p>beta</p>")
            .html(GAMMA, "<p>gamma</p>")
            .with_delay(Duration::from_millis(300)),
    );
    let coordinator = coordinator(create_test_config(&dir), transport.clone(), &dir);
    let cancel = coordinator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let summary = coordinator.run(&seeds(&[ALPHA])).await.unwrap();

    // The seed in flight at the stop completes; nothing new is claimed
    assert!(summary.cancelled);
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.dropped, 2);
    assert_eq!(transport.fetch_count(BETA), 0);
}

#[tokio::test]
async fn test_dispatched_set_equals_claimed_set() {
    let dir = TempDir::new().unwrap();

    // Ring of 30 sites, each linking to the next three and back to the first
    let mut transport = ScenarioTransport::new().with_delay(Duration::from_millis(5));
    for i in 0..30 {
        let links: String = (1..=3)
            .map(|step| {
                format!(
                    r#"<a href="http://site{}.onion/">n</a>"#,
                    (i + step) % 30
                )
            })
            .chain(std::iter::once(
                r#"<a href="http://site0.onion">home</a>"#.to_string(),
            ))
            .collect();
        transport = transport.html(&format!("http://site{}.onion/", i), &links);
    }
    let transport = Arc::new(transport);
    let mut config = create_test_config(&dir);
    config.crawler.worker_pool_size = 6;
    config.crawler.fetch_assets = false;

    let summary = coordinator(config, transport.clone(), &dir)
        .run(&seeds(&["http://site0.onion/", "http://site0.onion"]))
        .await
        .unwrap();

    let fetched = transport.fetched();
    assert_eq!(fetched.len(), 30);
    assert!(fetched.values().all(|&count| count == 1), "{:?}", fetched);
    assert_eq!(summary.claimed, fetched.len());
    assert_eq!(summary.succeeded + summary.failed, summary.claimed);
}

#[tokio::test]
async fn test_max_pages_caps_claims() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(
                ALPHA,
                r#"<a href="http://beta.example.onion/">b</a><a href="http://gamma.example.onion/">g</a>"#,
            )
            .html(BETA, "<p>beta</p>")
            .html(GAMMA, "<p>gamma</p>"),
    );
    let mut config = create_test_config(&dir);
    config.crawler.max_pages = Some(2);

    let summary = coordinator(config, transport, &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.dropped, 1);
}

#[tokio::test]
async fn test_runs_do_not_share_state() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScenarioTransport::new().html(ALPHA, "<p>alpha</p>"));
    let coordinator = coordinator(create_test_config(&dir), transport.clone(), &dir);

    let first = coordinator.run(&seeds(&[ALPHA])).await.unwrap();
    let second = coordinator.run(&seeds(&[ALPHA])).await.unwrap();

    assert_eq!(first.claimed, 1);
    assert_eq!(second.claimed, 1);
    assert_eq!(transport.fetch_count(ALPHA), 2);
}

#[tokio::test]
async fn test_skip_policy_keeps_first_archive() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.output.recrawl_policy = RecrawlPolicy::Skip;

    let first = Arc::new(ScenarioTransport::new().html(ALPHA, "first"));
    coordinator(config.clone(), first, &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    let second = Arc::new(ScenarioTransport::new().html(ALPHA, "second"));
    let summary = coordinator(config, second, &dir)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert!(!summary.sites[0].written);
    let content = std::fs::read_to_string(dir.path().join("scan/alpha.example/index.html")).unwrap();
    assert_eq!(content, "first");
}

#[tokio::test]
async fn test_sqlite_backend() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScenarioTransport::new()
            .html(ALPHA, r#"<a href="http://beta.example.onion/about">b</a>"#)
            .html("http://beta.example.onion/about", "<p>beta</p>"),
    );
    let store = Arc::new(SqliteStore::new(&dir.path().join("archive.db")).unwrap());

    let summary =
        Coordinator::with_components(create_test_config(&dir), transport, store.clone())
            .run(&seeds(&[ALPHA]))
            .await
            .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(
        store.get("alpha.example", "index.html").unwrap().as_deref(),
        Some(&b"<a href=\"http://beta.example.onion/about\">b</a>"[..])
    );
    let beta_names = store.list("beta.example").unwrap();
    assert_eq!(beta_names.len(), 1);
    assert!(beta_names[0].starts_with("page-"));
}

#[tokio::test]
async fn test_no_usable_seeds_is_an_error() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScenarioTransport::new());

    let result = coordinator(create_test_config(&dir), transport, &dir)
        .run(&seeds(&["https://example.com/", "not a url"]))
        .await;

    assert!(matches!(result, Err(HarvestError::NoSeeds)));
}

#[tokio::test]
async fn test_http_transport_through_proxy() {
    // wiremock plays the HTTP proxy; requests arrive in absolute form
    let proxy = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("host", "alpha.example.onion"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Alpha</title></head><body>
                    <a href="http://beta.example.onion/">Beta</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    Mock::given(method("GET"))
        .and(header("host", "beta.example.onion"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&proxy)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.transport.proxy_url = proxy.uri();
    config.crawler.request_timeout_secs = 5;

    let transport = HttpTransport::new(&config.transport, Duration::from_secs(5)).unwrap();
    let store = Arc::new(FsStore::new(&dir.path().join("scan")).unwrap());
    let summary = Coordinator::with_components(config, Arc::new(transport), store)
        .run(&seeds(&[ALPHA]))
        .await
        .unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures_of(FailureKind::Status), 1);
    assert!(dir.path().join("scan/alpha.example/index.html").is_file());
}
