//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the crossword site and run the
//! sitemap walk and extraction end-to-end against a real SQLite store.

use crossword_harvest::config::{Config, FetcherConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crossword_harvest::crawler::{
    build_http_client, fetch_with_backoff, harvest, AttemptError, ClueAnswer, Coordinator,
    FetchResult, RetryPolicy, RunSummary,
};
use crossword_harvest::storage::{
    CrosswordPageRecord, RunRecord, RunStatus, SitemapRecord, SqliteStorage, Storage,
    StorageError, StorageResult,
};
use crossword_harvest::HarvestError;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BACKOFF_MS: u64 = 5;

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
        },
        fetcher: FetcherConfig {
            max_retries: 3,
            backoff_base_ms: BACKOFF_MS,
            timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: None,
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn sitemap_index(base_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{base}/post-sitemap.xml</loc></sitemap>
  <sitemap><loc>{base}/post-sitemap2.xml</loc></sitemap>
  <sitemap><loc>{base}/page-sitemap.xml</loc></sitemap>
  <sitemap><loc>{base}/category-sitemap.xml</loc></sitemap>
</sitemapindex>"#,
        base = base_url
    )
}

fn urlset(locations: &[String]) -> String {
    let entries: String = locations
        .iter()
        .map(|loc| format!("  <url><loc>{}</loc></url>\n", loc))
        .collect();
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>"
        ),
        entries
    )
}

const CROSSWORD_PAGE: &str = r#"<html><head><title>NYT Crossword Answers</title></head><body>
<div class="nywrap">
  <ul>
    <li><a href="/clue/capital-of-france">Capital of France</a><span>PARIS</span></li>
    <li><a href="/clue/opposite-of-nay">Opposite of nay</a><span>YEA</span></li>
  </ul>
</div>
</body></html>"#;

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mounts the sitemaps of a small site: two post sitemaps, one of which lists
/// a single crossword page plus an unrelated post
async fn mount_sitemaps(server: &MockServer) {
    let base_url = server.uri();
    mount_xml(server, "/sitemap_index.xml", sitemap_index(&base_url)).await;
    mount_xml(
        server,
        "/post-sitemap.xml",
        urlset(&[
            format!("{}/nyt-crossword-answers-05-01-24/", base_url),
            format!("{}/about-this-site/", base_url),
        ]),
    )
    .await;
    mount_xml(server, "/post-sitemap2.xml", urlset(&[])).await;
}

/// Mounts the small site including its crossword page
async fn mount_site(server: &MockServer) {
    mount_sitemaps(server).await;
    mount_html(server, "/nyt-crossword-answers-05-01-24/", CROSSWORD_PAGE).await;
}

#[tokio::test]
async fn test_full_harvest_single_page() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), ":unused:");
    let storage = SqliteStorage::new_in_memory().expect("Failed to create storage");
    let mut coordinator = Coordinator::new(&config, storage).expect("Failed to create coordinator");

    let mut summary = RunSummary::default();

    // Phase 1: only the two post sitemaps are kept
    coordinator
        .discover_sitemaps(&mut summary)
        .await
        .expect("Sitemap discovery failed");
    assert_eq!(summary.sitemaps_discovered, 2);
    let storage = coordinator.storage();
    assert_eq!(storage.count_sitemap_entries(None).unwrap(), 2);
    assert_eq!(storage.count_sitemap_entries(Some(false)).unwrap(), 2);

    // Phase 2: one crossword page, keyed by its date
    coordinator
        .discover_pages(&mut summary)
        .await
        .expect("Page discovery failed");
    assert_eq!(summary.sitemaps_processed, 2);
    assert_eq!(summary.pages_discovered, 1);
    let storage = coordinator.storage();
    assert_eq!(storage.count_sitemap_entries(Some(false)).unwrap(), 0);
    let page = storage
        .get_crossword_page_by_date("05-01-24")
        .unwrap()
        .expect("Page should be stored");
    assert_eq!(
        page.url,
        format!("{}/nyt-crossword-answers-05-01-24/", mock_server.uri())
    );
    assert!(!page.processed);

    // Phase 3: both pairs recorded, page done
    coordinator
        .extract_pages(&mut summary)
        .await
        .expect("Extraction failed");
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.pairs_recorded, 2);

    let storage = coordinator.storage();
    assert_eq!(storage.count_clues().unwrap(), 2);
    assert_eq!(storage.count_answers().unwrap(), 2);
    assert_eq!(storage.count_clue_answer_links().unwrap(), 2);
    assert_eq!(storage.count_date_links().unwrap(), (2, 2));
    let page = storage.get_crossword_page_by_date("05-01-24").unwrap().unwrap();
    assert!(page.processed);
}

#[tokio::test]
async fn test_run_records_completed_status() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), ":unused:");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(&config, storage)
        .unwrap()
        .with_config_hash("test-hash");

    let summary = coordinator.run().await.expect("Run failed");
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.pages_failed, 0);

    let run = coordinator.storage().get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crossword.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    let first = harvest(&config, false, "hash").await.expect("First run failed");
    assert_eq!(first.pages_processed, 1);

    let second = harvest(&config, false, "hash").await.expect("Second run failed");
    assert_eq!(second.sitemaps_discovered, 0);
    assert_eq!(second.pages_discovered, 0);
    assert_eq!(second.pages_processed, 0);
    assert_eq!(second.pairs_recorded, 0);

    let storage = SqliteStorage::open_or_create(&db_path, false).unwrap();
    assert_eq!(storage.count_sitemap_entries(None).unwrap(), 2);
    assert_eq!(storage.count_crossword_pages(None).unwrap(), 1);
    assert_eq!(storage.count_clues().unwrap(), 2);
    assert_eq!(storage.count_answers().unwrap(), 2);
    assert_eq!(storage.count_clue_answer_links().unwrap(), 2);
}

#[tokio::test]
async fn test_rebuild_starts_over() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crossword.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    harvest(&config, false, "hash").await.expect("First run failed");
    let rebuilt = harvest(&config, true, "hash").await.expect("Rebuild failed");

    assert_eq!(rebuilt.sitemaps_discovered, 2);
    assert_eq!(rebuilt.pages_discovered, 1);
    assert_eq!(rebuilt.pages_processed, 1);
}

#[tokio::test]
async fn test_backoff_gives_up_after_max_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(BACKOFF_MS));
    let url = format!("{}/always-broken", mock_server.uri());

    let start = Instant::now();
    let result = fetch_with_backoff(&client, &url, &policy).await;
    let elapsed = start.elapsed();

    match result {
        FetchResult::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, AttemptError::Status(500));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }

    // Two sleeps: base and 2 * base
    assert!(elapsed >= Duration::from_millis(3 * BACKOFF_MS));
}

#[tokio::test]
async fn test_backoff_recovers_after_transient_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/flaky", "ok").await;

    let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5)).unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(BACKOFF_MS));
    let url = format!("{}/flaky", mock_server.uri());

    match fetch_with_backoff(&client, &url, &policy).await {
        FetchResult::Success {
            status_code, body, ..
        } => {
            assert_eq!(status_code, 200);
            assert_eq!(body, "ok");
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_page_without_container_stays_unprocessed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_xml(&mock_server, "/sitemap_index.xml", sitemap_index(&base_url)).await;
    mount_xml(
        &mock_server,
        "/post-sitemap.xml",
        urlset(&[format!("{}/nyt-crossword-answers-06-01-24/", base_url)]),
    )
    .await;
    mount_xml(&mock_server, "/post-sitemap2.xml", urlset(&[])).await;
    mount_html(
        &mock_server,
        "/nyt-crossword-answers-06-01-24/",
        "<html><body><p>Answers coming soon</p></body></html>",
    )
    .await;

    let config = create_test_config(&base_url, ":unused:");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(&config, storage).unwrap();

    let summary = coordinator.run().await.expect("Run should complete");
    assert_eq!(summary.pages_discovered, 1);
    assert_eq!(summary.pages_processed, 0);
    assert_eq!(summary.pages_failed, 1);

    let storage = coordinator.storage();
    assert_eq!(storage.count_crossword_pages(Some(false)).unwrap(), 1);
    assert_eq!(storage.count_clues().unwrap(), 0);
}

#[tokio::test]
async fn test_failing_sitemap_is_left_for_next_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_xml(&mock_server, "/sitemap_index.xml", sitemap_index(&base_url)).await;
    mount_status(&mock_server, "/post-sitemap.xml", 500).await;
    mount_xml(
        &mock_server,
        "/post-sitemap2.xml",
        urlset(&[format!("{}/nyt-crossword-answers-05-01-24/", base_url)]),
    )
    .await;
    mount_html(&mock_server, "/nyt-crossword-answers-05-01-24/", CROSSWORD_PAGE).await;

    let config = create_test_config(&base_url, ":unused:");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(&config, storage).unwrap();

    let summary = coordinator.run().await.expect("Run should complete");
    assert_eq!(summary.sitemaps_processed, 1);
    assert_eq!(summary.sitemaps_failed, 1);
    assert_eq!(summary.pages_processed, 1);

    let pending = coordinator.storage().list_unprocessed_sitemap_entries().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, format!("{}/post-sitemap.xml", base_url));
}

#[tokio::test]
async fn test_unavailable_sitemap_index_fails_run() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap_index.xml"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), ":unused:");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(&config, storage).unwrap();

    let result = coordinator.run().await;
    match result {
        Err(HarvestError::RootSitemapUnavailable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RootSitemapUnavailable, got {:?}", other),
    }

    let storage = coordinator.storage();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(storage.count_sitemap_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_failed_page_fetch_is_retried_next_run() {
    let mock_server = MockServer::start().await;
    mount_sitemaps(&mock_server).await;

    let broken_page = Mock::given(method("GET"))
        .and(path("/nyt-crossword-answers-05-01-24/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount_as_scoped(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), ":unused:");
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(&config, storage).unwrap();

    let first = coordinator.run().await.expect("Run should complete");
    assert_eq!(first.pages_discovered, 1);
    assert_eq!(first.pages_processed, 0);
    assert_eq!(first.pages_failed, 1);
    assert_eq!(coordinator.storage().count_crossword_pages(Some(false)).unwrap(), 1);
    assert_eq!(coordinator.storage().count_clues().unwrap(), 0);

    // Checks the three attempts and unmounts the failing endpoint
    drop(broken_page);
    mount_html(&mock_server, "/nyt-crossword-answers-05-01-24/", CROSSWORD_PAGE).await;

    let second = coordinator.run().await.expect("Run should complete");
    assert_eq!(second.pages_discovered, 0);
    assert_eq!(second.pages_processed, 1);
    assert_eq!(second.pages_failed, 0);

    let storage = coordinator.storage();
    assert_eq!(storage.count_crossword_pages(Some(false)).unwrap(), 0);
    assert_eq!(storage.count_clues().unwrap(), 2);
    assert_eq!(storage.count_answers().unwrap(), 2);
}

/// A store that rejects the page written for one date
struct RejectingStorage {
    inner: SqliteStorage,
    rejected_date: String,
}

impl Storage for RejectingStorage {
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.create_run(config_hash)
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.inner.get_run(run_id)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.inner.finish_run(run_id, status)
    }

    fn insert_sitemap_entry(&mut self, url: &str, processed: bool) -> StorageResult<bool> {
        self.inner.insert_sitemap_entry(url, processed)
    }

    fn list_unprocessed_sitemap_entries(&self) -> StorageResult<Vec<SitemapRecord>> {
        self.inner.list_unprocessed_sitemap_entries()
    }

    fn mark_sitemap_processed(&mut self, id: i64) -> StorageResult<()> {
        self.inner.mark_sitemap_processed(id)
    }

    fn insert_crossword_page(
        &mut self,
        url: &str,
        processed: bool,
        date: &str,
    ) -> StorageResult<bool> {
        self.inner.insert_crossword_page(url, processed, date)
    }

    fn list_unprocessed_crossword_pages(&self) -> StorageResult<Vec<CrosswordPageRecord>> {
        self.inner.list_unprocessed_crossword_pages()
    }

    fn get_crossword_page_by_date(&self, date: &str) -> StorageResult<Option<CrosswordPageRecord>> {
        self.inner.get_crossword_page_by_date(date)
    }

    fn mark_crossword_page_processed(&mut self, id: i64) -> StorageResult<()> {
        self.inner.mark_crossword_page_processed(id)
    }

    fn record_clue_answer(&mut self, clue: &str, answer: &str, page_id: i64) -> StorageResult<()> {
        self.inner.record_clue_answer(clue, answer, page_id)
    }

    fn record_page(&mut self, page_id: i64, pairs: &[ClueAnswer]) -> StorageResult<()> {
        let rejected = self.inner.get_crossword_page_by_date(&self.rejected_date)?;
        if rejected.map(|page| page.id) == Some(page_id) {
            return Err(StorageError::Write("page rejected".to_string()));
        }
        self.inner.record_page(page_id, pairs)
    }

    fn count_sitemap_entries(&self, processed: Option<bool>) -> StorageResult<u64> {
        self.inner.count_sitemap_entries(processed)
    }

    fn count_crossword_pages(&self, processed: Option<bool>) -> StorageResult<u64> {
        self.inner.count_crossword_pages(processed)
    }

    fn count_clues(&self) -> StorageResult<u64> {
        self.inner.count_clues()
    }

    fn count_answers(&self) -> StorageResult<u64> {
        self.inner.count_answers()
    }

    fn count_clue_answer_links(&self) -> StorageResult<u64> {
        self.inner.count_clue_answer_links()
    }

    fn count_date_links(&self) -> StorageResult<(u64, u64)> {
        self.inner.count_date_links()
    }
}

#[tokio::test]
async fn test_write_failure_skips_only_that_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_xml(&mock_server, "/sitemap_index.xml", sitemap_index(&base_url)).await;
    mount_xml(
        &mock_server,
        "/post-sitemap.xml",
        urlset(&[
            format!("{}/nyt-crossword-answers-05-01-24/", base_url),
            format!("{}/nyt-crossword-answers-06-01-24/", base_url),
        ]),
    )
    .await;
    mount_xml(&mock_server, "/post-sitemap2.xml", urlset(&[])).await;
    mount_html(&mock_server, "/nyt-crossword-answers-05-01-24/", CROSSWORD_PAGE).await;
    mount_html(&mock_server, "/nyt-crossword-answers-06-01-24/", CROSSWORD_PAGE).await;

    let config = create_test_config(&base_url, ":unused:");
    let storage = RejectingStorage {
        inner: SqliteStorage::new_in_memory().unwrap(),
        rejected_date: "05-01-24".to_string(),
    };
    let mut coordinator = Coordinator::new(&config, storage).unwrap();

    let summary = coordinator.run().await.expect("Run should complete");
    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.pairs_recorded, 2);

    let storage = coordinator.storage();
    let rejected = storage.get_crossword_page_by_date("05-01-24").unwrap().unwrap();
    let accepted = storage.get_crossword_page_by_date("06-01-24").unwrap().unwrap();
    assert!(!rejected.processed);
    assert!(accepted.processed);
    assert_eq!(storage.count_date_links().unwrap(), (2, 2));

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}
