//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use linkdump::config::Config;
use linkdump::crawler::Coordinator;
use linkdump::output::{list_pages, read_page};
use linkdump::state::TaskState;
use linkdump::storage::{CrawlStore, RunStatus, SqliteStore};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing pages into `output_dir`
fn create_test_config(output_dir: &Path, max_depth: u32) -> Config {
    let mut config = Config::default();
    config.crawler.max_depth = max_depth;
    config.crawler.parallelism = 4;
    config.crawler.per_host_delay_ms = 0; // No politeness delay against the mock server
    config.crawler.per_host_concurrency = 2;
    config.crawler.fetch_timeout_ms = 5_000;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.user_agent.crawler_version = "1.0.0".to_string();
    config.output.output_dir = output_dir.to_path_buf();
    config
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

fn redirect(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).insert_header("location", location)
}

async fn mount_redirect(server: &MockServer, route: &str, status: u16, location: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(redirect(status, location))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

fn seed_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn test_single_page_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body>No links here</body></html>").await;

    let dir = TempDir::new().unwrap();
    let seed = seed_url(&server, "/");

    let stats = Coordinator::new(create_test_config(dir.path(), 3))
        .run(&seed)
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.pages_persisted, 1);
    assert_eq!(stats.links_enqueued, 0);

    let pages = list_pages(dir.path()).await.unwrap();
    assert_eq!(pages.len(), 1);

    let page = read_page(&pages[0]).await.unwrap();
    assert_eq!(page.source_url, seed.as_str());
    assert_eq!(page.depth, 0);
    assert_eq!(page.status_code, 200);
    assert_eq!(page.raw_content, b"<html><body>No links here</body></html>");
}

#[tokio::test]
async fn test_cycle_terminates() {
    let server = MockServer::start().await;
    mount_page(&server, "/a", r#"<a href="/b">B</a>"#).await;
    mount_page(&server, "/b", r#"<a href="/a">A</a><a href="./a#top">A again</a>"#).await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 5))
        .run(&seed_url(&server, "/a"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);
    assert_eq!(list_pages(dir.path()).await.unwrap().len(), 2);

    // Every URL is fetched exactly once
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/d1">1</a>"#).await;
    mount_page(&server, "/d1", r#"<a href="/d2">2</a>"#).await;
    mount_page(&server, "/d2", r#"<a href="/d3">3</a>"#).await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 1))
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);

    let mut depths = Vec::new();
    for page in list_pages(dir.path()).await.unwrap() {
        depths.push(read_page(&page).await.unwrap().depth);
    }
    depths.sort();
    assert_eq!(depths, vec![0, 1]);
}

#[tokio::test]
async fn test_max_depth_zero_fetches_only_seed() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">next</a>"#).await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 0))
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 1);
    assert_eq!(stats.links_discovered, 0);
}

#[tokio::test]
async fn test_http_errors_are_not_persisted_and_not_fatal() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/missing">404</a><a href="/broken">500</a><a href="/fine">ok</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/fine", "fine").await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 2))
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);
    assert_eq!(stats.fetch_failures.get("http-status"), Some(&2));
    assert_eq!(list_pages(dir.path()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_allowed_domains_keep_off_site_links_out() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/local">local</a><a href="https://elsewhere.invalid/page">away</a>"#,
    )
    .await;
    mount_page(&server, "/local", "local page").await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 2);
    config.crawler.allowed_domains = vec!["127.0.0.1".to_string()];

    let stats = Coordinator::new(config)
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);
    assert_eq!(stats.skipped_by_policy, 1);
    assert!(stats.fetch_failures.is_empty());
}

#[tokio::test]
async fn test_non_html_is_persisted_without_following_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/should-not-follow">x</a>"#, "text/plain"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 3))
        .run(&seed_url(&server, "/doc"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 1);
    assert_eq!(stats.links_discovered, 0);

    let page = read_page(&list_pages(dir.path()).await.unwrap()[0])
        .await
        .unwrap();
    assert_eq!(page.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 8 * 1024]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 1);
    config.crawler.max_body_bytes = 1024;

    let stats = Coordinator::new(config)
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 0);
    assert_eq!(stats.fetch_failures.get("too-large"), Some(&1));
}

#[tokio::test]
async fn test_page_budget() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/1">1</a><a href="/2">2</a><a href="/3">3</a><a href="/4">4</a>"#,
    )
    .await;
    for route in ["/1", "/2", "/3", "/4"] {
        mount_page(&server, route, "leaf").await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 2);
    config.crawler.max_pages = Some(3);

    let stats = Coordinator::new(config)
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 3);
    assert_eq!(stats.links_enqueued, 2);
}

#[tokio::test]
async fn test_off_site_redirect_is_not_fetched() {
    let server = MockServer::start().await;
    let port = server.address().port();
    mount_page(&server, "/", r#"<a href="/r">r</a>"#).await;
    mount_redirect(&server, "/r", 302, &format!("http://localhost:{}/off", port)).await;
    Mock::given(method("GET"))
        .and(path("/off"))
        .respond_with(html_page("OFF-SITE"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 3);
    config.crawler.allowed_domains = vec!["127.0.0.1".to_string()];

    let stats = Coordinator::new(config)
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 1);
    assert_eq!(stats.skipped_by_policy, 1);
    assert_eq!(stats.redirects_enqueued, 0);
    for page in list_pages(dir.path()).await.unwrap() {
        assert_ne!(read_page(&page).await.unwrap().raw_content, b"OFF-SITE");
    }
}

#[tokio::test]
async fn test_redirect_to_visited_url_is_not_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/old">old</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    mount_redirect(&server, "/old", 301, "/").await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 3))
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 1);
    assert_eq!(stats.redirects_enqueued, 0);
    assert_eq!(list_pages(dir.path()).await.unwrap().len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_redirect_target_is_crawled_at_same_depth() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/old">old</a>"#).await;
    mount_redirect(&server, "/old", 301, "/new").await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_page("moved here"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let stats = Coordinator::new(create_test_config(dir.path(), 1))
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);
    assert_eq!(stats.links_enqueued, 1);
    assert_eq!(stats.redirects_enqueued, 1);

    let mut moved = None;
    for page in list_pages(dir.path()).await.unwrap() {
        let page = read_page(&page).await.unwrap();
        if page.raw_content == b"moved here" {
            moved = Some(page);
        }
    }
    let moved = moved.expect("redirect target was persisted");
    assert_eq!(moved.source_url, seed_url(&server, "/new").as_str());
    assert_eq!(moved.depth, 1);
}

#[tokio::test]
async fn test_redirect_to_equivalent_url_is_followed_in_place() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/docs", 301, "/docs/").await;
    mount_page(&server, "/docs/", r#"<a href="intro">intro</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs/intro"))
        .respond_with(html_page("intro"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = seed_url(&server, "/docs");
    let stats = Coordinator::new(create_test_config(dir.path(), 2))
        .run(&seed)
        .await
        .unwrap();

    assert_eq!(stats.pages_persisted, 2);
    assert_eq!(stats.redirects_enqueued, 0);

    let mut index = None;
    for page in list_pages(dir.path()).await.unwrap() {
        let page = read_page(&page).await.unwrap();
        if page.depth == 0 {
            index = Some(page);
        }
    }
    let index = index.expect("seed page was persisted");
    assert_eq!(index.source_url, seed.as_str());
    assert_eq!(index.final_url, seed_url(&server, "/docs/").as_str());
}

#[tokio::test]
async fn test_per_host_delay_spaces_fetches() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/1">1</a><a href="/2">2</a>"#).await;
    mount_page(&server, "/1", "one").await;
    mount_page(&server, "/2", "two").await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), 1);
    config.crawler.per_host_delay_ms = 300;

    let started = Instant::now();
    let stats = Coordinator::new(config)
        .run(&seed_url(&server, "/"))
        .await
        .unwrap();

    // Three fetch starts on one host need at least two full delays between them
    assert_eq!(stats.pages_persisted, 3);
    assert!(started.elapsed() >= Duration::from_millis(600));
}

#[tokio::test]
async fn test_cancel_during_fetch_abandons_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("too slow").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");
    let out = dir.path().join("out");
    let mut config = create_test_config(&out, 3);
    config.crawler.fetch_timeout_ms = 30_000;

    let coordinator = Coordinator::new(config).with_store(SqliteStore::new(&db).unwrap());
    let shutdown = coordinator.shutdown_token();
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
    };

    let seed = seed_url(&server, "/");
    let started = Instant::now();
    let (stats, ()) = tokio::join!(coordinator.run(&seed), cancel);
    let stats = stats.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(stats.cancelled);
    assert_eq!(stats.pages_persisted, 0);
    assert!(stats.fetch_failures.is_empty());
    assert!(list_pages(&out).await.unwrap().is_empty());

    let store = SqliteStore::new(&db).unwrap();
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Interrupted
    );
    let pending = store.load_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, seed.as_str());
}

#[tokio::test]
async fn test_cancelled_before_start_persists_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">next</a>"#).await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(dir.path(), 3));
    coordinator.shutdown_token().cancel();

    let stats = coordinator.run(&seed_url(&server, "/")).await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.pages_persisted, 0);
    assert!(list_pages(dir.path()).await.unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_is_marked_interrupted() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "seed").await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");

    let coordinator = Coordinator::new(create_test_config(&dir.path().join("out"), 3))
        .with_store(SqliteStore::new(&db).unwrap());
    coordinator.shutdown_token().cancel();
    coordinator.run(&seed_url(&server, "/")).await.unwrap();

    let store = SqliteStore::new(&db).unwrap();
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);

    let pending = store.load_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].depth, 0);
}

#[tokio::test]
async fn test_resume_fetches_only_pending_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/done">d</a><a href="/todo">t</a>"#))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/done"))
        .respond_with(html_page("already fetched"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/todo"))
        .respond_with(html_page(r#"<a href="/">home</a><a href="/new">new</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_page("new page"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");
    let seed = seed_url(&server, "/");

    // An earlier run that was interrupted after fetching "/" and "/done"
    {
        let mut store = SqliteStore::new(&db).unwrap();
        let run_id = store.create_run("hash", seed.as_str()).unwrap();
        for (route, depth) in [("/", 0), ("/done", 1), ("/todo", 1)] {
            store
                .record_task(seed_url(&server, route).as_str(), depth, run_id)
                .unwrap();
        }
        store
            .update_task_state(seed.as_str(), TaskState::Done, None)
            .unwrap();
        store
            .update_task_state(seed_url(&server, "/done").as_str(), TaskState::Done, None)
            .unwrap();
        store.finish_run(run_id, RunStatus::Interrupted).unwrap();
    }

    let stats = Coordinator::new(create_test_config(&dir.path().join("out"), 3))
        .with_store(SqliteStore::new(&db).unwrap())
        .run(&seed)
        .await
        .unwrap();

    assert_eq!(stats.resumed_tasks, 1);
    assert_eq!(stats.pages_persisted, 2);

    let store = SqliteStore::new(&db).unwrap();
    assert!(store.load_pending().unwrap().is_empty());
    assert_eq!(store.count_tasks_by_state(TaskState::Done).unwrap(), 4);
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_fresh_ignores_interrupted_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "seed page").await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("crawl.db");
    let seed = seed_url(&server, "/");

    {
        let mut store = SqliteStore::new(&db).unwrap();
        let run_id = store.create_run("hash", seed.as_str()).unwrap();
        store.record_task(seed.as_str(), 0, run_id).unwrap();
        store
            .update_task_state(seed.as_str(), TaskState::Done, None)
            .unwrap();
        store.finish_run(run_id, RunStatus::Interrupted).unwrap();
    }

    let stats = Coordinator::new(create_test_config(&dir.path().join("out"), 3))
        .with_store(SqliteStore::new(&db).unwrap())
        .fresh(true)
        .run(&seed)
        .await
        .unwrap();

    assert_eq!(stats.resumed_tasks, 0);
    assert_eq!(stats.pages_persisted, 1);
}
