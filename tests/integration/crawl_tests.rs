//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, from config text to stored records.

use review_cascade::config::{parse_config, Config};
use review_cascade::crawler::run_crawl;
use review_cascade::output::{export_records, generate_summary};
use review_cascade::state::{CrawlLevel, PageState};
use review_cascade::storage::{RunStatus, SqliteStorage, Storage};
use review_cascade::FieldValue;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated config pointed at the mock server
fn create_test_config(base_url: &str, db_path: &str, max_page_listing: u32) -> Config {
    let content = format!(
        r#"
[crawler]
start-url = "{base_url}/list"
max-page-listing = {max_page_listing}
max-page-entity = 5
worker-count = 3
retries = 1
retry-delay-ms = 10

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"
summary-path = "./test_summary.md"
channel-capacity = 2

[listing]
links = "restaurants"

[listing.pagination]
next-url = "a.nav.next::attr(href)"
next-number = "a.nav.next::attr(data-page-number)"

[[listing.rules]]
name = "restaurants"
mode = "all-matches"
selector = "div.listing a::attr(href)"

[entity]
links = "reviews"

[entity.pagination]
next-url = "a.nav.next::attr(href)"
next-number = "a.nav.next::attr(data-page-number)"

[[entity.rules]]
name = "price"
selector = "div.header_links a::text"

[[entity.rules]]
name = "type"
mode = "all-matches"
selector = "div.header_links a::text"
skip = 1

[[entity.rules]]
name = "reviews"
mode = "all-matches"
selector = "div.quote a::attr(href)"

[[detail.rules]]
name = "name"
selector = "a.HEADING::text"

[[detail.rules]]
name = "rating"
mode = "first-non-empty-of"
selectors = [
    "span.bubble_50::attr(alt)",
    "span.bubble_40::attr(alt)",
    "span.bubble_30::attr(alt)",
    "span.bubble_20::attr(alt)",
]

[[detail.rules]]
name = "review"
selector = "p.partial_entry::text"
"#
    );

    parse_config(&content).expect("test config should be valid")
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn review_page(name: &str, bubble: u32, text: &str) -> String {
    format!(
        r#"<html><body>
        <a class="HEADING">{name}</a>
        <span class="ui_bubble_rating bubble_{bubble}" alt="{rating} of 5 bubbles"></span>
        <p class="partial_entry">{text}</p>
        </body></html>"#,
        rating = bubble / 10
    )
}

#[tokio::test]
async fn test_full_crawl_stores_records_with_entity_context() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    mount_page(
        &mock_server,
        "/list",
        r#"<html><body>
        <div class="listing"><a href="/resto1">Trattoria</a></div>
        <a class="nav next" href="/list?page=2" data-page-number="2">Next</a>
        </body></html>"#
            .to_string(),
    )
    .await;

    mount_page(
        &mock_server,
        "/resto1",
        r#"<html><body>
        <div class="header_links"><a>££ - £££</a><a>Italian</a><a>Vegetarian Friendly</a></div>
        <div class="quote"><a href="/rev1">Lovely</a></div>
        <div class="quote"><a href="/rev2">Slow</a></div>
        <a class="nav next" href="/resto1-or10" data-page-number="2">Next</a>
        </body></html>"#
            .to_string(),
    )
    .await;

    // Continuation page: no header, same logical entity
    mount_page(
        &mock_server,
        "/resto1-or10",
        r#"<html><body>
        <div class="quote"><a href="/rev3">Fine</a></div>
        </body></html>"#
            .to_string(),
    )
    .await;

    mount_page(&mock_server, "/rev1", review_page("Trattoria", 50, "Lovely pasta")).await;
    mount_page(&mock_server, "/rev2", review_page("Trattoria", 20, "Slow service")).await;
    mount_page(&mock_server, "/rev3", review_page("Trattoria", 40, "Fine")).await;

    let config = create_test_config(&base_url, db_path.to_str().unwrap(), 1);
    let (run_id, report) = run_crawl(&config, "test-hash").await.unwrap();

    assert_eq!(report.counters.listing.visited, 1);
    assert_eq!(report.counters.entity.visited, 2);
    assert_eq!(report.counters.detail.visited, 3);
    assert_eq!(report.counters.records_emitted, 3);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.counters, Some(report.counters));

    let records = storage.load_records(run_id).unwrap();
    assert_eq!(records.len(), 3);

    let expected_type = FieldValue::from(vec![
        "Italian".to_string(),
        "Vegetarian Friendly".to_string(),
    ]);
    for record in &records {
        assert_eq!(record.get("price"), &FieldValue::from("££ - £££"));
        assert_eq!(record.get("type"), &expected_type);
        assert_eq!(record.get("name"), &FieldValue::from("Trattoria"));
        assert!(record.get("reviews").is_absent());
    }

    let rev2 = records
        .iter()
        .find(|r| r.url().ends_with("/rev2"))
        .expect("rev2 record");
    assert_eq!(rev2.get("rating"), &FieldValue::from("2 of 5 bubbles"));

    assert_eq!(
        storage
            .count_pages_by_state(run_id, PageState::Processed)
            .unwrap(),
        6
    );
}

#[tokio::test]
async fn test_listing_cap_of_one_fetches_one_listing_page() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    mount_page(
        &mock_server,
        "/list",
        r#"<html><body>
        <a class="nav next" href="/list2" data-page-number="2">Next</a>
        <a class="nav next" href="/list3" data-page-number="3">Next</a>
        </body></html>"#
            .to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/list2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, db_path.to_str().unwrap(), 1);
    let (_, report) = run_crawl(&config, "hash").await.unwrap();

    assert_eq!(report.counters.listing.visited, 1);
    assert_eq!(report.counters.total_visited(), 1);
}

#[tokio::test]
async fn test_failed_detail_does_not_stop_siblings() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    mount_page(
        &mock_server,
        "/list",
        r#"<div class="listing"><a href="/resto1">R</a></div>"#.to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/resto1",
        r#"<div class="header_links"><a>£</a></div>
        <div class="quote"><a href="/gone">x</a></div>
        <div class="quote"><a href="/flaky">y</a></div>
        <div class="quote"><a href="/rev1">z</a></div>"#
            .to_string(),
    )
    .await;
    mount_page(&mock_server, "/rev1", review_page("Cafe", 30, "Fine")).await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    // One retry is configured, so the 503 is requested twice
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, db_path.to_str().unwrap(), 1);
    let (run_id, report) = run_crawl(&config, "hash").await.unwrap();

    assert_eq!(report.counters.detail.visited, 1);
    assert_eq!(report.counters.detail.failed, 2);
    assert_eq!(report.counters.records_emitted, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let records = storage.load_records(run_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("price"), &FieldValue::from("£"));
    // No type tags after the price link: present but empty
    assert_eq!(records[0].get("type"), &FieldValue::List(Vec::new()));

    let errors = storage.get_error_summary(run_id).unwrap();
    assert_eq!(errors.get(&PageState::DeadLink), Some(&1));
    assert_eq!(errors.get(&PageState::ServerError), Some(&1));

    let failed = storage.get_failed_pages(run_id).unwrap();
    assert!(failed.iter().all(|p| p.level == CrawlLevel::Detail));
    assert!(failed.iter().any(|p| p.status_code == Some(503)));

    let summary = generate_summary(&storage, Some(run_id)).unwrap();
    assert_eq!(summary.records_emitted, 1);
    assert_eq!(summary.total_errors, 2);
}

#[tokio::test]
async fn test_shared_entity_is_fetched_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    mount_page(
        &mock_server,
        "/list",
        r#"<div class="listing">
            <a href="/resto1">R</a>
            <a href="/resto1#reviews">R again</a>
            <a href="/resto1?utm_source=list">R tracked</a>
        </div>"#
            .to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/resto1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, db_path.to_str().unwrap(), 1);
    let (run_id, report) = run_crawl(&config, "hash").await.unwrap();

    assert_eq!(report.counters.entity.visited, 1);

    let export_path = temp_dir.path().join("records.jsonl");
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(export_records(&storage, run_id, &export_path).unwrap(), 0);
}

#[tokio::test]
async fn test_deadline_marks_run_interrupted() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<div class="listing"><a href="/resto1">R</a></div>"#)
                .set_delay(std::time::Duration::from_millis(1500)),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/resto1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url, db_path.to_str().unwrap(), 1);
    config.crawler.deadline_secs = Some(1);

    let (run_id, report) = run_crawl(&config, "hash").await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.counters.listing.visited, 1);
    assert_eq!(report.counters.tasks_dropped, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert!(run.counters.is_some());
}
