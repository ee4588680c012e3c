//! Hierarchy tests against a scripted in-memory site
//!
//! A `ScriptedFetcher` serves canned bodies keyed by URL and counts fetches,
//! so these tests check traversal order, caps and record contents without
//! any network.

use async_trait::async_trait;
use review_cascade::config::{parse_config, Config};
use review_cascade::crawler::{Coordinator, Fetcher, PageBody};
use review_cascade::output::{ChannelSink, MemorySink, RecordSink};
use review_cascade::state::CrawlLevel;
use review_cascade::{FetchError, FieldValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE: &str = "https://reviews.test";

#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, String>,
    fetches: Mutex<HashMap<String, u32>>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    fn page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(format!("{}{}", BASE, path), body.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fetch_count(&self, path: &str) -> u32 {
        let url = format!("{}{}", BASE, path);
        self.fetches.lock().unwrap().get(&url).copied().unwrap_or(0)
    }

    fn total_fetches(&self) -> u32 {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<PageBody, FetchError> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.pages.get(url) {
            Some(body) => Ok(PageBody {
                final_url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::Timeout),
        }
    }
}

fn config(extra_crawler: &str) -> Config {
    let content = format!(
        r#"
[crawler]
start-url = "{BASE}/list"
max-page-listing = 10
max-page-entity = 10
worker-count = 8
{extra_crawler}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "unused.db"
summary-path = "unused.md"

[listing]
links = "restaurants"

[listing.pagination]
next-url = "a.next::attr(href)"

[[listing.rules]]
name = "restaurants"
mode = "all-matches"
selector = "a.resto::attr(href)"

[entity]
links = "reviews"

[entity.pagination]
next-url = "a.next::attr(href)"

[[entity.rules]]
name = "price"
selector = "div.tags a::text"

[[entity.rules]]
name = "type"
mode = "all-matches"
selector = "div.tags a::text"
skip = 1

[[entity.rules]]
name = "reviews"
mode = "all-matches"
selector = "a.review::attr(href)"

[[detail.rules]]
name = "title"
selector = "h1::text"

[[detail.rules]]
name = "rating"
mode = "first-non-empty-of"
selectors = ["span.r50::attr(alt)", "span.r40::attr(alt)", "span.r30::attr(alt)"]

[[detail.rules]]
name = "reviewer-location"
selector = "div.loc::text"
"#
    );
    parse_config(&content).unwrap()
}

async fn crawl(
    config: &Config,
    fetcher: Arc<ScriptedFetcher>,
) -> (review_cascade::CrawlReport, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(config, fetcher, sink.clone());
    let report = coordinator.run().await.unwrap();
    (report, sink)
}

#[tokio::test]
async fn test_context_survives_entity_pagination() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("/list", r#"<a class="resto" href="/r1">R1</a>"#)
            .page(
                "/r1",
                r#"<div class="tags"><a>££</a><a>Italian</a><a>Vegetarian Friendly</a></div>
                   <a class="review" href="/r1/rev1">1</a>
                   <a class="next" href="/r1?p=2">next</a>"#,
            )
            .page(
                "/r1?p=2",
                r#"<a class="review" href="/r1/rev2">2</a>"#,
            )
            .page("/r1/rev1", r#"<h1>First</h1><span class="r50" alt="5 of 5 bubbles"></span>"#)
            .page("/r1/rev2", r#"<h1>Second</h1><span class="r30" alt="3 of 5 bubbles"></span>"#),
    );

    let (report, sink) = crawl(&config(""), fetcher).await;
    assert_eq!(report.counters.entity.visited, 2);

    let records = sink.records();
    assert_eq!(records.len(), 2);

    let price = FieldValue::from("££");
    let types = FieldValue::from(vec![
        "Italian".to_string(),
        "Vegetarian Friendly".to_string(),
    ]);
    for record in &records {
        assert_eq!(record.get("price"), &price);
        assert_eq!(record.get("type"), &types);
    }

    let second = records
        .iter()
        .find(|r| r.get("title") == &FieldValue::from("Second"))
        .unwrap();
    assert_eq!(second.get("rating"), &FieldValue::from("3 of 5 bubbles"));
}

#[tokio::test]
async fn test_missing_rating_and_empty_location_are_distinguishable() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("/list", r#"<a class="resto" href="/r1">R1</a>"#)
            .page("/r1", r#"<a class="review" href="/rev">x</a>"#)
            .page(
                "/rev",
                r#"<h1>No stars</h1><span class="r40" alt="  "></span><div class="loc"></div>"#,
            ),
    );

    let (_, sink) = crawl(&config(""), fetcher).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    // Every rating selector was blank: absent, not an error
    assert!(record.get("rating").is_absent());
    // The location node exists but holds no text
    assert_eq!(record.get("reviewer-location"), &FieldValue::Text(String::new()));
    // Entity had no tags at all
    assert!(record.get("price").is_absent());
    assert!(record.get("type").is_absent());
}

#[tokio::test]
async fn test_concurrent_duplicates_are_fetched_once() {
    let mut listing = String::new();
    for _ in 0..20 {
        listing.push_str(r#"<a class="resto" href="/shared">S</a>"#);
    }
    listing.push_str(r#"<a class="resto" href="/other">O</a>"#);

    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page("/list", &listing)
            .page(
                "/shared",
                r#"<a class="review" href="/rev">a</a><a class="review" href="/rev">b</a>"#,
            )
            .page("/other", r#"<a class="review" href="/rev">c</a>"#)
            .page("/rev", "<h1>Only once</h1>")
            .with_delay(Duration::from_millis(5)),
    );

    let (report, sink) = crawl(&config(""), fetcher.clone()).await;

    assert_eq!(fetcher.fetch_count("/shared"), 1);
    assert_eq!(fetcher.fetch_count("/other"), 1);
    // The same review linked from two entities is still one detail page
    assert_eq!(fetcher.fetch_count("/rev"), 1);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(report.counters.total_visited(), 4);
}

#[tokio::test]
async fn test_detail_cap_per_entity() {
    let mut entity = String::new();
    for i in 0..6 {
        entity.push_str(&format!(r#"<a class="review" href="/rev{}">r</a>"#, i));
    }

    let mut fetcher = ScriptedFetcher::default()
        .page("/list", r#"<a class="resto" href="/r1">R1</a>"#)
        .page("/r1", &entity);
    for i in 0..6 {
        fetcher = fetcher.page(&format!("/rev{}", i), "<h1>t</h1>");
    }
    let fetcher = Arc::new(fetcher);

    let (report, sink) = crawl(&config("max-detail-per-entity = 4"), fetcher.clone()).await;

    assert_eq!(report.counters.detail.visited, 4);
    assert_eq!(sink.records().len(), 4);
    assert_eq!(fetcher.fetch_count("/rev5"), 0);
}

#[tokio::test]
async fn test_listing_pagination_stops_at_cap() {
    let mut fetcher = ScriptedFetcher::default();
    for page in 1..=5 {
        let path = if page == 1 {
            "/list".to_string()
        } else {
            format!("/list/{}", page)
        };
        fetcher = fetcher.page(
            &path,
            &format!(r#"<a class="next" href="/list/{}">next</a>"#, page + 1),
        );
    }
    let fetcher = Arc::new(fetcher);

    let mut config = config("");
    config.crawler.max_page_listing = 3;

    let (report, _) = crawl(&config, fetcher.clone()).await;
    assert_eq!(report.counters.listing.visited, 3);
    assert_eq!(fetcher.fetch_count("/list/3"), 1);
    assert_eq!(fetcher.fetch_count("/list/4"), 0);
}

#[tokio::test]
async fn test_spent_detail_budget_stops_the_crawl() {
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .page(
                "/list",
                r#"<a class="resto" href="/r1">1</a><a class="resto" href="/r2">2</a>"#,
            )
            .page("/r1", r#"<a class="review" href="/a">a</a><a class="review" href="/b">b</a>"#)
            .page("/r2", r#"<a class="review" href="/c">c</a>"#)
            .page("/a", "<h1>a</h1>")
            .page("/b", "<h1>b</h1>")
            .page("/c", "<h1>c</h1>"),
    );

    let mut config = config("");
    config.crawler.worker_count = 1;
    config.budget.detail = Some(2);

    let (report, sink) = crawl(&config, fetcher.clone()).await;
    assert!(report.cancelled);
    assert_eq!(report.counters.entity.visited, 1);
    assert_eq!(report.counters.level(CrawlLevel::Detail).visited, 2);
    // r2 was still pending when the budget ran out
    assert_eq!(report.counters.tasks_dropped, 1);
    assert_eq!(sink.records().len(), 2);
    assert_eq!(fetcher.fetch_count("/r2"), 0);
    assert_eq!(fetcher.total_fetches(), 4);
}

#[tokio::test]
async fn test_channel_sink_delivers_everything_with_small_buffer() {
    let mut entity = String::new();
    let mut fetcher = ScriptedFetcher::default().page("/list", r#"<a class="resto" href="/r1">R1</a>"#);
    for i in 0..25 {
        entity.push_str(&format!(r#"<a class="review" href="/rev{}">r</a>"#, i));
        fetcher = fetcher.page(&format!("/rev{}", i), &format!("<h1>{}</h1>", i));
    }
    let fetcher = Arc::new(fetcher.page("/r1", &entity));

    let memory = Arc::new(MemorySink::new());
    let downstream: Arc<dyn RecordSink> = memory.clone();
    let sink = Arc::new(ChannelSink::spawn(downstream, 1));

    let coordinator = Coordinator::new(&config(""), fetcher, sink);
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counters.records_emitted, 25);
    assert_eq!(memory.records().len(), 25);
    assert_eq!(memory.visits().len(), 27);
    assert_eq!(memory.final_counters(), Some(report.counters));
}
