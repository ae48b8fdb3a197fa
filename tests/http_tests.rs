//! Integration tests for the HTTP fetcher and a full crawl over HTTP
//!
//! These tests use wiremock to create mock HTTP servers and run the crawler
//! end-to-end with its default `HttpFetcher` and `HtmlLinkExtractor`.

use skein::config::{load_config, Config, FetchConfig, UserAgentConfig};
use skein::crawler::{Crawler, FetchError, Fetcher, HttpFetcher};
use skein::state::StopReason;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

fn test_fetcher() -> HttpFetcher {
    let user_agent = UserAgentConfig {
        name: "TestBot".to_string(),
        version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    };
    let fetch = FetchConfig {
        timeout_secs: 1,
        connect_timeout_secs: 1,
        max_redirects: 3,
    };
    HttpFetcher::new(&user_agent, &fetch).expect("Failed to build HTTP client")
}

fn test_config(seed: String) -> Config {
    let mut config = skein::config::parse_config(&format!(
        r#"
seeds = ["{}"]

[crawler]
max-threads = 2
poll-interval-ms = 20
max-retries = 2
"#,
        seed
    ))
    .expect("Failed to parse test config");
    config.fetch.timeout_secs = 2;
    config
}

#[tokio::test]
async fn test_http_fetcher_document_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "TestBot/1.0.0 (+https://example.com/contact)"))
        .respond_with(html("<html><body>hello</body></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/page", mock_server.uri());
    let doc = test_fetcher().fetch(&url).await.unwrap();

    assert_eq!(doc.url, url);
    assert_eq!(doc.final_url, url);
    assert_eq!(doc.status, 200);
    assert_eq!(doc.content_type, "text/html");
    assert_eq!(doc.readable_text(), "hello");
    assert_eq!(doc.fetched_by.as_deref(), Some("http"));
}

#[tokio::test]
async fn test_http_fetcher_follows_redirects() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", base_url).as_str()),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<p>moved</p>".to_string()))
        .mount(&mock_server)
        .await;

    let doc = test_fetcher()
        .fetch(&format!("{}/old", base_url))
        .await
        .unwrap();
    assert_eq!(doc.url, format!("{}/old", base_url));
    assert_eq!(doc.final_url, format!("{}/new", base_url));
}

#[tokio::test]
async fn test_http_fetcher_error_classification() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("late".to_string()).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher();
    let base_url = mock_server.uri();

    let missing = fetcher.fetch(&format!("{}/missing", base_url)).await;
    assert_eq!(missing.unwrap_err(), FetchError::Http { status: 404 });

    let down = fetcher.fetch(&format!("{}/down", base_url)).await.unwrap_err();
    assert_eq!(down, FetchError::Http { status: 503 });
    assert!(down.is_transient());

    let slow = fetcher.fetch(&format!("{}/slow", base_url)).await;
    assert_eq!(slow.unwrap_err(), FetchError::Timeout);

    // nothing listens on port 9 of localhost
    let refused = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
    assert!(matches!(refused, FetchError::Network(_) | FetchError::Timeout));
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{0}/page1">Page 1</a>
            <a href="/page2#section">Page 2</a>
            <a href="/page2?utm_source=home">Page 2 again</a>
            <a href="/missing">Gone</a>
            <a href="https://elsewhere.test/">Elsewhere</a>
            </body></html>"#,
            base_url
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<a href="/">Home</a><a href="/page2">2</a>"#.to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<p>leaf</p>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut crawler = Crawler::from_config(&test_config(format!("{}/", base_url))).unwrap();
    crawler.set_keep_snapshot(true);

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        crawler.start([format!("{}/", base_url)], true, false, false),
    )
    .await
    .expect("crawl did not terminate")
    .unwrap();

    assert_eq!(report.reason, StopReason::Exhausted);
    assert_eq!(report.visited, 4);
    assert_eq!(report.counters.succeeded, 3);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.requeued, 0);

    let visited = report.snapshot.unwrap().visited;
    assert!(visited.contains(&format!("{}/page2", base_url)));
    assert!(!visited.iter().any(|u| u.contains("elsewhere.test")));
}

#[tokio::test]
async fn test_transient_http_errors_are_retried() {
    let mock_server = MockServer::start().await;

    // one initial attempt plus max-retries = 2
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let seed = format!("{}/flaky", mock_server.uri());
    let crawler = Crawler::from_config(&test_config(seed.clone())).unwrap();

    let report = crawler.start([seed], true, false, false).await.unwrap();

    assert_eq!(report.reason, StopReason::Exhausted);
    assert_eq!(report.counters.failed, 3);
    assert_eq!(report.counters.requeued, 2);
}

#[tokio::test]
async fn test_crawl_from_config_file() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/docs/a">a</a><a href="/docs/b">b</a><a href="/shop/c">c</a>
               <a href="/files/report.pdf">pdf</a>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(html("<p>a</p>".to_string()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(html("<p>b</p>".to_string()))
        .mount(&mock_server)
        .await;

    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
seeds = ["{0}/"]

[crawler]
max-threads = 3
stop-count = 2
poll-interval-ms = 20

[throttle]
kind = "fixed"
interval-ms = 10

[filter]
file-type-blacklist = ["pdf"]
url-blacklist = ["/shop/"]
"#,
        base_url
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let crawler = Crawler::from_config(&config).unwrap();

    let report = crawler
        .start(&config.seeds, true, false, false)
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::StopCount);
    assert_eq!(report.visited, 2);
    assert_eq!(report.counters.rejected, 2);
}
