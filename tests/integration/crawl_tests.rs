//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! real reqwest transport, the proxy listing source and a full crawl.

use listing_harvester::client::{
    FetchOptions, HttpRequest, RequestClient, ReqwestTransport, Transport, TransportError,
};
use listing_harvester::config::parse_config;
use listing_harvester::crawler::{run, BlockingCrawler, LocationOutcome, RunMode};
use listing_harvester::output::{FileStore, PageNaming};
use listing_harvester::proxy::{HtmlTableSource, PoolSettings, ProxyPool, ProxySource};
use listing_harvester::{HarvestError, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "HarvesterTest/1.0";

/// Creates a configuration crawling the mock server with proxies disabled
fn create_test_config(base_url: &str, output_dir: &str, depth: usize) -> String {
    format!(
        r##"
[rate-limit]
requests = 0

[request]
timeout-ms = 1000
user-agent = "{ua}"

[proxy]
enabled = false

[crawl]
site = "mock"
depth = {depth}
locations = ["Orlando, FL", "Nashville, TN"]

[output]
directory = "{out}"

[sites.mock]
base-url = "{base}"
search-template = "{base}/realestateandhomes-search/{{}}"
detail-prefix = "/realestateandhomes-detail/"
not-found-selector = "#error-404"
"##,
        ua = USER_AGENT,
        depth = depth,
        out = output_dir.replace('\\', "/"),
        base = base_url,
    )
}

fn results_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="/realestateandhomes-detail/{}">{}</a>"#, l, l))
        .collect();
    format!(
        r#"<html><body><a href="/about">About</a>{}</body></html>"#,
        anchors
    )
}

async fn mount_page(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_reqwest_transport_success_and_status() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/ok", 200, "hello".to_string()).await;
    mount_page(&mock_server, "/missing", 404, "nope".to_string()).await;

    let transport = ReqwestTransport::new(10).unwrap();
    let timeout = Duration::from_secs(2);

    let ok = transport
        .send(&HttpRequest::get(format!("{}/ok", mock_server.uri())), None, timeout)
        .await
        .unwrap();
    assert_eq!(ok.status, 200);
    assert_eq!(ok.body, "hello");

    let missing = transport
        .send(
            &HttpRequest::get(format!("{}/missing", mock_server.uri())),
            None,
            timeout,
        )
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_reqwest_transport_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new(10).unwrap();
    let result = transport
        .send(
            &HttpRequest::get(format!("{}/slow", mock_server.uri())),
            None,
            Duration::from_millis(100),
        )
        .await;

    assert!(matches!(result, Err(TransportError::Timeout)));
}

#[tokio::test]
async fn test_reqwest_transport_redirect_loop() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new(3).unwrap();
    let result = transport
        .send(
            &HttpRequest::get(format!("{}/loop", mock_server.uri())),
            None,
            Duration::from_secs(2),
        )
        .await;

    assert!(matches!(result, Err(TransportError::TooManyRedirects)));
}

#[tokio::test]
async fn test_client_retries_timeouts_then_gives_up() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = RequestClient::new(
        Arc::new(ReqwestTransport::new(10).unwrap()),
        Arc::new(RateLimiter::unlimited()),
    )
    .with_timeout(Duration::from_millis(100))
    .with_retry(listing_harvester::client::RetryPolicy {
        max_attempts: 2,
        base: Duration::from_millis(10),
        max: Duration::from_millis(50),
    });

    let result = client
        .fetch(&format!("{}/slow", mock_server.uri()), FetchOptions::direct())
        .await;

    assert!(matches!(
        result,
        Err(HarvestError::TransientNetworkTimeout { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn test_client_sends_user_agent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/realestateandhomes-search/Orlando_FL"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("listing"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RequestClient::new(
        Arc::new(ReqwestTransport::new(10).unwrap()),
        Arc::new(RateLimiter::new(5, Duration::from_secs(1))),
    )
    .with_user_agent(USER_AGENT)
    .unwrap();

    let template = format!("{}/realestateandhomes-search/{{}}", mock_server.uri());
    let outcome = client
        .fetch(&template, FetchOptions::direct().with_location("Orlando_FL"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.body, "listing");
}

#[tokio::test]
async fn test_proxy_listing_over_http() {
    let mock_server = MockServer::start().await;
    let listing = r#"<html><body><table>
        <thead><tr><th>IP Address</th><th>Port</th><th>Code</th><th>Country</th></tr></thead>
        <tbody>
          <tr><td>203.0.113.7</td><td>3128</td><td>US</td><td>United States</td></tr>
          <tr><td>198.51.100.2</td><td>80</td><td>DE</td><td>Germany</td></tr>
          <tr><td>192.0.2.44</td><td>8080</td><td>US</td><td>United States</td></tr>
        </tbody></table></body></html>"#;
    mount_page(&mock_server, "/proxies", 200, listing.to_string()).await;

    let source = HtmlTableSource::new(
        format!("{}/proxies", mock_server.uri()),
        "United States",
        USER_AGENT,
        Duration::from_secs(2),
    )
    .unwrap();

    let pool = ProxyPool::new(
        Arc::new(source),
        PoolSettings {
            min_size: 1,
            refresh_offset: Duration::from_secs(300),
        },
    );
    assert_eq!(pool.refresh().await.unwrap(), 2);

    let chosen = pool.select().unwrap();
    assert!(chosen.address == "203.0.113.7" || chosen.address == "192.0.2.44");
}

#[tokio::test]
async fn test_proxy_listing_error_status() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/proxies", 503, "down".to_string()).await;

    let source = HtmlTableSource::new(
        format!("{}/proxies", mock_server.uri()),
        "United States",
        USER_AGENT,
        Duration::from_secs(2),
    )
    .unwrap();

    let result = source.fetch_entries().await;
    assert!(matches!(result, Err(HarvestError::ProxyRefresh(_))));
}

#[tokio::test]
async fn test_full_run_with_export() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/realestateandhomes-search/Orlando_FL",
        200,
        results_page(&["o1", "o2", "o3"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/realestateandhomes-search/Orlando_FL/pg-2",
        200,
        results_page(&["o4", "o2"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/realestateandhomes-search/Orlando_FL/pg-3",
        404,
        r#"<html><body><div id="error-404">No results</div></body></html>"#.to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/realestateandhomes-search/Nashville_TN",
        200,
        results_page(&["n1", "n2", "n3", "n4", "n5", "n6"]),
    )
    .await;

    for slug in ["o1", "o2", "o3", "o4", "n1", "n2", "n3", "n4", "n5"] {
        mount_page(
            &mock_server,
            &format!("/realestateandhomes-detail/{}", slug),
            200,
            format!("<html><body>{}</body></html>", slug),
        )
        .await;
    }

    let temp = TempDir::new().unwrap();
    let output_dir = temp.path().to_str().unwrap();
    let config = parse_config(&create_test_config(&base_url, output_dir, 5)).unwrap();

    let summary = run(&config, RunMode::Export, CancellationToken::new())
        .await
        .unwrap();

    // Orlando runs out of results with 4 links, Nashville fills its budget
    assert!(summary.navigate.is_success());
    assert_eq!(summary.navigate.locations.len(), 2);
    assert_eq!(
        summary.navigate.locations[0].outcome,
        LocationOutcome::Exhausted
    );
    assert_eq!(summary.navigate.locations[0].collected, 4);
    assert_eq!(
        summary.navigate.locations[1].outcome,
        LocationOutcome::DepthReached
    );
    assert_eq!(summary.navigate.locations[1].collected, 5);

    let urls = std::fs::read_to_string(&summary.url_list).unwrap();
    let lines: Vec<&str> = urls.lines().collect();
    assert_eq!(lines.len(), 9);
    assert_eq!(
        lines[0],
        format!("{}/realestateandhomes-detail/o1", base_url)
    );
    assert_eq!(
        lines[3],
        format!("{}/realestateandhomes-detail/o4", base_url)
    );
    assert!(!urls.contains("/about"));

    let pages = summary.pages.unwrap();
    assert_eq!(pages.saved.len(), 9);
    assert!(pages.failed.is_empty());
    let exported = temp.path().join("test_data").join("n5.html");
    assert_eq!(
        std::fs::read_to_string(exported).unwrap(),
        "<html><body>n5</body></html>"
    );
}

#[tokio::test]
async fn test_full_run_reports_stall() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/realestateandhomes-search/Orlando_FL",
        200,
        results_page(&["o1"]),
    )
    .await;
    // Page 2 repeats page 1, so nothing new is found
    mount_page(
        &mock_server,
        "/realestateandhomes-search/Orlando_FL/pg-2",
        200,
        results_page(&["o1"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/realestateandhomes-search/Nashville_TN",
        200,
        results_page(&["n1", "n2", "n3"]),
    )
    .await;

    let temp = TempDir::new().unwrap();
    let config =
        parse_config(&create_test_config(&base_url, temp.path().to_str().unwrap(), 3)).unwrap();

    let summary = run(&config, RunMode::Collect, CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.navigate.is_success());
    assert_eq!(
        summary.navigate.locations[0].outcome,
        LocationOutcome::Stalled { page: 2 }
    );
    assert_eq!(summary.navigate.collected(), 4);
    assert!(summary.pages.is_none());
    assert_eq!(
        std::fs::read_to_string(&summary.url_list)
            .unwrap()
            .lines()
            .count(),
        4
    );
}

#[tokio::test]
async fn test_cancelled_run() {
    let mock_server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let config = parse_config(&create_test_config(
        &mock_server.uri(),
        temp.path().to_str().unwrap(),
        3,
    ))
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = run(&config, RunMode::Collect, cancel).await;
    assert!(matches!(result, Err(HarvestError::Cancelled)));
}

#[test]
fn test_blocking_scrape_under_tight_rate_limit() {
    // The mock server runs on its own thread; this runtime only mounts routes
    let setup = tokio::runtime::Runtime::new().unwrap();
    let mock_server = setup.block_on(MockServer::start());
    let base_url = mock_server.uri();

    setup.block_on(async {
        mount_page(
            &mock_server,
            "/realestateandhomes-search/Orlando_FL",
            200,
            results_page(&["a", "b"]),
        )
        .await;
        for slug in ["a", "b"] {
            Mock::given(method("GET"))
                .and(path(format!("/realestateandhomes-detail/{}", slug)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(slug)
                        .set_delay(Duration::from_millis(50)),
                )
                .mount(&mock_server)
                .await;
        }
    });

    let temp_dir = TempDir::new().unwrap();
    let config = parse_config(&format!(
        r##"
[rate-limit]
requests = 1
window-ms = 600

[request]
timeout-ms = 300
max-attempts = 1

[proxy]
enabled = false

[crawl]
site = "mock"
depth = 2
locations = ["Orlando, FL"]
scrape-concurrency = 2

[output]
directory = "{out}"

[sites.mock]
base-url = "{base}"
search-template = "{base}/realestateandhomes-search/{{}}"
detail-prefix = "/realestateandhomes-detail/"
"##,
        out = temp_dir.path().to_str().unwrap().replace('\\', "/"),
        base = base_url,
    ))
    .unwrap();

    let mut crawler = BlockingCrawler::from_config(&config, CancellationToken::new()).unwrap();
    let report = crawler.navigate(&["Orlando_FL"]).unwrap();
    assert_eq!(report.collected(), 2);

    // Each download waits out the window on this thread before it is sent
    let store = FileStore::new(temp_dir.path().join("pages"));
    let pages = crawler.scrape(&store, &PageNaming::DetailSlug).unwrap();
    assert!(pages.failed.is_empty(), "failed: {:?}", pages.failed);
    assert_eq!(pages.saved.len(), 2);
}
