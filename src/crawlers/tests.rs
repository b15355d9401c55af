use crate::config::MirrorConfig;
use crate::error::MirrorError;
use crate::results::CrawlOutcome;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
}

async fn page(server: &MockServer, at: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .expect(times)
        .mount(server)
        .await;
}

fn config(server: &MockServer, out: &Path, depth: usize) -> MirrorConfig {
    let mut config = MirrorConfig::new(&format!("{}/", server.uri()), out);
    config.max_depth = depth;
    config.concurrency = 4;
    config.timeout_secs = 5;
    config
}

/// Directory the mock server's files are mirrored into
fn host_dir(server: &MockServer, out: &Path) -> PathBuf {
    let url = Url::parse(&server.uri()).unwrap();
    out.join(format!(
        "{}_{}",
        url.host_str().unwrap(),
        url.port().unwrap()
    ))
}

async fn mirror(config: MirrorConfig) -> CrawlOutcome {
    super::run(config, CancellationToken::new()).await.unwrap()
}

#[tokio::test]
async fn test_depth_limits_page_links() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/a">a</a>"#, 1).await;
    page(&server, "/a", r#"<a href="/b">b</a>"#, 1).await;
    page(&server, "/b", r#"<a href="/c">c</a>"#, 0).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 1)).await;

    assert!(!outcome.is_cancelled());
    assert_eq!(outcome.stats().pages_saved, 2);
    assert_eq!(outcome.stats().failed, 0);
}

#[tokio::test]
async fn test_each_url_is_fetched_once() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        r#"<a href="/a">1</a><a href="/a#top">2</a><a href="a">3</a>"#,
        1,
    )
    .await;
    page(&server, "/a", r#"<a href="/">home</a><a href="/a">self</a>"#, 1).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 3)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
}

#[tokio::test]
async fn test_assets_do_not_consume_depth() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        r#"<link rel="stylesheet" href="/s.css"><a href="/next">next</a>"#,
        1,
    )
    .await;
    page(&server, "/next", "<p>too deep</p>", 0).await;
    Mock::given(method("GET"))
        .and(path("/s.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("body { background: url(bg.png) }", "text/css"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bg.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 0)).await;

    assert_eq!(outcome.stats().pages_saved, 1);
    assert_eq!(outcome.stats().assets_saved, 2);

    let root = host_dir(&server, out.path());
    assert_eq!(std::fs::read(root.join("bg.png")).unwrap(), vec![0x89, b'P', b'N', b'G']);
    let css = std::fs::read_to_string(root.join("s.css")).unwrap();
    assert!(css.contains("url(bg.png)"));
}

#[tokio::test]
async fn test_files_are_written_with_local_links() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        r#"<html><body>
            <a href="/about">About</a>
            <img src="/img/logo.png">
            <img src="data:image/png;base64,AAAA">
            <a href="http://other.invalid/x">elsewhere</a>
        </body></html>"#,
        1,
    )
    .await;
    page(&server, "/about", r#"<a href="../">home</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"png".to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 2)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
    assert_eq!(outcome.stats().assets_saved, 1);

    let root = host_dir(&server, out.path());
    let index = std::fs::read_to_string(root.join("index.html")).unwrap();
    assert!(index.contains(r#"href="about/index.html""#));
    assert!(index.contains(r#"src="img/logo.png""#));
    assert!(index.contains(r#"src="data:image/png;base64,AAAA""#));
    assert!(index.contains(r#"href="http://other.invalid/x""#));

    let about = std::fs::read_to_string(root.join("about").join("index.html")).unwrap();
    assert!(about.contains(r#"href="../index.html""#));
    assert_eq!(std::fs::read(root.join("img").join("logo.png")).unwrap(), b"png");
}

#[tokio::test]
async fn test_failed_fetches_are_counted() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/missing">gone</a>"#, 1).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 1)).await;

    assert_eq!(outcome.stats().pages_saved, 1);
    assert_eq!(outcome.stats().failed, 1);
    assert!(!host_dir(&server, out.path()).join("missing").exists());
}

#[tokio::test]
async fn test_robots_disallow_skips_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("User-agent: *\nDisallow: /private\n", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;
    page(
        &server,
        "/",
        r#"<a href="/private/x">secret</a><a href="/public">open</a>"#,
        1,
    )
    .await;
    page(&server, "/private/x", "<p>secret</p>", 0).await;
    page(&server, "/public", "<p>open</p>", 1).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 1)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
    assert_eq!(outcome.stats().robots_skipped, 1);
}

#[tokio::test]
async fn test_robots_can_be_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&server)
        .await;
    page(&server, "/", "<p>hi</p>", 1).await;

    let out = tempfile::tempdir().unwrap();
    let mut config = config(&server, out.path(), 1);
    config.respect_robots = false;
    let outcome = mirror(config).await;

    assert_eq!(outcome.stats().pages_saved, 1);
    assert_eq!(outcome.stats().robots_skipped, 0);
}

#[tokio::test]
async fn test_slow_robots_allows_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /\n")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    page(&server, "/", "<p>hi</p>", 1).await;

    let out = tempfile::tempdir().unwrap();
    let mut config = config(&server, out.path(), 0);
    config.timeout_secs = 1;
    let outcome = mirror(config).await;

    assert_eq!(outcome.stats().pages_saved, 1);
    assert_eq!(outcome.stats().robots_skipped, 0);
}

#[tokio::test]
async fn test_redirect_target_decides_location() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/old">old</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/new/", r#"<a href="/new/">self</a>"#, 1).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 2)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
    let root = host_dir(&server, out.path());
    assert!(root.join("new").join("index.html").exists());
    assert!(!root.join("old").exists());
}

#[tokio::test]
async fn test_redirect_onto_known_page_is_saved_once() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/new/">new</a><a href="/old">old</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .expect(1)
        .mount(&server)
        .await;
    // Requested directly and through the redirect
    page(&server, "/new/", "<p>new</p>", 2).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 2)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
    assert_eq!(outcome.stats().failed, 0);
    let root = host_dir(&server, out.path());
    assert!(root.join("new").join("index.html").exists());
    assert!(!root.join("old").exists());
}

#[tokio::test]
async fn test_latin1_page_is_rewritten_and_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            b"<p>caf\xe9</p><a href=\"/next\">next</a>".to_vec(),
            "text/html; charset=iso-8859-1",
        ))
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/next", "<p>next</p>", 1).await;

    let out = tempfile::tempdir().unwrap();
    let outcome = mirror(config(&server, out.path(), 1)).await;

    assert_eq!(outcome.stats().pages_saved, 2);
    let index = std::fs::read(host_dir(&server, out.path()).join("index.html")).unwrap();
    assert!(index.windows(4).any(|w| w == b"caf\xe9"));
    assert!(index.windows(15).any(|w| w == b"next/index.html"));
}

#[tokio::test]
async fn test_many_links_through_a_small_queue() {
    let server = MockServer::start().await;
    let images: String = (0..300)
        .map(|i| format!(r#"<img src="/img/{}.png">"#, i))
        .collect();
    page(&server, "/", &images, 1).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/\d+\.png$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"png".to_vec(), "image/png"))
        .expect(300)
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let mut config = config(&server, out.path(), 0);
    // One worker means a four-slot queue, far fewer than the links found
    config.concurrency = 1;
    let outcome = tokio::time::timeout(Duration::from_secs(60), mirror(config))
        .await
        .expect("crawl with a full queue should finish");

    assert!(!outcome.is_cancelled());
    assert_eq!(outcome.stats().pages_saved, 1);
    assert_eq!(outcome.stats().assets_saved, 300);
    let images_dir = host_dir(&server, out.path()).join("img");
    assert!(images_dir.join("0.png").exists());
    assert!(images_dir.join("299.png").exists());
}

#[tokio::test]
async fn test_cancel_during_fetch_keeps_in_flight_page() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/slow">slow</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            html(r#"<a href="/child">child</a>"#).set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;
    page(&server, "/child", "<p>child</p>", 0).await;

    let out = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let outcome = super::run(config(&server, out.path(), 3), cancel)
        .await
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.stats().pages_saved, 2);
    let root = host_dir(&server, out.path());
    assert!(root.join("slow").join("index.html").exists());
    assert!(!root.join("child").exists());
}

#[tokio::test]
async fn test_cancelled_run_reports_cancellation() {
    let server = MockServer::start().await;
    page(&server, "/", "<p>hi</p>", 0).await;

    let out = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = super::run(config(&server, out.path(), 2), cancel)
        .await
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.stats().pages_saved, 0);
}

#[tokio::test]
async fn test_bad_configuration_fails_before_crawling() {
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("never");

    let unsupported = MirrorConfig::new("ftp://example.com/", &target);
    assert!(matches!(
        super::run(unsupported, CancellationToken::new()).await,
        Err(MirrorError::UnsupportedScheme(_))
    ));

    let mut no_workers = MirrorConfig::new("http://example.com/", &target);
    no_workers.concurrency = 0;
    assert!(matches!(
        super::run(no_workers, CancellationToken::new()).await,
        Err(MirrorError::InvalidConcurrency)
    ));

    let mut bad_pattern = MirrorConfig::new("http://example.com/", &target);
    bad_pattern.exclude_patterns = vec!["(".to_string()];
    assert!(matches!(
        super::run(bad_pattern, CancellationToken::new()).await,
        Err(MirrorError::Pattern(_))
    ));

    assert!(!target.exists());
}
