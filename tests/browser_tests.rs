//! Browser module tests
//!
//! The first half checks configuration and option types, then that launch
//! failures are classified the same way whatever the cause. The `#[ignore]`d
//! tests at the bottom drive a real Chrome/Chromium instance; run them with
//! `cargo test -- --ignored` on a machine that has one installed.

use pagepress::browser::{
    BrowserConfig, ContentRedactor, NavigationOptions, PageMargins, PaperFormat,
    RedactionPolicy, RenderOptions, ResourceFilter, ResourceKind, WaitUntil,
};

#[test]
fn test_browser_config_default() {
    let config = BrowserConfig::default();
    assert!(config.headless);
    assert_eq!(config.width, 1280);
    assert_eq!(config.height, 800);
    assert!(config.sandbox);
    assert!(config.intercept_requests);
    assert_eq!(config.request_timeout_ms, 30000);
    assert!(config.chrome_path.is_none());
    assert!(config.extra_args.is_empty());
}

#[test]
fn test_browser_config_builder() {
    let config = BrowserConfig::builder()
        .headless(false)
        .viewport(1024, 768)
        .sandbox(false)
        .request_timeout_ms(60000)
        .chrome_path("/usr/bin/chromium")
        .arg("--lang=en-US")
        .build();

    assert!(!config.headless);
    assert_eq!(config.width, 1024);
    assert_eq!(config.height, 768);
    assert!(!config.sandbox);
    assert_eq!(config.request_timeout_ms, 60000);
    assert_eq!(config.chrome_path.as_deref(), Some("/usr/bin/chromium"));
    assert_eq!(config.extra_args, vec!["--lang=en-US".to_string()]);
}

#[test]
fn test_launch_args_include_container_flags() {
    let args = BrowserConfig::builder().sandbox(false).build().launch_args();
    for flag in [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-accelerated-2d-canvas",
        "--disable-gpu",
    ] {
        assert!(args.iter().any(|a| a == flag), "missing {}", flag);
    }

    let sandboxed = BrowserConfig::default().launch_args();
    assert!(!sandboxed.iter().any(|a| a == "--no-sandbox"));
}

#[test]
fn test_default_filter_blocks_presentation_resources() {
    let filter = ResourceFilter::default();
    assert!(!filter.should_allow(ResourceKind::Image));
    assert!(!filter.should_allow(ResourceKind::Stylesheet));
    assert!(!filter.should_allow(ResourceKind::Font));
    assert!(filter.should_allow(ResourceKind::Document));
    assert!(filter.should_allow(ResourceKind::Script));
    assert!(filter.should_allow(ResourceKind::Xhr));
}

#[test]
fn test_navigation_options() {
    let options = NavigationOptions::new(WaitUntil::DomContentLoaded, 10_000);
    assert_eq!(options.timeout().as_millis(), 10_000);
    assert_eq!(options.wait_until.lifecycle_event(), "DOMContentLoaded");
    assert_eq!("networkidle".parse::<WaitUntil>(), Ok(WaitUntil::NetworkIdle));
}

#[test]
fn test_render_options_a4() {
    let options = RenderOptions::a4(30_000);
    assert_eq!(options.format, PaperFormat::A4);
    assert!(options.print_background);
    assert_eq!(options.margins, PageMargins::Uniform(PageMargins::DEFAULT_PX));

    let params = options.to_params();
    assert_eq!(params.paper_width, Some(8.27));
    assert_eq!(params.paper_height, Some(11.7));
    assert_eq!(params.print_background, Some(true));
    let margin = params.margin_top.unwrap();
    assert!((margin - 10.0 / 96.0).abs() < 1e-9);
}

#[test]
fn test_render_options_without_margins() {
    let params = RenderOptions::a4(30_000).without_margins().to_params();
    assert_eq!(params.margin_top, Some(0.0));
    assert_eq!(params.margin_left, Some(0.0));
}

#[test]
fn test_redaction_script_embeds_selectors_as_data() {
    let selectors = vec![".ads".to_string(), "a[href=\"x\"]".to_string()];
    let script = ContentRedactor::script(&selectors, RedactionPolicy::Strict).unwrap();
    assert!(script.contains(r#"[".ads","a[href=\"x\"]"]"#));
    assert!(script.contains("display"));
}

// ============================================================================
// Launch failures
// ============================================================================

mod launch {
    use pagepress::browser::BrowserConfig;
    use pagepress::engine::{BrowserEngine, ChromiumEngine};
    use pagepress::error::ErrorKind;

    /// Launch and either release the session or return the failure kind
    async fn launch_kind(config: BrowserConfig) -> Option<ErrorKind> {
        match ChromiumEngine::new(config).launch().await {
            Ok(session) => {
                session.close().await.unwrap();
                None
            }
            Err(e) => Some(e.kind()),
        }
    }

    #[tokio::test]
    async fn test_auto_detect_failure_is_launch_failure() {
        // Passes on hosts with Chrome too: a successful launch has no kind
        if let Some(kind) = launch_kind(BrowserConfig::default()).await {
            assert_eq!(kind, ErrorKind::EngineLaunchFailure);
        }
    }

    #[tokio::test]
    async fn test_bad_executable_path_is_launch_failure() {
        let config = BrowserConfig::builder()
            .chrome_path("/nonexistent/pagepress/chrome")
            .build();
        assert_eq!(launch_kind(config).await, Some(ErrorKind::EngineLaunchFailure));
    }
}

// ============================================================================
// Live browser tests
// ============================================================================

mod live {
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use pagepress::browser::{
        BrowserConfig, NavigationOptions, RedactionPolicy, RenderOptions, ResourceFilter,
        WaitUntil,
    };
    use pagepress::delivery::DeliveryStrategy;
    use pagepress::engine::ChromiumEngine;
    use pagepress::error::ErrorKind;
    use pagepress::export::{ExportRequest, ExportSettings, Exporter};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use sysinfo::{ProcessesToUpdate, System};

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <link rel="stylesheet" href="/style.css">
  <link rel="preload" as="font" href="/font.woff2" crossorigin>
</head>
<body>
  <div class="ads">advertisement</div>
  <h1 id="title">Quarterly report</h1>
  <img src="/logo.png">
</body>
</html>"#;

    #[derive(Default)]
    struct Hits {
        document: AtomicUsize,
        stylesheet: AtomicUsize,
        font: AtomicUsize,
        image: AtomicUsize,
    }

    async fn serve_fixture() -> (SocketAddr, Arc<Hits>) {
        let hits = Arc::new(Hits::default());
        let h = Arc::clone(&hits);
        let app = Router::new()
            .route(
                "/",
                get({
                    let h = Arc::clone(&h);
                    move || async move {
                        h.document.fetch_add(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "text/html")], PAGE).into_response()
                    }
                }),
            )
            .route(
                "/style.css",
                get({
                    let h = Arc::clone(&h);
                    move || async move {
                        h.stylesheet.fetch_add(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "text/css")], "body{color:red}").into_response()
                    }
                }),
            )
            .route(
                "/font.woff2",
                get({
                    let h = Arc::clone(&h);
                    move || async move {
                        h.font.fetch_add(1, Ordering::SeqCst);
                        ([(header::CONTENT_TYPE, "font/woff2")], Vec::<u8>::new()).into_response()
                    }
                }),
            )
            .route(
                "/logo.png",
                get(move || async move {
                    h.image.fetch_add(1, Ordering::SeqCst);
                    ([(header::CONTENT_TYPE, "image/png")], Vec::<u8>::new()).into_response()
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hits)
    }

    fn exporter(navigation_timeout_ms: u64) -> Exporter {
        exporter_with(BrowserConfig::builder().sandbox(false).build(), navigation_timeout_ms)
    }

    fn exporter_with(config: BrowserConfig, navigation_timeout_ms: u64) -> Exporter {
        let settings = ExportSettings {
            navigation: NavigationOptions::new(WaitUntil::Load, navigation_timeout_ms),
            render: RenderOptions::a4(30_000),
            filter: ResourceFilter::default(),
            redaction: RedactionPolicy::Strict,
        };
        Exporter::new(
            Arc::new(ChromiumEngine::new(config)),
            settings,
            DeliveryStrategy::Attachment,
        )
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium"]
    async fn test_export_local_page_blocks_resources() {
        let (addr, hits) = serve_fixture().await;
        let request = ExportRequest::new(format!("http://{}/", addr))
            .with_exclude_selectors([".ads", "#does-not-exist"]);

        let result = exporter(10_000).render(&request).await.unwrap();

        assert!(result.pdf.starts_with(b"%PDF-"));
        assert_eq!(result.redaction.hidden, 1);
        assert_eq!(hits.document.load(Ordering::SeqCst), 1);
        assert_eq!(hits.stylesheet.load(Ordering::SeqCst), 0);
        assert_eq!(hits.font.load(Ordering::SeqCst), 0);
        assert_eq!(hits.image.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium"]
    async fn test_malformed_selector_fails_strict_export() {
        let (addr, _) = serve_fixture().await;
        let request =
            ExportRequest::new(format!("http://{}/", addr)).with_exclude_selectors(["<<nope"]);

        let err = exporter(10_000).render(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RedactionFailure);
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium and network access"]
    async fn test_export_example_com() {
        let result = exporter(10_000)
            .render(&ExportRequest::new("https://example.com"))
            .await
            .unwrap();
        assert!(result.pdf.starts_with(b"%PDF-"));
        assert!(result.pdf.len() > 1_000);
    }

    /// Accepts connections and never answers
    async fn serve_silence() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    fn processes_with_arg(marker: &str) -> usize {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .filter(|p| p.cmd().iter().any(|a| a.to_string_lossy().contains(marker)))
            .count()
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium"]
    async fn test_silent_server_times_out_and_releases_browser() {
        let addr = serve_silence().await;
        let marker = format!("--pagepress-test-run={}", uuid::Uuid::new_v4());
        let config = BrowserConfig::builder().sandbox(false).arg(&marker).build();

        let started = Instant::now();
        let err = exporter_with(config, 2_000)
            .render(&ExportRequest::new(format!("http://{}/", addr)))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.kind(), ErrorKind::NavigationTimeout);
        assert!(elapsed >= Duration::from_secs(2), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(12), "returned after {:?}", elapsed);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut remaining = processes_with_arg(&marker);
        while remaining > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(200)).await;
            remaining = processes_with_arg(&marker);
        }
        assert_eq!(remaining, 0, "browser still running after timeout");
    }
}
