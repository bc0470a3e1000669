//! Chrome-backed card generation against a local test server

#![cfg(feature = "cdp")]

use cardgen::batch::{run_batch, BatchOptions};
use cardgen::cdp::CdpSession;
use cardgen::frontmatter::Document;
use cardgen::{CardConfig, Error, PageInspector, SelectorKind, Session, SettleDelay, Viewport};
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

const ARTICLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Article</title></head>
<body style="margin:0;background:#111;color:#eee">
<header><h1>Site header</h1></header>
<article>
  <h1>An article title</h1>
  <time datetime="2021-06-01">June 1, 2021</time>
  <div class="prose"><p>Article body.</p></div>
</article>
</body>
</html>"#;

const BROKEN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>No header</title></head>
<body>
<article><time>June 1, 2021</time><div class="prose"><p>Body.</p></div></article>
</body>
</html>"#;

/// Serves `/blog/good` with the expected layout and `/blog/broken` without a header
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let body = match request.url() {
                    "/blog/good" => Some(ARTICLE_PAGE),
                    "/blog/broken" => Some(BROKEN_PAGE),
                    _ => None,
                };
                let response = match body {
                    Some(html) => Response::from_string(html).with_header(
                        "Content-Type: text/html; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    ),
                    None => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090/blog".to_string()
}

fn test_config(root: &std::path::Path) -> CardConfig {
    CardConfig {
        content_dir: root.join("data/blog"),
        public_dir: root.join("public"),
        base_url: start_test_server(),
        viewport: Viewport { width: 1200, height: 800 },
        settle: SettleDelay { min_ms: 50, max_ms: 100 },
        concurrency: 2,
        ..Default::default()
    }
}

#[test]
#[ignore] // Requires Chrome to be installed
fn missing_header_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let session = CdpSession::new(config.clone()).expect("Failed to launch browser");
    let mut page = session.open_page().expect("Failed to open page");
    page.goto(&config.article_url("broken")).expect("Failed to load page");
    page.wait_for_network_idle().expect("Network never settled");

    assert!(page.find_required(SelectorKind::Prose).is_ok());
    assert!(matches!(
        page.find_required(SelectorKind::Header),
        Err(Error::ElementNotFound { .. })
    ));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn batch_writes_png_cards() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.content_dir).unwrap();
    for slug in ["good", "broken"] {
        std::fs::write(
            config.content_dir.join(format!("{}.mdx", slug)),
            "---\ntitle: Test\n---\nBody\n",
        )
        .unwrap();
    }

    let report = run_batch(&config, BatchOptions::default(), CdpSession::new)
        .await
        .expect("Batch failed");

    assert_eq!(report.generated(), vec!["good"]);
    assert_eq!(report.failed(), vec!["broken"]);

    let card = config.public_dir.join("static/images/twitter-cards/good/twitter-card.png");
    let png_data = std::fs::read(&card).expect("card missing");
    // PNG files start with these magic bytes
    assert_eq!(&png_data[0..8], b"\x89PNG\r\n\x1a\n");

    let doc = Document::read(&config.content_dir.join("good.mdx")).unwrap();
    assert_eq!(doc.images(), vec!["/static/images/twitter-cards/good/twitter-card.png".to_string()]);
}
