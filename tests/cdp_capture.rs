//! Headless Chrome capture against a local card page

#![cfg(feature = "cdp")]

use cardsmith::capture::{self, BrowserContext, InjectionPlan};
use cardsmith::card::{CardData, CardType, CAPTURE_TARGET};
use cardsmith::cdp::CdpLauncher;
use cardsmith::resolver::resolve;
use cardsmith::{CaptureConfig, Error, Viewport};
use std::sync::Once;
use tiny_http::{Response, Server};

static INIT: Once = Once::new();

const ANNIVERSARY_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Work Anniversary</title></head>
<body>
<form>
  <input id="name"><input id="designation"><input id="years">
</form>
<div data-preview="true" style="width: 540px; height: 540px; position: relative; background: #123">
  <div class="text-4xl">?th WORK</div>
  <div class="text-white text-3xl">Name</div>
  <div class="text-white text-lg">Designation</div>
</div>
</body>
</html>"#;

/// Start a card page server
fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18090").unwrap();
            for request in server.incoming_requests() {
                let path = request.url().to_string();
                let response = match path.as_str() {
                    "/work-anniversary" => Response::from_string(ANNIVERSARY_PAGE).with_header(
                        "Content-Type: text/html; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    ),
                    "/empty" => Response::from_string("<html><body><p>no card</p></body></html>").with_header(
                        "Content-Type: text/html; charset=utf-8"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    ),
                    _ => Response::from_string("Not Found").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18090".to_string()
}

fn config(base_url: &str) -> CaptureConfig {
    CaptureConfig {
        pages_base_url: base_url.to_string(),
        viewport: Viewport {
            width: 800,
            height: 600,
        },
        settle_ms: 100,
        ..Default::default()
    }
}

fn anniversary() -> CardData {
    CardData::new(CardType::WorkAnniversary)
        .with("name", "Asha Rao")
        .with("designation", "Engineer")
        .with("years", "5")
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_anniversary_text_is_injected() {
    let base_url = start_test_server();
    let cfg = config(&base_url);
    let card = anniversary();
    let url = cfg.page_url(card.card_type).unwrap();
    let layout = card.layout();
    let plan = InjectionPlan::build(layout, &resolve(&layout.template_fields(), &card), CAPTURE_TARGET);

    let texts = capture::with_context(&CdpLauncher, &cfg, |ctx| {
        ctx.open(&url, cfg.navigation_timeout())?;
        let report = ctx.inject(&plan)?;
        assert!(report.target_found);
        assert_eq!(report.inputs, 3);
        assert!(report.missing.is_empty());
        ctx.evaluate(
            "JSON.stringify([document.querySelector('.text-white.text-3xl').textContent, \
             document.querySelector('.text-white.text-lg').textContent, \
             document.querySelector('.text-4xl').textContent, \
             document.querySelector('#name').value])",
        )
    })
    .expect("capture context failed");

    let texts: Vec<String> = serde_json::from_str(texts.as_str().unwrap()).unwrap();
    assert_eq!(texts, vec!["Asha Rao", "Engineer", "5th WORK", "Asha Rao"]);
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_anniversary_capture_is_png() {
    let base_url = start_test_server();
    let cfg = config(&base_url);
    let card = anniversary();
    let url = cfg.page_url(card.card_type).unwrap();

    let png = capture::capture(&CdpLauncher, &cfg, &url, &card).expect("capture failed");
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_missing_target_is_reported() {
    let base_url = start_test_server();
    let cfg = config(&base_url);
    let card = anniversary();

    let err = capture::capture(&CdpLauncher, &cfg, &format!("{}/empty", base_url), &card).unwrap_err();
    assert!(matches!(err, Error::CaptureTargetMissing(_)));
}
