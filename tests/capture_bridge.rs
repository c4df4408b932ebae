//! Capture bridge behaviour against a scripted browser context

use cardsmith::capture::{self, BrowserContext, InjectionPlan, InjectionReport, Launcher};
use cardsmith::card::{CardData, CardRequest, CardType};
use cardsmith::{CaptureConfig, Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What every context launched by a `MockLauncher` saw
#[derive(Default)]
struct Journal {
    launched: AtomicUsize,
    teardowns: AtomicUsize,
    opened: Mutex<Vec<String>>,
    plans: Mutex<Vec<InjectionPlan>>,
    waits: Mutex<Vec<String>>,
}

#[derive(Clone, Copy)]
enum Behaviour {
    Normal,
    NoTarget,
    NavigationTimeout,
    ImagesNeverLoad,
    FailingClose,
}

struct MockLauncher {
    journal: Arc<Journal>,
    behaviour: Behaviour,
}

struct MockContext {
    journal: Arc<Journal>,
    behaviour: Behaviour,
}

impl MockLauncher {
    fn new(behaviour: Behaviour) -> (Self, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        (
            Self {
                journal: Arc::clone(&journal),
                behaviour,
            },
            journal,
        )
    }
}

impl Launcher for MockLauncher {
    type Context = MockContext;

    fn launch(&self, _config: &CaptureConfig) -> Result<MockContext> {
        self.journal.launched.fetch_add(1, Ordering::SeqCst);
        Ok(MockContext {
            journal: Arc::clone(&self.journal),
            behaviour: self.behaviour,
        })
    }
}

impl BrowserContext for MockContext {
    fn open(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.journal.opened.lock().unwrap().push(url.to_string());
        match self.behaviour {
            Behaviour::NavigationTimeout => Err(Error::Timeout(timeout.as_millis() as u64)),
            _ => Ok(()),
        }
    }

    fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn inject(&mut self, plan: &InjectionPlan) -> Result<InjectionReport> {
        self.journal.plans.lock().unwrap().push(plan.clone());
        Ok(InjectionReport {
            inputs: plan.fields.iter().filter(|f| f.input.is_some()).count(),
            missing: vec![],
            target_found: !matches!(self.behaviour, Behaviour::NoTarget),
        })
    }

    fn wait_for(&mut self, predicate: &str, _timeout: Duration) -> Result<bool> {
        self.journal.waits.lock().unwrap().push(predicate.to_string());
        Ok(!matches!(self.behaviour, Behaviour::ImagesNeverLoad))
    }

    fn capture_element(&mut self, selector: &str) -> Result<Option<Vec<u8>>> {
        match self.behaviour {
            Behaviour::NoTarget => Ok(None),
            _ => Ok(Some(format!("PNG:{}", selector).into_bytes())),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.journal.teardowns.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::FailingClose => Err(Error::Other("browser already gone".into())),
            _ => Ok(()),
        }
    }
}

fn config() -> CaptureConfig {
    CaptureConfig {
        settle_ms: 0,
        ..Default::default()
    }
}

fn request(json: serde_json::Value) -> CardData {
    let req: CardRequest = serde_json::from_value(json).unwrap();
    CardData::from_request(req).unwrap()
}

#[test]
fn work_anniversary_values_reach_the_page() {
    let (launcher, journal) = MockLauncher::new(Behaviour::Normal);
    let card = request(serde_json::json!({
        "type": "work-anniversary",
        "name": "Asha Rao",
        "designation": "Engineer",
        "years": "5"
    }));
    let cfg = config();
    let url = cfg.page_url(card.card_type).unwrap();

    let png = capture::capture(&launcher, &cfg, &url, &card).unwrap();
    assert_eq!(png, b"PNG:[data-preview=\"true\"]");

    assert_eq!(
        journal.opened.lock().unwrap().as_slice(),
        ["http://localhost:3000/work-anniversary".to_string()]
    );
    let plans = journal.plans.lock().unwrap();
    let plan = &plans[0];
    assert_eq!(plan.field("name").unwrap().display, "Asha Rao");
    assert_eq!(plan.field("designation").unwrap().display, "Engineer");
    assert_eq!(plan.field("years").unwrap().display, "5th WORK");
    assert_eq!(plan.field("years").unwrap().value, "5");
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_birthday_name_is_written_as_empty_text() {
    let (launcher, journal) = MockLauncher::new(Behaviour::Normal);
    let card = request(serde_json::json!({ "type": "birthday", "name": "" }));

    let png = capture::capture(&launcher, &config(), "http://localhost:3000/birthday", &card);
    assert!(png.is_ok());

    let plans = journal.plans.lock().unwrap();
    let name = plans[0].field("name").unwrap();
    assert_eq!(name.display, "");
    assert_eq!(name.value, "");
}

#[test]
fn missing_capture_target_fails_and_releases_context() {
    let (launcher, journal) = MockLauncher::new(Behaviour::NoTarget);
    let card = CardData::new(CardType::Birthday).with("name", "Asha");

    let err = capture::capture(&launcher, &config(), "http://localhost:3000/birthday", &card).unwrap_err();
    match err {
        Error::CaptureTargetMissing(selector) => assert_eq!(selector, "[data-preview=\"true\"]"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(journal.launched.load(Ordering::SeqCst), 1);
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn navigation_failure_still_releases_context() {
    let (launcher, journal) = MockLauncher::new(Behaviour::NavigationTimeout);
    let card = CardData::new(CardType::Onboarding);

    let err = capture::capture(&launcher, &config(), "http://localhost:3000/onboarding", &card).unwrap_err();
    assert!(matches!(err, Error::Timeout(30000)));
    assert!(journal.plans.lock().unwrap().is_empty());
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn image_timeout_is_not_fatal() {
    let (launcher, journal) = MockLauncher::new(Behaviour::ImagesNeverLoad);
    let card = CardData::new(CardType::Onboarding)
        .with("name", "Asha Rao")
        .with("profileImageUrl", "https://x.test/asha.png")
        .with("smallProfileImageUrl", "data:image/png;base64,AAAA");

    let png = capture::capture(&launcher, &config(), "http://localhost:3000/onboarding", &card);
    assert!(png.is_ok());

    let waits = journal.waits.lock().unwrap();
    assert_eq!(waits.len(), 2);
    assert!(waits[0].contains(".w-48.h-48"));
    assert!(waits[1].contains(".w-12.h-12"));
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_failure_after_success_keeps_the_image() {
    let (launcher, journal) = MockLauncher::new(Behaviour::FailingClose);
    let card = CardData::new(CardType::Birthday);

    let png = capture::capture(&launcher, &config(), "http://localhost:3000/birthday", &card).unwrap();
    assert!(!png.is_empty());
    // closed exactly once even though close reported an error
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn with_context_closes_on_error_paths() {
    let (launcher, journal) = MockLauncher::new(Behaviour::Normal);

    let res: Result<()> = capture::with_context(&launcher, &config(), |_ctx| {
        Err(Error::RenderError("boom".into()))
    });
    assert!(res.is_err());

    let ok = capture::with_context(&launcher, &config(), |ctx| ctx.evaluate("1 + 1"));
    assert!(ok.is_ok());

    assert_eq!(journal.launched.load(Ordering::SeqCst), 2);
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 2);
}

#[test]
fn scoped_context_closes_once() {
    let (launcher, journal) = MockLauncher::new(Behaviour::Normal);
    let ctx = launcher.launch(&config()).unwrap();

    let mut scoped = capture::ScopedContext::new(ctx);
    assert!(scoped.is_open());
    scoped.close().unwrap();
    scoped.close().unwrap();
    assert!(!scoped.is_open());
    assert!(scoped.run(|c| c.evaluate("1")).is_err());
    drop(scoped);

    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 1);

    // dropping an open context closes it
    {
        let _scoped = capture::ScopedContext::new(launcher.launch(&config()).unwrap());
    }
    assert_eq!(journal.teardowns.load(Ordering::SeqCst), 2);
}
