use crate::capture::{capture, Launcher};
use crate::card::{CardData, CardRequest};
use crate::{CaptureConfig, Error, Result};
use log::debug;
use std::sync::Arc;
use std::thread;
use tokio::sync::{oneshot, Semaphore};

/// An async-friendly card generator.
///
/// Every `generate` call captures in its own browser context on a dedicated
/// worker thread, so the blocking browser protocol never runs on the async
/// executor. A semaphore bounds how many contexts exist at once.
pub struct Generator<L: Launcher + 'static> {
    launcher: Arc<L>,
    config: Arc<CaptureConfig>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl<L: Launcher + 'static> Clone for Generator<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: Arc::clone(&self.launcher),
            config: Arc::clone(&self.config),
            permits: Arc::clone(&self.permits),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl<L: Launcher + 'static> Generator<L> {
    /// Create a generator allowing one concurrent capture per CPU.
    pub fn new(launcher: L, config: CaptureConfig) -> Result<Self> {
        Self::with_max_concurrent(launcher, config, num_cpus::get())
    }

    pub fn with_max_concurrent(launcher: L, config: CaptureConfig, max_concurrent: usize) -> Result<Self> {
        config.validate()?;
        if max_concurrent == 0 {
            return Err(Error::ConfigError("max_concurrent must be at least 1".into()));
        }
        Ok(Self {
            launcher: Arc::new(launcher),
            config: Arc::new(config),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Captures that could start right now without waiting
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Validate a raw request and generate its PNG.
    pub async fn generate_request(&self, request: CardRequest) -> Result<Vec<u8>> {
        let card = CardData::from_request(request)?;
        self.generate(card).await
    }

    /// Generate the PNG for `card`.
    pub async fn generate(&self, card: CardData) -> Result<Vec<u8>> {
        let page_url = self.config.page_url(card.card_type)?;

        // Owned by the worker so the slot stays taken until the context is
        // closed, even if this future is dropped first.
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::Other(format!("Generator shut down: {}", e)))?;
        debug!(
            "Admitted {} capture ({} of {} slots free)",
            card.card_type,
            self.permits.available_permits(),
            self.max_concurrent
        );

        let (tx, rx) = oneshot::channel();
        let launcher = Arc::clone(&self.launcher);
        let config = Arc::clone(&self.config);

        thread::Builder::new()
            .name(format!("capture-{}", card.card_type))
            .spawn(move || {
                let res = capture(&*launcher, &config, &page_url, &card);
                drop(permit);
                let _ = tx.send(res);
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn capture worker: {}", e)))?;

        rx.await
            .map_err(|e| Error::Other(format!("Capture worker canceled: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{BrowserContext, InjectionPlan, InjectionReport};
    use crate::card::CardType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        active: AtomicUsize,
        peak: AtomicUsize,
        closed: AtomicUsize,
    }

    struct SlowLauncher {
        counters: Arc<Counters>,
        open_delay: Duration,
    }

    impl SlowLauncher {
        fn new(counters: &Arc<Counters>) -> Self {
            Self::with_open_delay(counters, Duration::from_millis(50))
        }

        fn with_open_delay(counters: &Arc<Counters>, open_delay: Duration) -> Self {
            Self {
                counters: Arc::clone(counters),
                open_delay,
            }
        }
    }

    struct SlowContext {
        counters: Arc<Counters>,
        open_delay: Duration,
        open: bool,
    }

    impl Launcher for SlowLauncher {
        type Context = SlowContext;

        fn launch(&self, _config: &CaptureConfig) -> Result<SlowContext> {
            let now = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(now, Ordering::SeqCst);
            Ok(SlowContext {
                counters: Arc::clone(&self.counters),
                open_delay: self.open_delay,
                open: true,
            })
        }
    }

    impl BrowserContext for SlowContext {
        fn open(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
            thread::sleep(self.open_delay);
            Ok(())
        }

        fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Bool(true))
        }

        fn inject(&mut self, plan: &InjectionPlan) -> Result<InjectionReport> {
            Ok(InjectionReport {
                inputs: plan.fields.len(),
                missing: vec![],
                target_found: true,
            })
        }

        fn capture_element(&mut self, _selector: &str) -> Result<Option<Vec<u8>>> {
            Ok(Some(b"\x89PNG".to_vec()))
        }

        fn close(&mut self) -> Result<()> {
            if self.open {
                self.open = false;
                self.counters.active.fetch_sub(1, Ordering::SeqCst);
                self.counters.closed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn quick_config() -> CaptureConfig {
        CaptureConfig {
            settle_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn generates_on_worker_thread() {
        let counters = Arc::new(Counters::default());
        let generator = Generator::new(
            SlowLauncher::new(&counters),
            quick_config(),
        )
        .unwrap();

        let png = generator
            .generate(CardData::new(CardType::Birthday).with("name", "Asha"))
            .await
            .unwrap();
        assert_eq!(png, b"\x89PNG");
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        assert_eq!(generator.available_permits(), generator.max_concurrent());
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_permits() {
        let counters = Arc::new(Counters::default());
        let generator = Generator::with_max_concurrent(
            SlowLauncher::new(&counters),
            quick_config(),
            2,
        )
        .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let g = generator.clone();
            tasks.push(tokio::spawn(async move {
                g.generate(CardData::new(CardType::Birthday)).await
            }));
        }
        for t in tasks {
            assert!(t.await.unwrap().is_ok());
        }

        assert!(counters.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 6);
        assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_request_fails_before_launch() {
        let counters = Arc::new(Counters::default());
        let generator = Generator::new(
            SlowLauncher::new(&counters),
            quick_config(),
        )
        .unwrap();

        let request: CardRequest = serde_json::from_value(serde_json::json!({
            "type": "work-anniversary",
            "years": "five"
        }))
        .unwrap();
        let err = generator.generate_request(request).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(counters.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_caller_keeps_slot_until_capture_ends() {
        let counters = Arc::new(Counters::default());
        let generator = Generator::with_max_concurrent(
            SlowLauncher::with_open_delay(&counters, Duration::from_millis(400)),
            quick_config(),
            1,
        )
        .unwrap();

        let g = generator.clone();
        let first = tokio::spawn(async move { g.generate(CardData::new(CardType::Birthday)).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        first.abort();
        let _ = first.await;

        // the worker still owns its context, so no slot is free
        assert_eq!(generator.available_permits(), 0);

        let second = generator.generate(CardData::new(CardType::Birthday)).await;
        assert!(second.is_ok());
        assert_eq!(counters.peak.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let counters = Arc::new(Counters::default());
        assert!(Generator::with_max_concurrent(SlowLauncher::new(&counters), quick_config(), 0).is_err());
    }
}
