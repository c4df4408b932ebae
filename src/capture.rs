//! Render/capture bridge
//!
//! Drives an isolated browser context through one card generation: open the
//! card page, push the resolved field values into the live DOM, wait for
//! image fields, let animations settle, then screenshot the capture target.
//!
//! Backends implement [`Launcher`] and [`BrowserContext`]; the bridge never
//! talks to a browser directly. A context is always used through
//! [`with_context`], which closes it on every exit path before the result is
//! returned.

use crate::card::{CardData, CardLayout};
use crate::field::{FieldKind, TemplateField};
use crate::preview::display_text;
use crate::resolver::resolve;
use crate::{CaptureConfig, Error, Result};
use base64::Engine as Base64Engine;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Interval between predicate checks in [`BrowserContext::wait_for`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One exclusive browser context (a page plus whatever process backs it).
pub trait BrowserContext {
    /// Navigate to `url` and wait until the page's initial network activity
    /// has settled, bounded by `timeout`.
    fn open(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate JavaScript in the page and return its JSON value
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Apply an injection plan to the live DOM.
    fn inject(&mut self, plan: &InjectionPlan) -> Result<InjectionReport> {
        let value = self.evaluate(&plan.to_script())?;
        InjectionReport::from_value(value)
    }

    /// Poll a boolean JS predicate until it holds or `timeout` elapses.
    /// Returns whether the predicate became true.
    fn wait_for(&mut self, predicate: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.evaluate(predicate)?.as_bool() == Some(true) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// PNG of the first element matching `selector`, cropped to its bounding
    /// box, or `None` when nothing matches.
    fn capture_element(&mut self, selector: &str) -> Result<Option<Vec<u8>>>;

    /// Tear the context down. Must tolerate being called on an already
    /// closed context.
    fn close(&mut self) -> Result<()>;
}

/// Factory for fresh, isolated browser contexts
pub trait Launcher: Send + Sync {
    type Context: BrowserContext;

    fn launch(&self, config: &CaptureConfig) -> Result<Self::Context>;
}

/// Owns a context and guarantees it is closed at most once.
pub struct ScopedContext<C: BrowserContext> {
    inner: Option<C>,
}

impl<C: BrowserContext> ScopedContext<C> {
    pub fn new(context: C) -> Self {
        Self {
            inner: Some(context),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Run `body` against the context if it is still open.
    pub fn run<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut C) -> Result<T>,
    {
        match self.inner.as_mut() {
            Some(ctx) => body(ctx),
            None => Err(Error::Other("browser context already closed".into())),
        }
    }

    /// Close the context; later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut ctx) => ctx.close(),
            None => Ok(()),
        }
    }
}

impl<C: BrowserContext> Drop for ScopedContext<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close browser context: {}", e);
        }
    }
}

/// Launch a context, run `body`, and close the context before returning,
/// whether `body` succeeded or not.
pub fn with_context<L, T, F>(launcher: &L, config: &CaptureConfig, body: F) -> Result<T>
where
    L: Launcher + ?Sized,
    F: FnOnce(&mut L::Context) -> Result<T>,
{
    let mut scoped = ScopedContext::new(launcher.launch(config)?);
    let result = scoped.run(body);
    let closed = scoped.close();
    match (result, closed) {
        (Ok(v), Ok(())) => Ok(v),
        (Ok(v), Err(e)) => {
            warn!("Browser context teardown failed after a successful capture: {}", e);
            Ok(v)
        }
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Browser context teardown failed while handling '{}': {}", e, close_err);
            Err(e)
        }
    }
}

/// DOM write for one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInjection {
    pub id: String,
    pub kind: FieldKind,
    /// Form control selector (document-wide)
    pub input: Option<String>,
    /// Display element selector, relative to the capture target
    pub preview: Option<String>,
    pub index: usize,
    /// Raw value written into the input
    pub value: String,
    /// Text written into the display element
    pub display: String,
}

/// Everything the bridge writes into a card page, derived from the resolved
/// field list so the page and the preview share one source of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionPlan {
    pub target: String,
    pub fields: Vec<FieldInjection>,
}

/// Image element the bridge must wait for
#[derive(Debug, Clone, PartialEq)]
pub struct ImageWait {
    pub field_id: String,
    pub predicate: String,
}

const INJECT_TEMPLATE: &str = r#"(function(){
    const bytes = Uint8Array.from(atob("{{PLAN_B64}}"), function(c){ return c.charCodeAt(0); });
    const plan = JSON.parse(new TextDecoder().decode(bytes));
    const root = document.querySelector(plan.target);
    const missing = [];
    let inputs = 0;
    plan.fields.forEach(function(f){
        if (f.input) {
            const input = document.querySelector(f.input);
            if (input) {
                const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(input), 'value');
                if (desc && desc.set) { desc.set.call(input, f.value); } else { input.value = f.value; }
                input.dispatchEvent(new Event('input', { bubbles: true }));
                input.dispatchEvent(new Event('change', { bubbles: true }));
                inputs++;
            }
        }
        if (!f.preview) return;
        const el = root ? root.querySelectorAll(f.preview)[f.index] : null;
        if (!el) { missing.push(f.id); return; }
        if (f.kind === 'image') {
            const img = document.createElement('img');
            img.src = f.value;
            img.alt = f.id;
            img.className = 'w-full h-full object-cover';
            el.replaceChildren(img);
        } else {
            el.textContent = f.display;
        }
    });
    return JSON.stringify({ inputs: inputs, missing: missing, targetFound: !!root });
})()"#;

impl InjectionPlan {
    /// Plan for `resolved` fields of `layout`. Fields without DOM bindings
    /// and image fields without a value are left untouched.
    pub fn build(layout: &CardLayout, resolved: &[TemplateField], target: &str) -> Self {
        let fields = resolved
            .iter()
            .filter_map(|field| {
                let spec = layout.field(&field.id)?;
                if spec.input.is_none() && spec.preview.is_none() {
                    return None;
                }
                if field.kind == FieldKind::Image && field.value.is_empty() {
                    return None;
                }
                Some(FieldInjection {
                    id: field.id.clone(),
                    kind: field.kind,
                    input: spec.input.map(str::to_string),
                    preview: spec.preview.map(|p| p.selector.to_string()),
                    index: spec.preview.map(|p| p.index).unwrap_or(0),
                    value: field.value.clone(),
                    display: display_text(field),
                })
            })
            .collect();
        Self {
            target: target.to_string(),
            fields,
        }
    }

    pub fn field(&self, id: &str) -> Option<&FieldInjection> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// JavaScript program applying the plan. The plan travels base64-encoded
    /// JSON so arbitrary user text cannot break out of the script.
    pub fn to_script(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_else(|_| b"{\"target\":\"\",\"fields\":[]}".to_vec());
        let b64 = base64::engine::general_purpose::STANDARD.encode(json);
        INJECT_TEMPLATE.replace("{{PLAN_B64}}", &b64)
    }

    /// Load predicates for every injected image field
    pub fn image_waits(&self) -> Vec<ImageWait> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Image)
            .filter_map(|f| {
                let preview = f.preview.as_deref()?;
                let predicate = format!(
                    "(function(){{ const root = document.querySelector({}); if (!root) return false; const c = root.querySelectorAll({})[{}]; const img = c ? c.querySelector('img') : null; return !!img && img.complete; }})()",
                    js_string(&self.target),
                    js_string(preview),
                    f.index
                );
                Some(ImageWait {
                    field_id: f.id.clone(),
                    predicate,
                })
            })
            .collect()
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// What the injection script found on the page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionReport {
    pub inputs: usize,
    pub missing: Vec<String>,
    pub target_found: bool,
}

impl InjectionReport {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let parsed = match value {
            serde_json::Value::String(s) => serde_json::from_str(&s),
            other => serde_json::from_value(other),
        };
        parsed.map_err(|e| Error::ScriptError(format!("Unexpected injection report: {}", e)))
    }
}

/// Hex SHA-256 of captured bytes, logged to compare renders across backends
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Generate the PNG for `card` from the page at `page_url`.
pub fn capture<L>(launcher: &L, config: &CaptureConfig, page_url: &str, card: &CardData) -> Result<Vec<u8>>
where
    L: Launcher + ?Sized,
{
    let layout = card.layout();
    let resolved = resolve(&layout.template_fields(), card);
    let plan = InjectionPlan::build(layout, &resolved, &config.capture_selector);

    info!("Capturing {} card from {}", card.card_type, page_url);
    let started = Instant::now();
    let png = with_context(launcher, config, |ctx| run_capture(ctx, config, page_url, &plan))?;
    debug!(
        "Captured {} card: {} bytes in {:?}, sha256={}",
        card.card_type,
        png.len(),
        started.elapsed(),
        fingerprint(&png)
    );
    Ok(png)
}

fn run_capture<C>(ctx: &mut C, config: &CaptureConfig, page_url: &str, plan: &InjectionPlan) -> Result<Vec<u8>>
where
    C: BrowserContext + ?Sized,
{
    ctx.open(page_url, config.navigation_timeout())?;

    let report = ctx.inject(plan)?;
    if !report.target_found {
        warn!("Capture target {} not present after load", plan.target);
    } else if !report.missing.is_empty() {
        warn!("Preview elements missing for fields: {}", report.missing.join(", "));
    }
    debug!("Updated {} inputs on {}", report.inputs, page_url);

    for wait in plan.image_waits() {
        if !ctx.wait_for(&wait.predicate, config.image_timeout())? {
            warn!(
                "Image for '{}' did not load within {}ms; capturing anyway",
                wait.field_id, config.image_timeout_ms
            );
        }
    }

    if config.settle_ms > 0 {
        std::thread::sleep(config.settle());
    }

    ctx.capture_element(&config.capture_selector)?
        .ok_or_else(|| Error::CaptureTargetMissing(config.capture_selector.clone()))
}
