//! PDF rendering engine – drives headless Chrome over the DevTools
//! protocol.
//!
//! Each render checks a warm browser process out of a bounded pool (or
//! launches one), opens a fresh isolated tab, loads the document as a
//! base64 `data:` URI, and prints it with background graphics enabled.
//! A guard returns the browser to the pool on success and tears the process
//! down on any failure path, so no Chrome process outlives its usefulness.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};

use crate::error::EngineError;
use crate::options::PageSetup;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Warm browser processes retained between requests. Bursts beyond this
    /// launch fresh processes that are torn down instead of pooled.
    pub max_idle: usize,
    /// Per-operation DevTools timeout (navigation, print).
    pub op_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_idle: 2,
            op_timeout: Duration::from_secs(30),
        }
    }
}

/// A bounded pool of warm headless-Chrome instances.
///
/// Lazy: nothing is launched until the first render. The only shared state
/// is the idle queue, guarded by a mutex.
pub struct EnginePool {
    config: EngineConfig,
    idle: Mutex<VecDeque<Browser>>,
}

impl EnginePool {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(VecDeque::new()),
        }
    }

    /// Render an HTML document to PDF bytes with the given page setup.
    pub fn render_pdf(&self, html: &str, setup: &PageSetup) -> Result<Vec<u8>, EngineError> {
        let mut guard = self.checkout()?;
        let result = print_page(guard.browser(), html, setup, self.config.op_timeout);
        if let Err(e) = &result {
            log::warn!("discarding rendering engine after failure: {e}");
            guard.poison();
        }
        result
    }

    /// Number of idle warm instances (test/diagnostic hook).
    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    fn checkout(&self) -> Result<EngineGuard<'_>, EngineError> {
        loop {
            let pooled = self.lock_idle().pop_front();
            match pooled {
                Some(browser) => {
                    // A warm process may have died since its last use.
                    match browser.get_version() {
                        Ok(_) => {
                            log::debug!("reusing warm rendering engine");
                            return Ok(EngineGuard {
                                pool: self,
                                browser,
                                poisoned: false,
                            });
                        }
                        Err(e) => {
                            log::debug!("dropping dead pooled engine: {e}");
                            continue;
                        }
                    }
                }
                None => {
                    let browser = launch(&self.config)?;
                    return Ok(EngineGuard {
                        pool: self,
                        browser,
                        poisoned: false,
                    });
                }
            }
        }
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<Browser>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scoped checkout of a browser process. Dropping the guard returns a
/// healthy browser to the pool (up to `max_idle`) and releases a poisoned
/// or surplus one, killing the process.
struct EngineGuard<'a> {
    pool: &'a EnginePool,
    browser: Browser,
    poisoned: bool,
}

impl EngineGuard<'_> {
    fn browser(&self) -> &Browser {
        &self.browser
    }

    fn poison(&mut self) {
        self.poisoned = true;
    }
}

impl Drop for EngineGuard<'_> {
    fn drop(&mut self) {
        if self.poisoned {
            return;
        }
        let mut idle = self.pool.lock_idle();
        if idle.len() < self.pool.config.max_idle {
            idle.push_back(self.browser.clone());
            log::debug!("rendering engine returned to pool ({} idle)", idle.len());
        } else {
            log::debug!("pool full, releasing rendering engine");
        }
    }
}

fn launch(_config: &EngineConfig) -> Result<Browser, EngineError> {
    log::info!("launching headless rendering engine");
    let options = LaunchOptions::default_builder()
        .headless(true)
        // The service commonly runs inside containers without user
        // namespaces for the Chrome sandbox.
        .sandbox(false)
        .idle_browser_timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| EngineError::Launch(e.to_string()))?;
    Browser::new(options).map_err(|e| EngineError::Launch(e.to_string()))
}

/// Load `html` in a fresh tab and print it.
fn print_page(
    browser: &Browser,
    html: &str,
    setup: &PageSetup,
    op_timeout: Duration,
) -> Result<Vec<u8>, EngineError> {
    let tab = browser
        .new_tab()
        .map_err(|e| EngineError::Launch(e.to_string()))?;
    tab.set_default_timeout(op_timeout);

    // Everything the page needs travels in one data URI; Chrome's load
    // event therefore implies no in-flight sub-resource fetches.
    let url = format!("data:text/html;base64,{}", BASE64_STD.encode(html));
    tab.navigate_to(&url)
        .map_err(|e| classify(e, EngineError::Navigate, "navigation"))?;
    tab.wait_until_navigated()
        .map_err(|e| classify(e, EngineError::Navigate, "navigation"))?;

    let (paper_width, paper_height) = setup.format.size_inches();
    let pdf = tab
        .print_to_pdf(Some(PrintToPdfOptions {
            landscape: Some(setup.landscape),
            display_header_footer: Some(false),
            print_background: Some(true),
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            margin_top: Some(setup.margin.top.inches),
            margin_bottom: Some(setup.margin.bottom.inches),
            margin_left: Some(setup.margin.left.inches),
            margin_right: Some(setup.margin.right.inches),
            ..Default::default()
        }))
        .map_err(|e| classify(e, EngineError::Print, "print"))?;

    if let Err(e) = tab.close(false) {
        log::debug!("tab close failed: {e}");
    }
    Ok(pdf)
}

/// Map a driver error to the engine taxonomy, detecting timeouts.
fn classify(
    error: impl std::fmt::Display,
    variant: fn(String) -> EngineError,
    stage: &'static str,
) -> EngineError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("timeout") || lowered.contains("timed out") || lowered.contains("never came")
    {
        EngineError::Timeout(stage)
    } else {
        variant(message)
    }
}
