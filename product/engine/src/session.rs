use crate::config::{HarvestConfig, PacingConfig};
use crate::pacing;
use crate::{HarvestError, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Patches for the usual automation fingerprints, re-applied after load.
const COUNTERMEASURE_SCRIPTS: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub url: String,
    pub html: String,
}

/// Narrow capability surface of a browser tab. Everything above this trait
/// runs against synthetic DOM snapshots in tests.
pub trait PageDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;
    fn snapshot(&mut self) -> Result<PageState>;
    fn click(&mut self, selector: &str) -> Result<bool>;
    fn press_key(&mut self, key: &str) -> Result<()>;
}

pub struct Session<D: PageDriver> {
    driver: D,
    pacing: PacingConfig,
    scroll_steps: usize,
    navigation_timeout: Duration,
    ready_timeout: Duration,
}

impl<D: PageDriver> Session<D> {
    pub fn new(driver: D, config: &HarvestConfig) -> Self {
        Self {
            driver,
            pacing: config.pacing.clone(),
            scroll_steps: config.scroll_steps,
            navigation_timeout: config.navigation_timeout(),
            ready_timeout: config.ready_state_timeout(),
        }
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    #[cfg(test)]
    pub(crate) fn into_driver(self) -> D {
        self.driver
    }

    /// Navigates to `url`, lets lazy content load and returns the settled DOM.
    pub fn render(&mut self, url: &str) -> Result<PageState> {
        pacing::jitter(self.pacing.before_navigation);
        self.driver.navigate(url, self.navigation_timeout)?;
        pacing::jitter(self.pacing.after_navigation);

        self.apply_countermeasures();
        self.wait_until_ready();
        pacing::jitter(self.pacing.settle);

        for _ in 0..self.scroll_steps {
            // A failed scroll only means less lazy content.
            let _ = self.human_scroll();
        }
        self.driver.snapshot()
    }

    pub fn human_scroll(&mut self) -> Result<i64> {
        let offset = pacing::scroll_offset();
        self.driver
            .evaluate(&format!("window.scrollBy(0, {offset})"))?;
        pacing::jitter(self.pacing.scroll);
        Ok(offset)
    }

    pub fn scroll_and_snapshot(&mut self) -> Result<PageState> {
        for _ in 0..self.scroll_steps.max(1) {
            self.human_scroll()?;
        }
        self.driver.snapshot()
    }

    pub fn snapshot(&mut self) -> Result<PageState> {
        self.driver.snapshot()
    }

    pub fn click(&mut self, selector: &str) -> Result<bool> {
        self.driver.click(selector)
    }

    pub fn press_key(&mut self, key: &str) -> Result<()> {
        self.driver.press_key(key)
    }

    fn apply_countermeasures(&mut self) {
        for script in COUNTERMEASURE_SCRIPTS {
            let _ = self.driver.evaluate(script);
        }
    }

    /// Polls `document.readyState`; running out of time is not an error.
    fn wait_until_ready(&mut self) {
        let started = Instant::now();
        loop {
            let state = self
                .driver
                .evaluate("document.readyState")
                .ok()
                .and_then(|v| v.as_str().map(str::to_string));
            if state.as_deref() == Some("complete") {
                return;
            }
            if started.elapsed() + READY_POLL_INTERVAL > self.ready_timeout {
                return;
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
    }
}

pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub fn launch(config: &HarvestConfig) -> Result<Self> {
        let lang_arg = format!("--lang={}", config.locale);
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&lang_arg),
        ];
        let options = LaunchOptions {
            headless: config.headless,
            window_size: Some((config.viewport_width, config.viewport_height)),
            args,
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| HarvestError::Browser(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;
        tab.set_default_timeout(config.navigation_timeout());
        tab.set_user_agent(
            &config.user_agent,
            Some(&config.accept_language),
            Some(&config.platform),
        )
        .map_err(|e| HarvestError::Browser(e.to_string()))?;
        tab.enable_stealth_mode()
            .map_err(|e| HarvestError::Browser(e.to_string()))?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl PageDriver for ChromeDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| HarvestError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| HarvestError::Extraction(format!("script evaluation failed: {e}")))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn snapshot(&mut self) -> Result<PageState> {
        let html = self
            .tab
            .get_content()
            .map_err(|e| HarvestError::Extraction(format!("could not read DOM: {e}")))?;
        Ok(PageState {
            url: self.tab.get_url(),
            html,
        })
    }

    fn click(&mut self, selector: &str) -> Result<bool> {
        let Ok(element) = self.tab.find_element(selector) else {
            return Ok(false);
        };
        element
            .click()
            .map_err(|e| HarvestError::Extraction(format!("click on {selector} failed: {e}")))?;
        Ok(true)
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.tab
            .press_key(key)
            .map(|_| ())
            .map_err(|e| HarvestError::Extraction(format!("key press {key} failed: {e}")))
    }
}
