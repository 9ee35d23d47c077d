//! ChromiumOxide session implementation
//!
//! Launches one headless Chrome, keeps a single page for the whole run,
//! and implements the driver primitives through in-page script
//! evaluation bounded by explicit timeouts.

use crate::browser::driver::SessionDriver;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launch settings for the Chrome session
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Run without a visible window (default: true)
    pub headless: bool,
    /// Enable the Chrome sandbox (disable inside containers)
    pub sandbox: bool,
    /// Browser window width
    pub width: u32,
    /// Browser window height
    pub height: u32,
    /// Explicit Chrome/Chromium executable path
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
    /// Timeout for full page loads in [`SessionDriver::open`]
    pub nav_timeout: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            width: 1920,
            height: 1080,
            chrome_path: None,
            extra_args: Vec::new(),
            nav_timeout: Duration::from_secs(30),
        }
    }
}

/// One scrape session over a live Chrome instance
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: Option<JoinHandle<()>>,
    nav_timeout: Duration,
}

impl ChromeSession {
    /// Launch Chrome and open a blank page
    pub async fn launch(config: ChromeConfig) -> Result<Self, BrowserError> {
        info!("Launching browser: headless={}", config.headless);

        let mut builder = CdpBrowserConfig::builder();

        builder = builder.viewport(chromiumoxide::handler::viewport::Viewport {
            width: config.width,
            height: config.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        });

        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.arg("--no-sandbox").arg("--disable-dev-shm-usage");
        }
        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        for arg in &config.extra_args {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        info!("Browser launched");

        Ok(Self {
            browser,
            page,
            handler: Some(handler_task),
            nav_timeout: config.nav_timeout,
        })
    }

    /// Escape a selector for interpolation into a single-quoted JS string
    fn escape(selector: &str) -> String {
        selector.replace('\\', "\\\\").replace('\'', "\\'")
    }

    async fn eval_bool(&self, script: &str) -> Result<bool, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(BrowserError::from)?
            .into_value::<bool>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

#[async_trait]
impl SessionDriver for ChromeSession {
    async fn open(&mut self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        let timeout = self.nav_timeout;

        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(timeout.as_millis() as u64))?
            .map_err(BrowserError::from)?;

        // Wait for the load event before handing the page back
        let ready = r#"
            new Promise(resolve => {
                if (document.readyState === 'complete') {
                    resolve(true);
                } else {
                    window.addEventListener('load', () => resolve(true));
                }
            })
        "#;
        tokio::time::timeout(timeout, self.page.evaluate(ready))
            .await
            .map_err(|_| BrowserError::Timeout(timeout.as_millis() as u64))?
            .map_err(BrowserError::from)?;

        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let timeout_ms = timeout.as_millis() as u64;
        let script = format!(
            r#"
                new Promise((resolve, reject) => {{
                    const timeout = {};
                    const start = Date.now();

                    function check() {{
                        const el = document.querySelector('{}');
                        if (el) {{
                            resolve(true);
                        }} else if (Date.now() - start > timeout) {{
                            reject(new Error('Timeout waiting for selector'));
                        }} else {{
                            requestAnimationFrame(check);
                        }}
                    }}
                    check();
                }})
            "#,
            timeout_ms,
            Self::escape(selector)
        );

        // Outer timeout guards against the evaluation itself hanging
        let guard = timeout + Duration::from_secs(1);
        let result = tokio::time::timeout(guard, self.page.evaluate(script.as_str()))
            .await
            .map_err(|_| BrowserError::Timeout(timeout_ms))?;

        match result {
            Ok(_) => Ok(()),
            Err(_) => Err(BrowserError::Timeout(timeout_ms)),
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        debug!("Clicking {}", selector);
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector('{}');
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            Self::escape(selector)
        );

        if self.eval_bool(&script).await? {
            Ok(())
        } else {
            Err(BrowserError::ElementMissing(selector.to_string()))
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        debug!("Filling {}", selector);
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector('{}');
                if (!el) return false;
                el.value = '{}';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            Self::escape(selector),
            Self::escape(value)
        );

        if self.eval_bool(&script).await? {
            Ok(())
        } else {
            Err(BrowserError::ElementMissing(selector.to_string()))
        }
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, BrowserError> {
        let script = format!(
            "document.querySelector('{}') !== null",
            Self::escape(selector)
        );
        self.eval_bool(&script).await
    }

    async fn current_document(&mut self) -> Result<String, BrowserError> {
        self.page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(BrowserError::from)?
            .into_value::<String>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        info!("Closing browser");

        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;

        if let Some(handler) = self.handler.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handler).await;
        }

        info!("Browser closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_config_default() {
        let config = ChromeConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert!(config.chrome_path.is_none());
        assert!(config.extra_args.is_empty());
        assert_eq!(config.nav_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_selector_escaping() {
        assert_eq!(
            ChromeSession::escape("button[type='submit']"),
            "button[type=\\'submit\\']"
        );
        assert_eq!(ChromeSession::escape("#plain"), "#plain");
    }
}
