use crate::error::FetchError;
use crate::http_client::is_challenge_page;
use crate::source_utils::PageRenderer;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Configuration for headless browser
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Budget for navigation plus challenge wait
    pub timeout: Duration,
    pub disable_images: bool,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub accept_language: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            timeout: Duration::from_secs(45),
            disable_images: true,
            user_agent: None,
            proxy: None,
            accept_language: "es-ES,es".to_string(),
        }
    }
}

fn render_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Render(e.to_string())
}

/// Blocking wrapper around one Chrome process
pub struct BrowserClient {
    browser: Browser,
    config: BrowserConfig,
}

impl BrowserClient {
    pub fn with_config(config: BrowserConfig) -> Result<Self, FetchError> {
        let images_arg = config
            .disable_images
            .then(|| "--blink-settings=imagesEnabled=false".to_string());
        let user_agent_arg = config.user_agent.as_ref().map(|ua| format!("--user-agent={}", ua));
        let lang_arg = format!("--lang={}", config.accept_language);

        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-setuid-sandbox"),
            OsStr::new(&lang_arg),
        ];
        if let Some(ref img) = images_arg {
            args.push(OsStr::new(img));
        }
        if let Some(ref ua) = user_agent_arg {
            args.push(OsStr::new(ua));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .proxy_server(config.proxy.as_deref())
            .idle_browser_timeout(config.timeout * 4)
            .args(args)
            .build()
            .map_err(render_err)?;

        let browser = Browser::new(launch_options).map_err(render_err)?;
        log::info!("Launched headless browser");
        Ok(Self { browser, config })
    }

    fn create_tab(&self) -> Result<Arc<Tab>, FetchError> {
        let tab = self.browser.new_tab().map_err(render_err)?;
        tab.set_default_timeout(self.config.timeout);
        Ok(tab)
    }

    /// Navigate, sit out any challenge interstitial, return the rendered HTML.
    pub fn get_html(&self, url: &str) -> Result<String, FetchError> {
        log::info!("Browser navigating to: {}", url);
        let started = Instant::now();
        let tab = self.create_tab()?;

        let result = self.load(&tab, url, started);
        if let Err(e) = tab.close(true) {
            log::debug!("Closing tab failed: {}", e);
        }
        result
    }

    fn load(&self, tab: &Arc<Tab>, url: &str, started: Instant) -> Result<String, FetchError> {
        tab.navigate_to(url)
            .map_err(render_err)?
            .wait_until_navigated()
            .map_err(render_err)?;

        // Hide the webdriver flag from scripts that run after load
        if let Err(e) = tab.evaluate(
            "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })",
            false,
        ) {
            log::debug!("Stealth script failed: {}", e);
        }

        loop {
            let html = tab.get_content().map_err(render_err)?;
            if !is_challenge_page(&html) {
                return Ok(html);
            }
            if started.elapsed() >= self.config.timeout {
                return Err(FetchError::Blocked {
                    status: None,
                    detail: "challenge not cleared in browser".to_string(),
                });
            }
            log::debug!("Challenge page still present on {}, waiting", url);
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}

impl Drop for BrowserClient {
    fn drop(&mut self) {
        log::debug!("Browser client dropped");
    }
}

/// [`PageRenderer`] that launches Chrome on first use and renders on the blocking pool
pub struct BrowserRenderer {
    config: BrowserConfig,
    client: OnceCell<Arc<BrowserClient>>,
}

impl BrowserRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<Arc<BrowserClient>, FetchError> {
        self.client
            .get_or_try_init(|| async {
                let config = self.config.clone();
                tokio::task::spawn_blocking(move || BrowserClient::with_config(config))
                    .await
                    .map_err(render_err)?
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let client = self.client().await?;
        let url = url.to_string();
        tokio::task::spawn_blocking(move || client.get_html(&url))
            .await
            .map_err(render_err)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_default() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_width, 1920);
        assert!(config.disable_images);
        assert!(config.proxy.is_none());
    }

    #[tokio::test]
    async fn test_renderer_is_lazy() {
        // Constructing the renderer must not launch Chrome
        let renderer = BrowserRenderer::new(BrowserConfig::default());
        assert!(renderer.client.get().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Chrome/Chromium and internet
    async fn test_render_example_com() {
        let renderer = BrowserRenderer::new(BrowserConfig::default());
        let html = renderer.render("https://example.com").await.unwrap();
        assert!(html.contains("Example Domain"));
    }
}
