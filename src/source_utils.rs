use crate::browser_client::{BrowserConfig, BrowserRenderer};
use crate::config::normalize_host;
use crate::error::{ConfigError, FetchError};
use crate::http_client::{accept_response, EnhancedHttpClient, HttpClientConfig};
use crate::metrics::MetricsTracker;
use crate::retry::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fetch settings resolved from configuration, fixed for a run
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub http: HttpClientConfig,
    pub retry: RetryPolicy,
    /// Bare hosts (no `www.`) whose blocked responses escalate to rendering
    pub render_hosts: Vec<String>,
    pub enable_browser: bool,
    pub browser_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            retry: RetryPolicy::default(),
            render_hosts: Vec::new(),
            enable_browser: true,
            browser_timeout: Duration::from_secs(45),
        }
    }
}

impl FetchPolicy {
    /// Whether `host` (or a parent domain of it) is flagged for heavy rendering
    pub fn requires_rendering(&self, host: &str) -> bool {
        let host = normalize_host(host);
        self.render_hosts
            .iter()
            .any(|flagged| host == *flagged || host.ends_with(&format!(".{}", flagged)))
    }
}

/// How a single attempt retrieves the page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP with browser-like headers
    Enhanced,
    /// Headless browser that executes page scripts
    Browser,
}

/// Heavy strategy: returns the HTML after scripts have run
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, FetchError>;
}

/// Anything that can turn a URL into an accepted HTML body
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str, force_render: bool) -> Result<String, FetchError>;
}

/// Lightweight client first, escalating to the renderer when a flagged host blocks it
pub struct SourceFetcher {
    http: EnhancedHttpClient,
    renderer: Option<Arc<dyn PageRenderer>>,
    policy: FetchPolicy,
    metrics: MetricsTracker,
}

impl SourceFetcher {
    /// Build from a policy; Chrome is only launched on the first render.
    pub fn new(policy: FetchPolicy) -> Result<Self, ConfigError> {
        let renderer: Option<Arc<dyn PageRenderer>> = if policy.enable_browser {
            let config = BrowserConfig {
                timeout: policy.browser_timeout,
                proxy: policy
                    .http
                    .proxy
                    .clone()
                    .filter(|p| reqwest::Proxy::all(p.as_str()).is_ok()),
                user_agent: policy.http.user_agents.first().cloned(),
                ..BrowserConfig::default()
            };
            Some(Arc::new(BrowserRenderer::new(config)))
        } else {
            None
        };
        Self::with_renderer(policy, renderer)
    }

    pub fn with_renderer(
        policy: FetchPolicy,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, ConfigError> {
        let http = EnhancedHttpClient::with_config(policy.http.clone())?;
        Ok(Self {
            http,
            renderer,
            policy,
            metrics: MetricsTracker::new(),
        })
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Strategy for the first attempt
    pub fn detect_strategy(&self, force_render: bool) -> FetchStrategy {
        if force_render && self.renderer.is_some() {
            FetchStrategy::Browser
        } else {
            FetchStrategy::Enhanced
        }
    }

    async fn render(&self, url: &Url, host: &str) -> Result<String, FetchError> {
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| FetchError::Render("browser disabled".to_string()))?;
        let started = Instant::now();
        let body = tokio::time::timeout(self.policy.browser_timeout, renderer.render(url.as_str()))
            .await
            .map_err(|_| FetchError::Timeout(self.policy.browser_timeout))??;
        accept_response(&body, self.policy.http.min_body_len)?;
        self.metrics.record_success(host, started.elapsed());
        Ok(body)
    }

    async fn attempt(
        &self,
        url: &Url,
        host: &str,
        use_browser: &AtomicBool,
        attempt: usize,
    ) -> Result<String, FetchError> {
        if use_browser.load(Ordering::SeqCst) {
            log::debug!("[{}] attempt {} via browser", host, attempt);
            return self.render(url, host).await.map_err(|e| {
                self.metrics.record_failure(host, &e);
                e
            });
        }

        let started = Instant::now();
        let error = match self.http.fetch_once(url).await {
            Ok(body) => {
                self.metrics.record_success(host, started.elapsed());
                return Ok(body);
            }
            Err(e) => e,
        };
        self.metrics.record_failure(host, &error);

        if !(error.is_blocked() && self.renderer.is_some() && self.policy.requires_rendering(host)) {
            return Err(error);
        }

        log::info!("[{}] {} on {}, escalating to browser", host, error, url);
        self.metrics.record_escalation(host);
        use_browser.store(true, Ordering::SeqCst);
        self.render(url, host).await.map_err(|e| {
            self.metrics.record_failure(host, &e);
            e
        })
    }
}

#[async_trait]
impl PageFetcher for SourceFetcher {
    async fn fetch_page(&self, url: &str, force_render: bool) -> Result<String, FetchError> {
        let parsed = Url::parse(url.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .map(normalize_host)
            .ok_or_else(|| FetchError::InvalidUrl(format!("{}: no host", url)))?;

        let strategy = self.detect_strategy(force_render);
        if force_render && strategy == FetchStrategy::Enhanced {
            log::warn!("[{}] rendering requested but browser is disabled, using HTTP", host);
        }
        let use_browser = AtomicBool::new(strategy == FetchStrategy::Browser);

        let parsed = &parsed;
        let host = host.as_str();
        let flag = &use_browser;
        retry_with_backoff(
            &self.policy.retry,
            host,
            move |attempt| self.attempt(parsed, host, flag, attempt),
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    self.metrics.record_retry(host);
                }
                retry
            },
        )
        .await
    }
}
