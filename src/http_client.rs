use crate::error::{ConfigError, FetchError};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, COOKIE, PRAGMA, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy, StatusCode, Url};
use std::collections::BTreeMap;
use std::time::Duration;

/// Fallback pool when the configuration supplies no user agents
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36",
];

/// Fragments that only show up on anti-bot interstitials
const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "cf-challenge-running",
    "challenge-platform",
    "cf_chl_opt",
    "<title>just a moment...</title>",
    "ddos-guard",
];

/// Configuration for the lightweight HTTP strategy
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub proxy: Option<String>,
    /// host -> cookie name -> value, sent to the host and its subdomains
    pub cookies: BTreeMap<String, BTreeMap<String, String>>,
    pub min_body_len: usize,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            accept_language: "es-ES,es;q=0.9,en;q=0.8".to_string(),
            proxy: None,
            cookies: BTreeMap::new(),
            min_body_len: 256,
            enable_cookies: true,
            enable_gzip: true,
        }
    }
}

/// HTTP client presenting a browser identity
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl EnhancedHttpClient {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        match HeaderValue::from_str(&config.accept_language) {
            Ok(value) => {
                headers.insert(ACCEPT_LANGUAGE, value);
            }
            Err(e) => log::warn!("Ignoring accept_language {:?}: {}", config.accept_language, e),
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));

        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .redirect(reqwest::redirect::Policy::limited(10))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .default_headers(headers);

        // Only the configured proxy is used, never one from the environment.
        // An unusable proxy setting leaves the client on direct connections.
        builder = match config.proxy.as_deref().map(|url| (url, Proxy::all(url))) {
            Some((_, Ok(proxy))) => builder.proxy(proxy),
            Some((url, Err(e))) => {
                log::error!("Invalid proxy {}: {}, connecting directly", url, e);
                builder.no_proxy()
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// A random user agent from the configured pool
    pub fn random_user_agent(&self) -> &str {
        if self.config.user_agents.is_empty() {
            let index = rand::thread_rng().gen_range(0..USER_AGENTS.len());
            return USER_AGENTS[index];
        }
        let index = rand::thread_rng().gen_range(0..self.config.user_agents.len());
        &self.config.user_agents[index]
    }

    /// `Cookie` header value for `host`, merging entries for parent domains
    pub fn cookie_header_for(&self, host: &str) -> Option<String> {
        let host = host.to_lowercase();
        let pairs: Vec<String> = self
            .config
            .cookies
            .iter()
            .filter(|(domain, _)| host == **domain || host.ends_with(&format!(".{}", domain)))
            .flat_map(|(_, jar)| jar.iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// One GET; the body is returned only if it passes [`accept_response`].
    pub async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.random_user_agent());

        if let Some(cookies) = url.host_str().and_then(|h| self.cookie_header_for(h)) {
            request = request.header(COOKIE, cookies);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.config.timeout))?;
        let status = response.status();

        if !is_accepted_status(status) {
            return Err(classify_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.config.timeout))?;
        accept_response(&body, self.config.min_body_len)?;
        Ok(body)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

/// 200 and 201 are the only statuses whose body is considered
pub fn is_accepted_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201)
}

/// Map a non-accepted status onto the failure taxonomy
pub fn classify_status(status: StatusCode) -> FetchError {
    match status.as_u16() {
        403 | 503 | 429 | 520..=527 => FetchError::Blocked {
            status: Some(status.as_u16()),
            detail: status.canonical_reason().unwrap_or("blocked").to_lowercase(),
        },
        code => FetchError::Status(code),
    }
}

pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Sanity check for a 200 body: long enough, an HTML document, not a challenge page.
pub fn accept_response(body: &str, min_len: usize) -> Result<(), FetchError> {
    if is_challenge_page(body) {
        return Err(FetchError::Blocked {
            status: None,
            detail: "anti-bot challenge page".to_string(),
        });
    }
    if body.trim().len() < min_len {
        return Err(FetchError::Blocked {
            status: None,
            detail: format!("implausibly short body ({} bytes)", body.trim().len()),
        });
    }
    if !body.to_lowercase().contains("<html") {
        return Err(FetchError::Blocked {
            status: None,
            detail: "missing <html> root".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<!DOCTYPE html><html><head><title>x</title></head><body>{}</body></html>", body)
    }

    #[tokio::test]
    async fn test_client_creation() {
        assert!(EnhancedHttpClient::new().is_ok());
    }

    #[tokio::test]
    async fn test_bad_settings_do_not_block_client() {
        let config = HttpClientConfig {
            proxy: Some("not a url".to_string()),
            accept_language: "es\nbad".to_string(),
            ..HttpClientConfig::default()
        };
        assert!(EnhancedHttpClient::with_config(config).is_ok());
    }

    #[tokio::test]
    async fn test_random_user_agent_from_pool() {
        let config = HttpClientConfig {
            user_agents: vec!["UA-1".to_string(), "UA-2".to_string()],
            ..HttpClientConfig::default()
        };
        let client = EnhancedHttpClient::with_config(config).unwrap();
        for _ in 0..10 {
            let ua = client.random_user_agent();
            assert!(ua == "UA-1" || ua == "UA-2");
        }
    }

    #[tokio::test]
    async fn test_cookie_header_matches_subdomains() {
        let mut cookies = BTreeMap::new();
        cookies.insert(
            "m440.in".to_string(),
            BTreeMap::from([("cf_clearance".to_string(), "abc".to_string())]),
        );
        let client = EnhancedHttpClient::with_config(HttpClientConfig {
            cookies,
            ..HttpClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.cookie_header_for("m440.in").as_deref(), Some("cf_clearance=abc"));
        assert_eq!(client.cookie_header_for("es.m440.in").as_deref(), Some("cf_clearance=abc"));
        assert_eq!(client.cookie_header_for("xm440.in"), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::FORBIDDEN).is_blocked());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).is_blocked());
        assert_eq!(classify_status(StatusCode::NOT_FOUND), FetchError::Status(404));
        assert!(is_accepted_status(StatusCode::OK));
        assert!(is_accepted_status(StatusCode::CREATED));
        assert!(!is_accepted_status(StatusCode::NO_CONTENT));
    }

    #[test]
    fn test_accept_response() {
        let filler = "x".repeat(400);
        assert!(accept_response(&page(&filler), 256).is_ok());
        assert!(accept_response("<html></html>", 256).unwrap_err().is_blocked());
        assert!(accept_response(&filler, 256).unwrap_err().is_blocked());
        let challenge = page(&format!("<div id=\"cf-challenge-running\"></div>{}", filler));
        assert!(accept_response(&challenge, 256).unwrap_err().is_blocked());
    }
}
