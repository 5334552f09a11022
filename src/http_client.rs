//! HTTP capability
//!
//! Every network step in the pipeline goes through [`HttpTransport`], so
//! the resolution logic never touches `reqwest` directly and can be
//! driven by a scripted transport in tests.
//!
//! [`AcceleratedClient`] is the production transport:
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - TLS 1.3 via rustls, HTTP/2 when the server offers it
//! - Explicit cookie handling (request cookies in, `Set-Cookie` out)
//! - Per-request redirect toggle and `Range` header
//! - Optional upstream proxy
//! - Randomised browser header profile

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use reqwest::header::{HeaderMap, COOKIE, RANGE, SET_COOKIE};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::fingerprint::BrowserProfile;

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Extra headers; these override the client's profile headers.
    pub headers: Vec<(String, String)>,
    pub cookies: BTreeMap<String, String>,
    /// URL-encoded form body.
    pub form: Option<Vec<(String, String)>>,
    /// Value for the `Range` header, e.g. `bytes=0-0`.
    pub range: Option<String>,
    pub follow_redirects: bool,
}

impl HttpRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            cookies: BTreeMap::new(),
            form: None,
            range: None,
            follow_redirects: true,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn headers(mut self, pairs: Vec<(String, String)>) -> Self {
        self.headers.extend(pairs);
        self
    }

    #[must_use]
    pub fn cookies(mut self, cookies: &BTreeMap<String, String>) -> Self {
        self.cookies.extend(cookies.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    #[must_use]
    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    #[must_use]
    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Value of a request header (case-insensitive), last one wins.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field.
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `Cookie` header value for the request cookies.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A received response, body already read as text.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    /// Lower-cased header names; repeated headers joined with `, `.
    pub headers: BTreeMap<String, String>,
    /// Cookies set by this response.
    pub cookies: BTreeMap<String, String>,
    pub body: String,
}

/// Capability performing HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Parse the `name=value` pair that opens a `Set-Cookie` header.
#[must_use]
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// `scheme://host[:port]` of a URL.
#[must_use]
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(parsed.origin().ascii_serialization())
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    out
}

fn collect_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

/// HTTP client with compression, rustls and browser headers
pub struct AcceleratedClient {
    follow: Client,
    no_follow: Client,
    profile: BrowserProfile,
}

impl AcceleratedClient {
    /// Create a client from the resolver config with a random profile
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Self::with_profile(config, BrowserProfile::random())
    }

    /// Create client with specific browser profile
    pub fn with_profile(config: &ResolverConfig, profile: BrowserProfile) -> Result<Self> {
        let follow = Self::builder(config, &profile)?
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let no_follow = Self::builder(config, &profile)?
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            follow,
            no_follow,
            profile,
        })
    }

    fn builder(config: &ResolverConfig, profile: &BrowserProfile) -> Result<reqwest::ClientBuilder> {
        let mut builder = Client::builder()
            // Let the server negotiate HTTP/2
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(profile.to_headers())
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout());

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("proxy {proxy:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }

    /// Browser profile used for default headers
    #[must_use]
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }
}

#[async_trait]
impl HttpTransport for AcceleratedClient {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let client = if request.follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };

        let mut builder = client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = request.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(range) = &request.range {
            builder = builder.header(RANGE, range.as_str());
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());
        let cookies = collect_cookies(response.headers());
        let body = if request.method == Method::HEAD {
            String::new()
        } else {
            response.text().await?
        };

        debug!(status, final_url = %final_url, bytes = body.len(), "Response received");

        Ok(HttpResponse {
            status,
            final_url,
            headers,
            cookies,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_set_cookie_takes_leading_pair() {
        assert_eq!(
            parse_set_cookie("captcha=abc123; path=/; HttpOnly"),
            Some(("captcha".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("PHPSESSID=x=y; secure"),
            Some(("PHPSESSID".to_string(), "x=y".to_string()))
        );
        assert_eq!(parse_set_cookie("=novalue"), None);
        assert_eq!(parse_set_cookie("garbage"), None);
    }

    #[test]
    fn origin_drops_path() {
        assert_eq!(
            origin_of("https://safego.cc/safe.php?url=x").as_deref(),
            Some("https://safego.cc")
        );
        assert_eq!(origin_of("nope"), None);
    }

    #[test]
    fn request_builder_collects_parts() {
        let mut cookies = BTreeMap::new();
        cookies.insert("a".to_string(), "1".to_string());
        cookies.insert("b".to_string(), "2".to_string());

        let req = HttpRequest::post("https://gate.test/x")
            .header("Referer", "https://gate.test/x")
            .cookies(&cookies)
            .form(vec![("captch4".to_string(), "1234".to_string())])
            .range("bytes=0-0")
            .no_redirects();

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header_value("referer"), Some("https://gate.test/x"));
        assert_eq!(req.form_value("captch4"), Some("1234"));
        assert_eq!(req.cookie_header().as_deref(), Some("a=1; b=2"));
        assert_eq!(req.range.as_deref(), Some("bytes=0-0"));
        assert!(!req.follow_redirects);
    }

    #[test]
    fn later_header_overrides_earlier() {
        let req = HttpRequest::get("https://a.test")
            .header("User-Agent", "one")
            .header("user-agent", "two");
        assert_eq!(req.header_value("User-Agent"), Some("two"));
    }

    #[test]
    fn collects_multiple_set_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "a=1; path=/".parse().unwrap());
        headers.append(SET_COOKIE, "b=2".parse().unwrap());
        let cookies = collect_cookies(&headers);
        assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
        assert_eq!(cookies.get("b").map(String::as_str), Some("2"));
        let flat = collect_headers(&headers);
        assert_eq!(flat.get("set-cookie").map(String::as_str), Some("a=1; path=/, b=2"));
    }

    #[test]
    fn client_builds_from_default_config() {
        let client = AcceleratedClient::new(&ResolverConfig::default()).unwrap();
        assert!(!client.profile().user_agent.is_empty());
    }
}
