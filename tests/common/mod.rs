//! Scripted capabilities for pipeline tests.
//!
//! `ScriptedTransport` answers requests from a list of route closures and
//! keeps a log of everything it was asked, so tests can assert both the
//! outcome and the exact request sequence.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use esolve::{
    DigitRecognizer, Error, HttpRequest, HttpResponse, HttpTransport, MetadataProvider, OcrError,
    Pipeline, ResolverConfig, SessionStore, TitleInfo,
};

type Route = Box<dyn Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Vec<Route>,
    log: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route; the first route returning `Some` answers.
    pub fn route(
        mut self,
        handler: impl Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Box::new(handler));
        self
    }

    /// Delay every response.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> esolve::Result<HttpResponse> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = self
            .routes
            .iter()
            .find_map(|route| route(&request))
            .ok_or_else(|| Error::Transport(format!("no route for {} {}", request.method, request.url)))?;
        Ok(HttpResponse {
            final_url: if response.final_url.is_empty() {
                request.url.clone()
            } else {
                response.final_url
            },
            ..response
        })
    }
}

/// 200 response with a body.
pub fn ok(body: impl Into<String>) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.into(),
        ..HttpResponse::default()
    }
}

/// Response that ended up at `url` after redirects.
pub fn landed_at(url: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        final_url: url.to_string(),
        ..HttpResponse::default()
    }
}

pub fn with_cookies(mut response: HttpResponse, pairs: &[(&str, &str)]) -> HttpResponse {
    response.cookies = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect::<BTreeMap<_, _>>();
    response
}

/// OCR fake that counts calls.
pub struct FakeOcr {
    digits: Option<String>,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn reading(digits: &str) -> Self {
        Self {
            digits: Some(digits.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            digits: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DigitRecognizer for FakeOcr {
    fn is_available(&self) -> bool {
        self.digits.is_some()
    }

    async fn recognize_digits(&self, _image: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.digits
            .clone()
            .ok_or_else(|| OcrError::Unavailable("tesseract binary not found".into()))
    }
}

pub struct FakeMetadata {
    result: Option<TitleInfo>,
}

impl FakeMetadata {
    pub fn title(title: &str, year: u32) -> Self {
        Self {
            result: Some(TitleInfo {
                title: title.to_string(),
                year,
            }),
        }
    }

    pub fn failing() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadata {
    async fn title_and_year(&self, _canonical_id: &str) -> esolve::Result<TitleInfo> {
        self.result
            .clone()
            .ok_or_else(|| Error::Metadata("IMDb returned HTTP 503".into()))
    }
}

// ─── Index site fixture ──────────────────────────────────────────────────────

pub const SITE: &str = "https://es.test";
pub const GATE_HOST: &str = "safego.test";
pub const CHALLENGE_PNG_B64: &str = "aGVsbG8=";
pub const ANSWER: &str = "4819";

pub fn test_config() -> ResolverConfig {
    ResolverConfig {
        site_base: SITE.to_string(),
        deltabit_delay_ms: 0,
        ..ResolverConfig::default()
    }
}

pub fn search_url(terms: &str) -> String {
    format!("{SITE}/wp-json/wp/v2/search?search={terms}&_fields=id")
}

pub fn post_url(id: u32) -> String {
    format!("{SITE}/wp-json/wp/v2/posts/{id}?_fields=title,content")
}

pub fn post_json(title: &str, content: &str) -> String {
    serde_json::json!({
        "title": { "rendered": title },
        "content": { "rendered": content },
    })
    .to_string()
}

/// Episode row with links for the given hosts (`("DeltaBit", "https://clicka.test/d/405")`).
pub fn episode_row(marker: &str, name: &str, links: &[(&str, &str)]) -> String {
    let anchors: Vec<String> = links
        .iter()
        .map(|(text, href)| format!(r#"<a href="{href}" target="_blank">{text}</a>"#))
        .collect();
    format!("{marker} {name} – {}<br />\n", anchors.join(" | "))
}

pub fn gate_url(tag: &str) -> String {
    format!("https://{GATE_HOST}/safe.php?url={tag}")
}

const CHALLENGE_PAGE: &str = r#"<html><body><form method="post">
<img src="data:image/png;base64,aGVsbG8=" />
<input type="text" name="captch4" />
</form></body></html>"#;

/// CAPTCHA gate fixture.
///
/// A POST carrying `captcha=ok` (or the right answer) gets the onward link
/// for its `url=` tag; anything else gets the challenge page.
pub fn gate_route(
    onward: Vec<(&'static str, &'static str)>,
) -> impl Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static {
    move |req: &HttpRequest| {
        let prefix = format!("https://{GATE_HOST}/safe.php?url=");
        let tag = req.url.strip_prefix(&prefix)?;
        let (_, href) = onward.iter().find(|(t, _)| *t == tag)?;
        let link = ok(format!(r#"<p>Prosegui: <a href="{href}">{href}</a></p>"#));

        if req.method == http::Method::GET {
            return Some(with_cookies(ok(CHALLENGE_PAGE), &[("PHPSESSID", "s1")]));
        }
        if req.form_value("captch4") == Some(ANSWER) {
            return Some(with_cookies(link, &[("captcha", "ok")]));
        }
        if req.cookies.get("captcha").map(String::as_str) == Some("ok") {
            return Some(link);
        }
        Some(ok(CHALLENGE_PAGE))
    }
}

/// DeltaBit fixture: landing page with hidden inputs, sources on POST.
pub fn deltabit_route(
    page: &'static str,
    file_name: &'static str,
    media: Option<&'static str>,
) -> impl Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync + 'static {
    move |req: &HttpRequest| {
        if req.url != page {
            return None;
        }
        if req.method == http::Method::POST {
            return Some(match media {
                Some(url) if req.form_value("imhuman") == Some("") => {
                    ok(format!(r#"<script>jwplayer().setup({{sources: ["{url}"]}});</script>"#))
                }
                _ => ok("<html>Wait</html>"),
            });
        }
        if req.range.is_some() {
            return Some(landed_at(page));
        }
        Some(ok(format!(
            r#"<form method="POST">
<input type="hidden" name="op" value="download1">
<input type="hidden" name="id" value="abc123">
<input type="hidden" name="fname" value="{file_name}">
<input type="hidden" name="hash" value="f00d">
<input type="submit" name="imhuman" value="Proceed to video">
</form>"#
        )))
    }
}

pub fn pipeline(
    config: ResolverConfig,
    transport: Arc<ScriptedTransport>,
    ocr: Arc<FakeOcr>,
    sessions: Arc<dyn SessionStore>,
    metadata: FakeMetadata,
) -> Pipeline {
    Pipeline::with_capabilities(config, transport, ocr, sessions, Arc::new(metadata))
}
