//! DeltaBit extractor (XFileSharing form protocol)
//!
//! 1. GET the page URL with `Range: bytes=0-0` to collapse redirects
//! 2. GET the landing page with the expected referer
//! 3. Scrape its inputs, add `imhuman` and `referer`
//! 4. Wait, then POST the form back to the landing page
//! 5. Read the media URL from the `sources: ["..."]` array in the reply
//!
//! A reply without sources restarts the whole exchange, up to
//! [`MAX_DELTABIT_ATTEMPTS`] runs.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use super::{HostError, HostExtractor, HostKind, HostMedia};
use crate::config::MAX_DELTABIT_ATTEMPTS;
use crate::context::Context;
use crate::fingerprint::HOST_USER_AGENT;
use crate::form::Form;
use crate::http_client::{origin_of, HttpRequest};

static SOURCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sources:\s*\["([^"]+)""#).expect("static regex"));

/// First URL of a player `sources: [...]` array literal.
#[must_use]
pub fn extract_sources(body: &str) -> Option<String> {
    SOURCES
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct DeltaBit;

impl DeltaBit {
    async fn attempt(&self, page_url: &str, ctx: Context<'_>) -> Result<Attempt, HostError> {
        let config = ctx.config;
        let transport = |e: crate::Error| HostError::Transport(e.to_string());

        let probe = HttpRequest::get(config.proxied(page_url))
            .headers(ctx.browser_headers())
            .range("bytes=0-0");
        let redirected = config.unproxied(&ctx.http.send(probe).await.map_err(transport)?.final_url);
        debug!(url = %redirected, "DeltaBit redirected");

        let landing = HttpRequest::get(config.proxied(&redirected))
            .headers(ctx.browser_headers_as(HOST_USER_AGENT))
            .header("Referer", config.deltabit_referer.as_str());
        let landing = ctx.http.send(landing).await.map_err(transport)?;
        let landing_url = config.unproxied(&landing.final_url);
        debug!(url = %landing_url, "DeltaBit landing page");

        let mut form = Form::from_page(&landing.body);
        form.set("imhuman", "");
        form.set("referer", landing_url.as_str());
        let file_name = form.get("fname").unwrap_or_default().to_string();

        let delay = config.deltabit_delay();
        if !delay.is_zero() {
            debug!(?delay, "Waiting before form POST");
            tokio::time::sleep(delay).await;
        }

        let mut headers = ctx.browser_headers_as(HOST_USER_AGENT);
        if let Some(origin) = origin_of(&landing_url) {
            headers.push(("Origin".to_string(), origin));
        }
        headers.push(("Referer".to_string(), landing_url.clone()));

        let submit = HttpRequest::post(config.proxied(&landing_url))
            .headers(headers)
            .form(form.pairs());
        let reply = ctx.http.send(submit).await.map_err(transport)?;

        Ok(Attempt {
            source: extract_sources(&reply.body),
            file_name,
        })
    }
}

struct Attempt {
    source: Option<String>,
    file_name: String,
}

#[async_trait]
impl HostExtractor for DeltaBit {
    fn kind(&self) -> HostKind {
        HostKind::DeltaBit
    }

    #[instrument(skip(self, ctx))]
    async fn extract(&self, page_url: &str, ctx: Context<'_>) -> Result<HostMedia, HostError> {
        for attempt in 1..=MAX_DELTABIT_ATTEMPTS {
            let result = self.attempt(page_url, ctx).await?;
            if let Some(url) = result.source {
                info!(attempt, url = %url, "DeltaBit source found");
                return Ok(HostMedia {
                    url,
                    file_name: result.file_name,
                });
            }
            warn!(attempt, "No sources in DeltaBit reply");
        }
        Err(HostError::NoSources)
    }
}
