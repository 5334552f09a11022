//! Title metadata lookup
//!
//! The pipeline only needs a title and a release year for an identifier.
//! [`ImdbMetadata`] reads both from the IMDb title page's `<title>` tag,
//! e.g. `Chief of War (2024) - IMDb`.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::http_client::{HttpRequest, HttpTransport};

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>([^<]+)</title>").expect("static regex"));
static IMDB_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*IMDb.*$").expect("static regex"));
static PAREN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})\)").expect("static regex"));
static TRAILING_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("static regex"));

/// Title and year for an identifier; `year == 0` means unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleInfo {
    pub title: String,
    pub year: u32,
}

/// Capability mapping a canonical identifier to title and year.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn title_and_year(&self, canonical_id: &str) -> Result<TitleInfo>;
}

/// Parse an IMDb page `<title>` into title and year.
#[must_use]
pub fn parse_imdb_title(page: &str) -> Option<TitleInfo> {
    let full = TITLE_TAG.captures(page)?.get(1)?.as_str();
    let title = IMDB_SUFFIX.replace(full, "");
    let title = title.trim();

    let year = PAREN_YEAR
        .captures(title)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    let title = PAREN_YEAR.replace_all(title, "");
    let title = TRAILING_PARENS.replace(title.trim(), "");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");

    if title.is_empty() {
        return None;
    }
    Some(TitleInfo { title, year })
}

/// IMDb title-page scraper
pub struct ImdbMetadata {
    http: Arc<dyn HttpTransport>,
    base: String,
}

impl ImdbMetadata {
    #[must_use]
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self::with_base(http, "https://www.imdb.com")
    }

    /// Use a different site root (mirrors, tests).
    #[must_use]
    pub fn with_base(http: Arc<dyn HttpTransport>, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }
}

#[async_trait]
impl MetadataProvider for ImdbMetadata {
    #[instrument(skip(self))]
    async fn title_and_year(&self, canonical_id: &str) -> Result<TitleInfo> {
        if !canonical_id.starts_with("tt") {
            debug!("Not an IMDb id, using it as title");
            return Ok(TitleInfo {
                title: canonical_id.to_string(),
                year: 0,
            });
        }

        let url = format!("{}/title/{canonical_id}/", self.base.trim_end_matches('/'));
        let response = self.http.send(HttpRequest::get(url)).await?;
        if response.status != 200 {
            return Err(Error::Metadata(format!("IMDb returned HTTP {}", response.status)));
        }

        let info = parse_imdb_title(&response.body)
            .ok_or_else(|| Error::Metadata("no <title> on IMDb page".into()))?;
        debug!(title = %info.title, year = info.year, "IMDb metadata");
        Ok(info)
    }
}
