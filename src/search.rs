//! Search orchestration against the index site's WordPress API
//!
//! ```text
//! GET {site}/wp-json/wp/v2/search?search=<words+joined>&_fields=id
//! GET {site}/wp-json/wp/v2/posts/<id>?_fields=title,content
//! ```
//!
//! Candidates are scored in the order the site returns them. The first
//! title-matched, year-consistent post whose episode row resolves ends the
//! search; posts are never combined.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::context::Context;
use crate::error::FailureReason;
use crate::http_client::HttpRequest;
use crate::locator::{episode_str, locate};
use crate::matcher::{score, TitleQuery};
use crate::resolver::{HostLinkResolver, LinkOutcome, ResolvedLink};
use crate::trace::{CandidateEntry, DiagnosticTrace, RejectReason};

/// Marker the site serves in place of a deleted post.
const INVALID_POST_MARKER: &str = "ID articolo non valido";

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:19|20)\d{2}").expect("static regex"));
static CONTINUE_READING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s+href="([^"]+)"[^>]*>Continua a leggere</a>"#).expect("static regex")
});

/// One post fetched from the index site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePost {
    pub id: String,
    pub raw_title: String,
    pub body_html: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    content: Rendered,
}

/// Result of one search. The decisions behind it are in the trace the
/// caller passed in.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Resolved links from the winning post, in row order; empty on failure.
    pub streams: Vec<ResolvedLink>,
    pub reason: Option<FailureReason>,
}

/// First `19xx`/`20xx` not touching a `/` on either side (so dates in
/// URLs like `/2019/05/` are skipped).
#[must_use]
pub fn extract_year(text: &str) -> Option<u32> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while let Some(m) = YEAR.find_at(text, pos) {
        let before = m.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(m.end()).copied();
        if before != Some(b'/') && after != Some(b'/') {
            return m.as_str().parse().ok();
        }
        pos = m.start() + 1;
    }
    None
}

/// Search query string: words of the title joined by `+`.
#[must_use]
pub fn search_terms(title: &str) -> String {
    title
        .split_whitespace()
        .map(|w| urlencoding::encode(w).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

fn id_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Default)]
struct Progress {
    title_matched: bool,
    rows_found: usize,
    rows_without_host: usize,
}

impl Progress {
    fn reason(&self) -> FailureReason {
        if !self.title_matched {
            FailureReason::NoTitleMatch
        } else if self.rows_found > 0 && self.rows_found == self.rows_without_host {
            FailureReason::NoSupportedHost
        } else {
            FailureReason::NoEpisodeMatch
        }
    }
}

pub struct SearchOrchestrator<'a> {
    ctx: Context<'a>,
}

impl<'a> SearchOrchestrator<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    fn site_url(&self, path: &str) -> String {
        let base = self.ctx.config.site_base.trim_end_matches('/');
        self.ctx.config.proxied(&format!("{base}{path}"))
    }

    async fn get(&self, url: String) -> crate::Result<String> {
        let request = HttpRequest::get(url).headers(self.ctx.browser_headers());
        Ok(self.ctx.http.send(request).await?.body)
    }

    async fn search_ids(&self, query: &TitleQuery) -> Result<Vec<String>, FailureReason> {
        let url = self.site_url(&format!(
            "/wp-json/wp/v2/search?search={}&_fields=id",
            search_terms(&query.title)
        ));
        let body = self.get(url).await.map_err(|e| {
            warn!(error = %e, "Site search failed");
            FailureReason::SearchRequestFailed
        })?;

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Site search returned non-JSON");
            FailureReason::SearchRequestFailed
        })?;
        let hits: Vec<SearchHit> = serde_json::from_value(value).unwrap_or_default();
        if hits.is_empty() {
            return Err(FailureReason::NoSearchResults);
        }
        Ok(hits.iter().map(|h| id_string(&h.id)).collect())
    }

    async fn fetch_post(&self, id: &str) -> Option<CandidatePost> {
        let url = self.site_url(&format!("/wp-json/wp/v2/posts/{id}?_fields=title,content"));
        let body = match self.get(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(post = id, error = %e, "Post fetch failed");
                return None;
            }
        };
        if body.contains(INVALID_POST_MARKER) {
            debug!(post = id, "Post no longer exists");
            return None;
        }
        match serde_json::from_str::<WpPost>(&body) {
            Ok(post) => Some(CandidatePost {
                id: id.to_string(),
                raw_title: post.title.rendered,
                body_html: post.content.rendered,
            }),
            Err(e) => {
                warn!(post = id, error = %e, "Unreadable post");
                None
            }
        }
    }

    /// Year stated by a post, following its "continue reading" link when
    /// the excerpt has none.
    async fn post_year(&self, post: &CandidatePost) -> Option<u32> {
        if let Some(year) = extract_year(&post.body_html) {
            return Some(year);
        }
        let href = CONTINUE_READING.captures(&post.body_html)?.get(1)?.as_str();
        match self.get(self.ctx.config.proxied(href)).await {
            Ok(page) => extract_year(&page),
            Err(e) => {
                debug!(post = %post.id, error = %e, "Full post fetch failed");
                None
            }
        }
    }

    /// Find and resolve `season`/`episode` for the query.
    ///
    /// Every candidate and host attempt is recorded in `trace` as it
    /// happens, so a search abandoned midway still leaves its progress
    /// behind.
    #[instrument(skip(self, query, trace), fields(title = %query.title))]
    pub async fn search(
        &self,
        query: &TitleQuery,
        season: u32,
        episode: u32,
        trace: &mut DiagnosticTrace,
    ) -> SearchOutcome {
        let ids = match self.search_ids(query).await {
            Ok(ids) => ids,
            Err(reason) => {
                info!(%reason, "Search ended early");
                return SearchOutcome {
                    streams: Vec::new(),
                    reason: Some(reason),
                };
            }
        };
        debug!(?ids, "Search hits");

        let episode = episode_str(episode);
        let resolver = HostLinkResolver::new(self.ctx);
        let mut progress = Progress::default();

        for id in ids {
            let Some(post) = self.fetch_post(&id).await else {
                continue;
            };

            let match_score = score(query, &post.raw_title);
            let entry = CandidateEntry::new(&post.id, &post.raw_title, &match_score);
            trace.candidate(entry.clone());
            debug!(
                post = %post.id,
                token_ratio = match_score.token_overlap_ratio,
                sequence_ratio = match_score.sequence_ratio,
                accepted = match_score.accepted,
                "Scored candidate"
            );

            if !match_score.accepted {
                trace.reject(entry, RejectReason::TitleMismatch, None);
                continue;
            }
            progress.title_matched = true;

            if let Some(wanted) = query.year {
                if let Some(found) = self.post_year(&post).await.filter(|y| *y != wanted) {
                    info!(post = %post.id, wanted, found, "Year mismatch");
                    trace.reject(entry, RejectReason::YearMismatch, Some(found));
                    continue;
                }
            }
            trace.matched(entry);

            let rows = locate(&post.body_html, season, &episode);
            if rows.is_empty() {
                info!(post = %post.id, season, %episode, "Episode not listed in post");
                continue;
            }

            let mut streams: Vec<ResolvedLink> = Vec::new();
            for row in rows {
                progress.rows_found += 1;
                if !row.has_links() {
                    progress.rows_without_host += 1;
                    continue;
                }
                let resolution = resolver.resolve(row.anchor_markup()).await;
                trace.host_attempts(&post.id, resolution.attempts);
                match resolution.outcome {
                    LinkOutcome::Resolved(link) => {
                        if !streams.iter().any(|s| s.url == link.url) {
                            streams.push(link);
                        }
                    }
                    LinkOutcome::NoSupportedHost => progress.rows_without_host += 1,
                    LinkOutcome::Unresolved => {}
                }
            }

            if !streams.is_empty() {
                info!(post = %post.id, streams = streams.len(), "Episode resolved");
                return SearchOutcome {
                    streams,
                    reason: None,
                };
            }
        }

        let reason = progress.reason();
        info!(%reason, "No stream resolved");
        SearchOutcome {
            streams: Vec::new(),
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_skips_url_dates() {
        assert_eq!(extract_year("uploads/2019/05/poster.jpg Anno 2021"), Some(2021));
        assert_eq!(extract_year("<p>Good Trouble (2019)</p>"), Some(2019));
        assert_eq!(extract_year("no year here 1850"), None);
        assert_eq!(extract_year("/2018"), None);
    }

    #[test]
    fn year_takes_first_candidate() {
        assert_eq!(extract_year("dal 2005 al 2012"), Some(2005));
    }

    #[test]
    fn terms_join_with_plus() {
        assert_eq!(search_terms("Good  Trouble"), "Good+Trouble");
        assert_eq!(search_terms("Grey's Anatomy"), "Grey%27s+Anatomy");
    }

    #[test]
    fn id_from_number_or_string() {
        assert_eq!(id_string(&serde_json::json!(123)), "123");
        assert_eq!(id_string(&serde_json::json!("abc")), "abc");
    }

    #[test]
    fn reason_precedence() {
        let mut progress = Progress::default();
        assert_eq!(progress.reason(), FailureReason::NoTitleMatch);
        progress.title_matched = true;
        assert_eq!(progress.reason(), FailureReason::NoEpisodeMatch);
        progress.rows_found = 2;
        progress.rows_without_host = 2;
        assert_eq!(progress.reason(), FailureReason::NoSupportedHost);
        progress.rows_without_host = 1;
        assert_eq!(progress.reason(), FailureReason::NoEpisodeMatch);
    }
}
