//! Host link resolution
//!
//! An episode row links to each host through a click-through URL that
//! redirects to a CAPTCHA gate, which in turn reveals the host page:
//!
//! ```text
//! row anchor ──HEAD──▶ gate URL ──CaptchaGate──▶ host page ──extractor──▶ media
//! ```
//!
//! The preferred host is tried first; any failure along that chain falls
//! back to the other host when the row offers it. Attempts run strictly in
//! sequence so the log shows which host produced the result.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::captcha::{CaptchaGate, GateFailure, GateOutcome, Passage};
use crate::context::Context;
use crate::hosts::{extractor_for, HostError, HostKind};
use crate::html::anchors;
use crate::http_client::HttpRequest;

/// A host link resolved to media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    pub url: String,
    /// File name reported by the host, may be empty.
    pub display_name: String,
    pub host: HostKind,
}

/// Why one host's link could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum HostFailure {
    #[error("click-through request failed: {0}")]
    ClickThrough(String),

    #[error(transparent)]
    Gate(GateFailure),

    #[error(transparent)]
    Extract(HostError),
}

/// Log entry for one host tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostAttempt {
    pub host: HostKind,
    /// How the gate was passed, when it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<Passage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<HostFailure>,
}

/// Terminal result for one block of host anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Resolved(ResolvedLink),
    /// Supported hosts were present but none resolved.
    Unresolved,
    /// The markup names no supported host.
    NoSupportedHost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolution {
    pub outcome: LinkOutcome,
    pub attempts: Vec<HostAttempt>,
}

/// Candidate hosts in markup, in try order: `preferred` first.
///
/// Only the first anchor with an `href` per host is kept.
#[must_use]
pub fn select_hosts(anchor_markup: &str, preferred: HostKind) -> Vec<(HostKind, String)> {
    let found = anchors(anchor_markup);
    [preferred, preferred.other()]
        .into_iter()
        .filter_map(|kind| {
            found
                .iter()
                .filter(|a| kind.matches_link_text(&a.text))
                .find_map(|a| a.href.clone())
                .map(|href| (kind, href))
        })
        .collect()
}

pub struct HostLinkResolver<'a> {
    ctx: Context<'a>,
}

impl<'a> HostLinkResolver<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Resolve the first host in `anchor_markup` that yields media.
    #[instrument(skip(self, anchor_markup))]
    pub async fn resolve(&self, anchor_markup: &str) -> LinkResolution {
        let hosts = select_hosts(anchor_markup, self.ctx.config.preferred_host);
        if hosts.is_empty() {
            info!("No supported host in episode row");
            return LinkResolution {
                outcome: LinkOutcome::NoSupportedHost,
                attempts: Vec::new(),
            };
        }

        let mut attempts = Vec::with_capacity(hosts.len());
        for (kind, href) in hosts {
            let attempt = self.resolve_host(kind, &href).await;
            let resolved = attempt.url.clone().map(|url| ResolvedLink {
                url,
                display_name: attempt.display_name.clone(),
                host: kind,
            });
            attempts.push(attempt.record);

            if let Some(link) = resolved {
                info!(host = %kind, url = %link.url, "Host link resolved");
                return LinkResolution {
                    outcome: LinkOutcome::Resolved(link),
                    attempts,
                };
            }
        }

        LinkResolution {
            outcome: LinkOutcome::Unresolved,
            attempts,
        }
    }

    async fn resolve_host(&self, kind: HostKind, href: &str) -> SingleHost {
        let mut record = HostAttempt {
            host: kind,
            gate: None,
            url: None,
            failure: None,
        };
        let fail = |record: HostAttempt, failure: HostFailure| {
            warn!(host = %kind, %failure, "Host link failed");
            SingleHost {
                record: HostAttempt {
                    failure: Some(failure),
                    ..record
                },
                url: None,
                display_name: String::new(),
            }
        };

        let config = self.ctx.config;
        let probe = HttpRequest::head(config.proxied(href))
            .headers(self.ctx.browser_headers())
            .range("bytes=0-0");
        let gate_url = match self.ctx.http.send(probe).await {
            Ok(response) => config.unproxied(&response.final_url),
            Err(e) => return fail(record, HostFailure::ClickThrough(e.to_string())),
        };
        debug!(host = %kind, gate = %gate_url, "Click-through landed");

        let page_url = match CaptchaGate::new(self.ctx).pass(&gate_url).await {
            GateOutcome::Done { href, passage } => {
                record.gate = Some(passage);
                href
            }
            GateOutcome::Failed(failure) => return fail(record, HostFailure::Gate(failure)),
        };

        match extractor_for(kind).extract(&page_url, self.ctx).await {
            Ok(media) => {
                record.url = Some(media.url.clone());
                SingleHost {
                    record,
                    url: Some(media.url),
                    display_name: media.file_name,
                }
            }
            Err(e) => fail(record, HostFailure::Extract(e)),
        }
    }
}

struct SingleHost {
    record: HostAttempt,
    url: Option<String>,
    display_name: String,
}
