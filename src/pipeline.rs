//! Pipeline entry point
//!
//! Parses an episode identifier, looks up its title, and drives the search
//! orchestrator. Every outcome comes back as a [`Resolution`]; failures
//! are reported through [`Diagnostics::reason`], never as errors.
//!
//! ```rust,no_run
//! use esolve::{Pipeline, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(ResolverConfig::default())?;
//!     let resolution = pipeline.resolve("tt6156584:4:5").await;
//!     for stream in &resolution.streams {
//!         println!("{} [{}]", stream.url, stream.language);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, LazyLock};

use regex::RegexSet;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::ResolverConfig;
use crate::context::Context;
use crate::error::{Error, FailureReason, Result};
use crate::hosts::HostKind;
use crate::http_client::{AcceleratedClient, HttpTransport};
use crate::matcher::TitleQuery;
use crate::metadata::{ImdbMetadata, MetadataProvider, TitleInfo};
use crate::ocr::{DigitRecognizer, TesseractOcr};
use crate::resolver::ResolvedLink;
use crate::search::SearchOrchestrator;
use crate::session::{FileSessionStore, SessionStore};
use crate::trace::DiagnosticTrace;

static SUB_MARKERS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bsub\b",
        r"(?i)subbed",
        r"(?i)subs",
        r"(?i)ita[-_. ]?sub",
        r"(?i)sub[-_. ]?ita",
    ])
    .expect("static regex set")
});

/// Namespaces whose ids span two `:`-separated fields.
const NAMESPACES: &[&str] = &["tmdb"];

/// A parsed episode identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRef {
    pub raw_id: String,
    /// Identifier without the season/episode suffix (`tt123`, `tmdb:456`).
    pub canonical_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl EpisodeRef {
    /// Parse `<id>` or `<id>:<season>:<episode>`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split(':').collect();
        let id_len = if parts.len() > 1 && NAMESPACES.contains(&parts[0]) {
            2
        } else {
            1
        };

        let canonical_id = parts[..id_len].join(":");
        if parts[..id_len].iter().any(|p| p.trim().is_empty()) {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }

        let rest = &parts[id_len..];
        let (season, episode) = match rest {
            [s, e, ..] => match (s.trim().parse::<u32>(), e.trim().parse::<u32>()) {
                (Ok(s), Ok(e)) => (Some(s), Some(e)),
                _ => (None, None),
            },
            _ => (None, None),
        };

        Ok(Self {
            raw_id: raw.to_string(),
            canonical_id,
            season,
            episode,
        })
    }

    /// Season and episode, when both are present.
    #[must_use]
    pub fn season_episode(&self) -> Option<(u32, u32)> {
        self.season.zip(self.episode)
    }

    #[must_use]
    pub fn is_movie(&self) -> bool {
        self.season_episode().is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ita,
    Sub,
}

impl Language {
    /// `Sub` when a display name carries a subtitle marker.
    #[must_use]
    pub fn detect(display_name: &str) -> Self {
        if SUB_MARKERS.is_match(display_name) {
            Self::Sub
        } else {
            Self::Ita
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ita => "ita",
            Self::Sub => "sub",
        })
    }
}

/// A playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStream {
    pub url: String,
    pub display_name: String,
    pub language: Language,
    pub host: HostKind,
}

impl From<ResolvedLink> for ResolvedStream {
    fn from(link: ResolvedLink) -> Self {
        Self {
            language: Language::detect(&link.display_name),
            url: link.url,
            display_name: link.display_name,
            host: link.host,
        }
    }
}

/// Everything needed to explain a resolution without re-running it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub id: String,
    pub title: Option<String>,
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ocr_available: bool,
    pub passthrough: bool,
    pub trace: DiagnosticTrace,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub streams: Vec<ResolvedStream>,
    pub diagnostics: Diagnostics,
}

impl Resolution {
    fn failed(diagnostics: Diagnostics, reason: FailureReason, error: Option<String>) -> Self {
        Self {
            streams: Vec::new(),
            diagnostics: Diagnostics {
                reason: Some(reason),
                error,
                ..diagnostics
            },
        }
    }
}

/// Owns the configuration and capabilities for resolutions.
pub struct Pipeline {
    config: ResolverConfig,
    http: Arc<dyn HttpTransport>,
    ocr: Arc<dyn DigitRecognizer>,
    sessions: Arc<dyn SessionStore>,
    metadata: Arc<dyn MetadataProvider>,
}

impl Pipeline {
    /// Production wiring: reqwest transport, tesseract, file sessions, IMDb.
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let http: Arc<dyn HttpTransport> = Arc::new(AcceleratedClient::new(&config)?);
        let ocr = Arc::new(TesseractOcr::with_binary(config.tesseract_path.clone()));
        let sessions = Arc::new(FileSessionStore::new(config.session_dir()));
        let metadata = Arc::new(ImdbMetadata::new(Arc::clone(&http)));
        Ok(Self::with_capabilities(config, http, ocr, sessions, metadata))
    }

    #[must_use]
    pub fn with_capabilities(
        config: ResolverConfig,
        http: Arc<dyn HttpTransport>,
        ocr: Arc<dyn DigitRecognizer>,
        sessions: Arc<dyn SessionStore>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            config,
            http,
            ocr,
            sessions,
            metadata,
        }
    }

    /// Whether the OCR capability can run.
    #[must_use]
    pub fn ocr_available(&self) -> bool {
        self.ocr.is_available()
    }

    fn context(&self) -> Context<'_> {
        Context::new(
            &self.config,
            self.http.as_ref(),
            self.ocr.as_ref(),
            self.sessions.as_ref(),
        )
    }

    /// Resolve an identifier to streams.
    #[instrument(skip(self))]
    pub async fn resolve(&self, id: &str) -> Resolution {
        let mut diagnostics = Diagnostics {
            id: id.to_string(),
            ocr_available: self.ocr_available(),
            passthrough: self.config.passthrough,
            ..Diagnostics::default()
        };

        let episode_ref = match EpisodeRef::parse(id) {
            Ok(episode_ref) => episode_ref,
            Err(e) => {
                warn!(error = %e, "Bad identifier");
                return Resolution::failed(diagnostics, FailureReason::Exception, Some(e.to_string()));
            }
        };
        let Some((season, episode)) = episode_ref.season_episode() else {
            info!("Movie identifiers are not supported");
            return Resolution::failed(diagnostics, FailureReason::IsMovie, None);
        };

        let run = self.run(&episode_ref, season, episode, &mut diagnostics);
        let streams = match self.config.overall_timeout() {
            Some(budget) => {
                let finished = tokio::time::timeout(budget, run).await;
                let Ok(streams) = finished else {
                    warn!(?budget, "Resolution timed out");
                    return Resolution::failed(
                        diagnostics,
                        FailureReason::Timeout,
                        Some(format!("no result within {}s", budget.as_secs())),
                    );
                };
                streams
            }
            None => run.await,
        };
        Resolution {
            streams,
            diagnostics,
        }
    }

    /// Metadata lookup and search. Progress lands in `diagnostics` as it
    /// is made, so an expired budget still reports how far the run got.
    async fn run(
        &self,
        episode_ref: &EpisodeRef,
        season: u32,
        episode: u32,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ResolvedStream> {
        let info = match self.metadata.title_and_year(&episode_ref.canonical_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Metadata lookup failed, searching by id");
                diagnostics.metadata_error = Some(e.to_string());
                TitleInfo {
                    title: episode_ref.canonical_id.clone(),
                    year: 0,
                }
            }
        };

        let query = TitleQuery::new(&info.title, info.year);
        diagnostics.title = Some(query.title.clone());
        diagnostics.year = query.year;
        diagnostics.trace = DiagnosticTrace::for_query(&query);
        info!(title = %query.title, year = ?query.year, season, episode, "Searching");

        let outcome = SearchOrchestrator::new(self.context())
            .search(&query, season, episode, &mut diagnostics.trace)
            .await;

        diagnostics.reason = outcome.reason;
        outcome.streams.into_iter().map(ResolvedStream::from).collect()
    }
}
