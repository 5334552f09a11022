//! Video host extractors
//!
//! Each supported host turns its own page URL into a playable media URL.
//! The two protocols know nothing about each other; fallback between them
//! is the resolver's job.

pub mod deltabit;
pub mod mixdrop;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;

pub use deltabit::DeltaBit;
pub use mixdrop::MixDrop;

/// Supported video hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    DeltaBit,
    MixDrop,
}

impl HostKind {
    /// Short lowercase host name (`"deltabit"`, `"mixdrop"`).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DeltaBit => "deltabit",
            Self::MixDrop => "mixdrop",
        }
    }

    /// The other supported host.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::DeltaBit => Self::MixDrop,
            Self::MixDrop => Self::DeltaBit,
        }
    }

    /// Whether an anchor's text names this host (case-insensitive).
    #[must_use]
    pub fn matches_link_text(self, text: &str) -> bool {
        text.to_lowercase().contains(self.name())
    }
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Media extracted from a host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMedia {
    pub url: String,
    /// File name advertised by the host, empty when it has none.
    pub file_name: String,
}

/// Why a host page yielded no media.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum HostError {
    /// The host needs a solver this crate does not ship.
    #[error("no solver available for this host")]
    NoSolver,

    #[error("no media sources in host response")]
    NoSources,

    #[error("host request failed: {0}")]
    Transport(String),
}

/// Trait for video host extractors.
#[async_trait]
pub trait HostExtractor: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Turn a host page URL into media.
    async fn extract(&self, page_url: &str, ctx: Context<'_>) -> Result<HostMedia, HostError>;
}

/// Extractor for a host kind.
#[must_use]
pub fn extractor_for(kind: HostKind) -> Box<dyn HostExtractor> {
    match kind {
        HostKind::DeltaBit => Box::new(DeltaBit),
        HostKind::MixDrop => Box::new(MixDrop),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_text_matching_ignores_case() {
        assert!(HostKind::DeltaBit.matches_link_text("DeltaBit"));
        assert!(HostKind::DeltaBit.matches_link_text(" deltabit HD"));
        assert!(HostKind::MixDrop.matches_link_text("MIXDROP"));
        assert!(!HostKind::MixDrop.matches_link_text("DeltaBit"));
    }

    #[test]
    fn kind_serialises_lowercase() {
        assert_eq!(serde_json::to_value(HostKind::MixDrop).unwrap(), "mixdrop");
        let kind: HostKind = serde_json::from_str("\"deltabit\"").unwrap();
        assert_eq!(kind, HostKind::DeltaBit);
        assert_eq!(kind.other(), HostKind::MixDrop);
    }

    #[test]
    fn extractor_matches_kind() {
        assert_eq!(extractor_for(HostKind::DeltaBit).kind(), HostKind::DeltaBit);
        assert_eq!(extractor_for(HostKind::MixDrop).kind(), HostKind::MixDrop);
    }
}
