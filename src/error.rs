//! Error types and the top-level failure taxonomy.
//!
//! [`Error`] covers capability-boundary faults (transport, parsing, I/O).
//! [`FailureReason`] is what a resolution attempt reports to its caller:
//! every outcome that is not a stream list maps to exactly one code.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Library errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("metadata lookup failed: {0}")]
    Metadata(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a resolution attempt produced no streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Identifier carries no season/episode.
    IsMovie,
    /// The index site could not be reached or answered garbage.
    SearchRequestFailed,
    /// The index site returned an empty result set.
    NoSearchResults,
    /// No candidate passed the title matcher.
    NoTitleMatch,
    /// A title matched but no episode row resolved to a stream.
    NoEpisodeMatch,
    /// Every episode row found lacked a supported host anchor.
    NoSupportedHost,
    /// The caller's wall-clock budget expired.
    Timeout,
    /// Unexpected internal error, text attached in diagnostics.
    Exception,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsMovie => "is_movie",
            Self::SearchRequestFailed => "search_request_failed",
            Self::NoSearchResults => "no_search_results",
            Self::NoTitleMatch => "no_title_match",
            Self::NoEpisodeMatch => "no_episode_match",
            Self::NoSupportedHost => "no_supported_host",
            Self::Timeout => "timeout",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_match_serde_names() {
        let all = [
            FailureReason::IsMovie,
            FailureReason::SearchRequestFailed,
            FailureReason::NoSearchResults,
            FailureReason::NoTitleMatch,
            FailureReason::NoEpisodeMatch,
            FailureReason::NoSupportedHost,
            FailureReason::Timeout,
            FailureReason::Exception,
        ];
        for reason in all {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn display_uses_code() {
        assert_eq!(FailureReason::NoEpisodeMatch.to_string(), "no_episode_match");
    }
}
