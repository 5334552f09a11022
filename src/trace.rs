//! Diagnostic trace of one search
//!
//! Records every scored candidate, which were accepted or rejected and
//! why, and each host attempt. The trace is write-only for the search: it
//! never feeds back into a decision.

use serde::Serialize;

use crate::matcher::{MatchScore, TitleQuery};
use crate::resolver::HostAttempt;

/// Round a ratio to two decimals for display.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A scored candidate post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEntry {
    pub id: String,
    pub title: String,
    pub token_ratio: f64,
    pub sequence_ratio: f64,
    pub overlap: Vec<String>,
    pub accepted: bool,
}

impl CandidateEntry {
    #[must_use]
    pub fn new(id: &str, title: &str, score: &MatchScore) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            token_ratio: round2(score.token_overlap_ratio),
            sequence_ratio: round2(score.sequence_ratio),
            overlap: score.overlap_tokens.iter().cloned().collect(),
            accepted: score.accepted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TitleMismatch,
    YearMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEntry {
    #[serde(flatten)]
    pub candidate: CandidateEntry,
    pub reason: RejectReason,
    /// Year found in the post, for year mismatches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_year: Option<u32>,
}

/// A host attempt made for a post's episode row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostAttempt {
    pub post_id: String,
    #[serde(flatten)]
    pub attempt: HostAttempt,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticTrace {
    pub candidates: Vec<CandidateEntry>,
    pub matched: Vec<CandidateEntry>,
    pub rejected: Vec<RejectedEntry>,
    pub imdb_tokens: Vec<String>,
    pub host_attempts: Vec<PostAttempt>,
}

impl DiagnosticTrace {
    #[must_use]
    pub fn for_query(query: &TitleQuery) -> Self {
        Self {
            imdb_tokens: query.tokens.clone(),
            ..Self::default()
        }
    }

    pub fn candidate(&mut self, entry: CandidateEntry) {
        self.candidates.push(entry);
    }

    pub fn matched(&mut self, entry: CandidateEntry) {
        self.matched.push(entry);
    }

    pub fn reject(&mut self, candidate: CandidateEntry, reason: RejectReason, post_year: Option<u32>) {
        self.rejected.push(RejectedEntry {
            candidate,
            reason,
            post_year,
        });
    }

    pub fn host_attempts(&mut self, post_id: &str, attempts: Vec<HostAttempt>) {
        self.host_attempts
            .extend(attempts.into_iter().map(|attempt| PostAttempt {
                post_id: post_id.to_string(),
                attempt,
            }));
    }

    /// Copy with list fields cut to `limit` entries, for compact output.
    #[must_use]
    pub fn truncated(&self, limit: usize) -> Self {
        Self {
            candidates: self.candidates.iter().take(limit).cloned().collect(),
            matched: self.matched.clone(),
            rejected: self.rejected.iter().take(limit).cloned().collect(),
            imdb_tokens: self.imdb_tokens.clone(),
            host_attempts: self.host_attempts.clone(),
        }
    }
}
