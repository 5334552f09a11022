//! Title matching
//!
//! Index-site post titles are noisy: HTML entities, season suffixes,
//! Italian articles, punctuation. A candidate is scored against the
//! reference title with two signals:
//!
//! - **token overlap**: share of significant query tokens present in the
//!   candidate's token set
//! - **sequence ratio**: Ratcliff/Obershelp similarity of the two
//!   normalised strings, in `[0, 1]`
//!
//! Single-token titles are too ambiguous for overlap alone and need a
//! near-exact string. Multi-token titles tolerate partial overlap but must
//! contain the query's first token.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Tokens that carry no identity (Italian/English articles, genre words).
pub const STOPWORDS: &[&str] = &[
    "the", "la", "le", "lo", "gli", "i", "il", "di", "da", "a", "in", "of", "and", "or", "serie",
    "series", "season", "show", "tv", "una", "un", "uno", "del", "della", "degli", "delle", "de",
    "el",
];

/// Minimum sequence ratio for a single-token query.
pub const SINGLE_TOKEN_MIN_SEQUENCE: f64 = 0.85;
/// Minimum sequence ratio when at least two tokens overlap.
pub const OVERLAP_MIN_SEQUENCE: f64 = 0.55;
/// Token overlap ratio that accepts on its own.
pub const MIN_TOKEN_RATIO: f64 = 0.7;
/// Sequence ratio that accepts on its own.
pub const STRONG_SEQUENCE: f64 = 0.85;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#x[0-9a-f]+|#[0-9]+|[a-z]+);?").expect("static regex")
});
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

/// Lowercase, strip entities, collapse punctuation runs to single spaces.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let no_entities = ENTITY.replace_all(&lower, " ");
    let spaced = NON_ALNUM.replace_all(&no_entities, " ");
    spaced.trim().to_string()
}

fn is_significant(token: &str) -> bool {
    !STOPWORDS.contains(&token)
        && (token.len() > 2 || token.chars().all(|c| c.is_ascii_digit()))
}

/// Significant tokens in title order, first occurrence only.
#[must_use]
pub fn tokens(title: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    normalize_title(title)
        .split_whitespace()
        .filter(|t| is_significant(t))
        .filter(|t| seen.insert((*t).to_string()))
        .map(str::to_string)
        .collect()
}

/// Reference title built once from metadata output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleQuery {
    pub title: String,
    pub normalized_title: String,
    /// `None` when the metadata source did not know the year.
    pub year: Option<u32>,
    /// Significant tokens in title order.
    pub tokens: Vec<String>,
    pub token_set: BTreeSet<String>,
}

impl TitleQuery {
    /// Build from a title and a metadata year (0 = unknown).
    #[must_use]
    pub fn new(title: &str, year: u32) -> Self {
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        let tokens = tokens(&title);
        Self {
            normalized_title: normalize_title(&title),
            year: (year != 0).then_some(year),
            token_set: tokens.iter().cloned().collect(),
            tokens,
            title,
        }
    }

    /// The most discriminative token: the first significant one.
    #[must_use]
    pub fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }
}

/// Outcome of scoring one candidate title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchScore {
    pub token_overlap_ratio: f64,
    pub sequence_ratio: f64,
    pub overlap_tokens: BTreeSet<String>,
    pub candidate_tokens: BTreeSet<String>,
    pub accepted: bool,
}

/// Score a candidate title against the query. Pure and deterministic.
#[must_use]
pub fn score(query: &TitleQuery, candidate_title: &str) -> MatchScore {
    let candidate_tokens: BTreeSet<String> = tokens(candidate_title).into_iter().collect();
    let overlap_tokens: BTreeSet<String> = query
        .token_set
        .intersection(&candidate_tokens)
        .cloned()
        .collect();

    let token_overlap_ratio = if query.token_set.is_empty() {
        0.0
    } else {
        overlap_tokens.len() as f64 / query.token_set.len() as f64
    };
    let sequence_ratio = if query.normalized_title.is_empty() {
        0.0
    } else {
        sequence_ratio(&query.normalized_title, &normalize_title(candidate_title))
    };

    let accepted = if query.token_set.len() == 1 {
        overlap_tokens.len() == 1 && sequence_ratio >= SINGLE_TOKEN_MIN_SEQUENCE
    } else {
        let has_first = query
            .first_token()
            .is_some_and(|first| candidate_tokens.contains(first));
        has_first
            && ((overlap_tokens.len() >= 2 && sequence_ratio >= OVERLAP_MIN_SEQUENCE)
                || token_overlap_ratio >= MIN_TOKEN_RATIO
                || sequence_ratio >= STRONG_SEQUENCE)
    };

    MatchScore {
        token_overlap_ratio,
        sequence_ratio,
        overlap_tokens,
        candidate_tokens,
        accepted,
    }
}

/// Ratcliff/Obershelp similarity: `2 * matched / (len(a) + len(b))`.
///
/// Matched characters are counted by taking the longest common block,
/// then recursing on the unmatched left and right sides. Ties resolve to
/// the block starting earliest in `a`, then earliest in `b`.
#[must_use]
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo;
            if a[i] == b[j] {
                let k = prev[col] + 1;
                cur[col + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            } else {
                cur[col + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (best_i, best_j, best_k)
}
