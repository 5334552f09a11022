//! Episode row location
//!
//! Posts list episodes one per line, e.g.
//!
//! ```text
//! 4&#215;05 Titolo episodio – <a href="...">DeltaBit</a> | <a href="...">MixDrop</a><br />
//! ```
//!
//! Editors write the season/episode separator three different ways; the
//! patterns are tried in a fixed order and the first one that matches
//! anything wins outright.

use regex::Regex;

/// Separator between the episode name and its per-host link block.
pub const LINK_BLOCK_SEPARATOR: &str = " – ";

/// One episode row captured from a post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRow {
    /// Everything after the season/episode marker up to the line break.
    pub raw: String,
}

impl EpisodeRow {
    /// Whether the row carries any links at all.
    #[must_use]
    pub fn has_links(&self) -> bool {
        self.raw.contains("href")
    }

    /// Markup holding the host anchors: the part after the name separator,
    /// or the whole row when there is no separator.
    #[must_use]
    pub fn anchor_markup(&self) -> &str {
        self.raw
            .split_once(LINK_BLOCK_SEPARATOR)
            .map_or(self.raw.as_str(), |(_, links)| links)
    }
}

/// Row patterns for a season/episode, in precedence order.
fn row_patterns(season: u32, episode: &str) -> Vec<Regex> {
    let tail = r"\s*(.*?)<br\s*/?>";
    [
        format!(r"\b{season}&#215;{episode}{tail}"),
        format!(r"\b{season}[xX×]{episode}{tail}"),
        format!(r"S{season:02}E{episode}{tail}"),
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
}

/// Zero-padded two-digit episode string (`5` -> `"05"`).
#[must_use]
pub fn episode_str(episode: u32) -> String {
    format!("{episode:02}")
}

/// Find the rows for `season`/`episode` in a post body.
///
/// An empty result means the post does not list this episode.
#[must_use]
pub fn locate(body_html: &str, season: u32, episode: &str) -> Vec<EpisodeRow> {
    for pattern in row_patterns(season, episode) {
        let rows: Vec<EpisodeRow> = pattern
            .captures_iter(body_html)
            .filter_map(|c| c.get(1))
            .map(|m| EpisodeRow {
                raw: m.as_str().to_string(),
            })
            .collect();
        if !rows.is_empty() {
            return rows;
        }
    }
    Vec::new()
}
