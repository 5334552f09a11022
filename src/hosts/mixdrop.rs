//! MixDrop extractor
//!
//! MixDrop links arrive under several mirror domains. They are rewritten to
//! the canonical `.cv` embed form; in passthrough mode that URL is the
//! result. There is no in-process solver for MixDrop's packed player.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{HostError, HostExtractor, HostKind, HostMedia};
use crate::context::Context;

/// Rewrite mirror aliases to the canonical domain, dropping trailing path noise.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let mut url = url.to_string();
    if url.contains("club") {
        url = truncate_noise(&url.replace("club", "cv"));
    }
    if url.contains("cfd") {
        url = truncate_noise(&url.replace("cfd", "cv").replace("emb", "e"));
    }
    url
}

fn truncate_noise(url: &str) -> String {
    url.split("/2").next().unwrap_or(url).to_string()
}

pub struct MixDrop;

#[async_trait]
impl HostExtractor for MixDrop {
    fn kind(&self) -> HostKind {
        HostKind::MixDrop
    }

    async fn extract(&self, page_url: &str, ctx: Context<'_>) -> Result<HostMedia, HostError> {
        let url = normalize_url(page_url);
        debug!(from = page_url, to = %url, "Normalised MixDrop URL");

        if !ctx.config.passthrough {
            info!(url = %url, "MixDrop needs passthrough mode");
            return Err(HostError::NoSolver);
        }

        Ok(HostMedia {
            url,
            file_name: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn club_alias_is_canonicalised() {
        assert_eq!(
            normalize_url("https://mixdrop.club/f/abc123/2/video.mp4"),
            "https://mixdrop.cv/f/abc123"
        );
    }

    #[test]
    fn cfd_alias_switches_to_embed_path() {
        assert_eq!(
            normalize_url("https://mixdrop.cfd/emb/xyz/2"),
            "https://mixdrop.cv/e/xyz"
        );
    }

    #[test]
    fn canonical_urls_pass_unchanged() {
        let url = "https://mixdrop.cv/e/xyz/2024";
        assert_eq!(normalize_url(url), url);
    }
}
