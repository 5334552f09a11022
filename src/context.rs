//! Borrowed view of the configuration and capabilities a resolution uses.
//!
//! Built once per resolution by [`crate::Pipeline`] and passed by value
//! (it is `Copy`) into every component; nothing in the crate reaches for
//! process-wide state.

use crate::config::ResolverConfig;
use crate::fingerprint::BrowserProfile;
use crate::http_client::HttpTransport;
use crate::ocr::DigitRecognizer;
use crate::session::SessionStore;

#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub config: &'a ResolverConfig,
    pub http: &'a dyn HttpTransport,
    pub ocr: &'a dyn DigitRecognizer,
    pub sessions: &'a dyn SessionStore,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(
        config: &'a ResolverConfig,
        http: &'a dyn HttpTransport,
        ocr: &'a dyn DigitRecognizer,
        sessions: &'a dyn SessionStore,
    ) -> Self {
        Self {
            config,
            http,
            ocr,
            sessions,
        }
    }

    /// Fresh browser headers for one request.
    #[must_use]
    pub fn browser_headers(&self) -> Vec<(String, String)> {
        BrowserProfile::random().header_pairs()
    }

    /// Browser headers with a pinned user agent.
    #[must_use]
    pub fn browser_headers_as(&self, user_agent: &str) -> Vec<(String, String)> {
        BrowserProfile::pinned(user_agent).header_pairs()
    }
}
