//! Browser header profiles
//!
//! The index site, the CAPTCHA gate and the video hosts all sit behind
//! bot filters that look at request headers. Every client gets a
//! randomised but internally consistent profile; the gate and DeltaBit
//! steps additionally pin the user agents they are known to accept.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT,
};


/// User agent accepted by the CAPTCHA gate.
pub const GATE_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:138.0) Gecko/20100101 Firefox/138.0";

/// User agent accepted by the DeltaBit landing and form pages.
pub const HOST_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// The target sites are Italian; every list keeps Italian in it.
const ACCEPT_LANGUAGES: &[&str] = &[
    "it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7",
    "en-US,en;q=0.8,it;q=0.7",
    "it,en-US;q=0.7,en;q=0.3",
];

const OS_STRINGS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
];

/// Browser family a profile imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
}

impl Browser {
    fn versions(self) -> &'static [&'static str] {
        match self {
            Browser::Chrome => &["136.0.0.0", "135.0.0.0", "134.0.0.0"],
            Browser::Firefox => &["138.0", "137.0"],
            Browser::Safari => &["17.6", "17.5"],
        }
    }

    /// Chrome two thirds of the time, the rest split evenly.
    fn pick(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..6) {
            0..=3 => Browser::Chrome,
            4 => Browser::Firefox,
            _ => Browser::Safari,
        }
    }

    fn user_agent(self, rng: &mut impl Rng) -> String {
        let version = self.versions().choose(rng).copied().unwrap_or_default();
        let os = OS_STRINGS.choose(rng).copied().unwrap_or(OS_STRINGS[0]);
        match self {
            Browser::Chrome => format!(
                "Mozilla/5.0 ({os}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version} Safari/537.36"
            ),
            Browser::Firefox => {
                format!("Mozilla/5.0 ({os}; rv:{version}) Gecko/20100101 Firefox/{version}")
            }
            // Safari only ships on macOS
            Browser::Safari => format!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{version} Safari/605.1.15"
            ),
        }
    }
}

/// Headers one simulated browser sends.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub browser: Browser,
    pub user_agent: String,
    pub accept_language: String,
}

impl BrowserProfile {
    /// Profile for a given browser family.
    #[must_use]
    pub fn of(browser: Browser) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            browser,
            user_agent: browser.user_agent(&mut rng),
            accept_language: ACCEPT_LANGUAGES
                .choose(&mut rng)
                .copied()
                .unwrap_or(ACCEPT_LANGUAGES[0])
                .to_string(),
        }
    }

    /// Profile for a randomly weighted browser family.
    #[must_use]
    pub fn random() -> Self {
        Self::of(Browser::pick(&mut rand::thread_rng()))
    }

    /// Random profile whose user agent is replaced by `user_agent`.
    #[must_use]
    pub fn pinned(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            ..Self::random()
        }
    }

    fn accept_encoding(&self) -> &'static str {
        match self.browser {
            Browser::Safari => "gzip, deflate, br",
            Browser::Chrome | Browser::Firefox => "gzip, deflate, br, zstd",
        }
    }

    /// Per-request header pairs for the transport seam.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept".to_string(), HTML_ACCEPT.to_string()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
        ]
    }

    /// Client-wide default headers. Values that are not valid header
    /// text are skipped.
    #[must_use]
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs = [
            (USER_AGENT, self.user_agent.as_str()),
            (ACCEPT, HTML_ACCEPT),
            (ACCEPT_LANGUAGE, self.accept_language.as_str()),
            (ACCEPT_ENCODING, self.accept_encoding()),
        ];
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(name, value);
            }
        }
        headers
    }
}
