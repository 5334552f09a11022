//! CAPTCHA gate traversal
//!
//! Gate pages sit between a click-through link and the real host page.
//! With a valid session cookie the gate answers a bare POST with the
//! onward link; otherwise it shows a numeric CAPTCHA image that has to be
//! read and submitted.
//!
//! ```text
//! CheckCached ──link──────────────────────────────────────▶ Done
//!      │ no link
//!      ▼
//! FetchChallenge ──no image──▶ Failed(NoChallengeImage)
//!      ▼
//! Solve ──OCR unavailable / no digits──▶ Failed(OcrUnavailable)
//!      ▼
//! Submit ──link──▶ Done
//!      │ no link: back to FetchChallenge while attempts remain,
//!      └────────── then Failed(RetriesExhausted)
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::MAX_CAPTCHA_ATTEMPTS;
use crate::context::Context;
use crate::fingerprint::GATE_USER_AGENT;
use crate::html::{first_anchor_href, first_image_src};
use crate::http_client::{origin_of, HttpRequest};
use crate::session::{scope_for, CaptchaSession};

/// Form field carrying the CAPTCHA answer.
pub const ANSWER_FIELD: &str = "captch4";

/// Why a gate could not be passed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GateFailure {
    #[error("gate page has no challenge image")]
    NoChallengeImage,

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("CAPTCHA not accepted after {} attempts", MAX_CAPTCHA_ATTEMPTS)]
    RetriesExhausted,

    #[error("gate request failed: {0}")]
    Transport(String),
}

/// How a gate was passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Passage {
    /// A persisted session was still valid.
    Cached,
    /// A challenge was solved on this call.
    Solved,
}

/// Terminal state of a gate traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Done { href: String, passage: Passage },
    Failed(GateFailure),
}

enum State {
    CheckCached,
    FetchChallenge { attempt: u32 },
    Solve { attempt: u32, image: Vec<u8>, cookies: BTreeMap<String, String> },
    Submit { attempt: u32, digits: String, cookies: BTreeMap<String, String> },
    Done { href: String, passage: Passage },
    Failed(GateFailure),
}

/// Decode the payload of a `data:image/...;base64,` URI.
#[must_use]
pub fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    let (_, payload) = src.split_once(',')?;
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).ok().filter(|bytes| !bytes.is_empty())
}

/// Walks one gate URL to the host page link.
pub struct CaptchaGate<'a> {
    ctx: Context<'a>,
}

impl<'a> CaptchaGate<'a> {
    #[must_use]
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    fn gate_headers(&self, gate_url: &str) -> Vec<(String, String)> {
        let mut headers = self.ctx.browser_headers_as(GATE_USER_AGENT);
        if let Some(origin) = origin_of(gate_url) {
            headers.push(("Origin".to_string(), origin));
        }
        headers.push(("Referer".to_string(), gate_url.to_string()));
        headers
    }

    fn load_session(&self, scope: &str) -> CaptchaSession {
        self.ctx.sessions.read(scope).unwrap_or_else(|e| {
            warn!(scope, error = %e, "Session store read failed, starting fresh");
            CaptchaSession::default()
        })
    }

    /// Run the gate state machine to a terminal state.
    #[instrument(skip(self), fields(scope = tracing::field::Empty))]
    pub async fn pass(&self, gate_url: &str) -> GateOutcome {
        let scope = scope_for(gate_url);
        tracing::Span::current().record("scope", scope.as_str());

        let mut state = State::CheckCached;
        loop {
            state = match state {
                State::CheckCached => self.check_cached(gate_url, &scope).await,
                State::FetchChallenge { attempt } => self.fetch_challenge(gate_url, attempt).await,
                State::Solve {
                    attempt,
                    image,
                    cookies,
                } => self.solve(attempt, &image, cookies).await,
                State::Submit {
                    attempt,
                    digits,
                    cookies,
                } => self.submit(gate_url, &scope, attempt, &digits, cookies).await,
                State::Done { href, passage } => return GateOutcome::Done { href, passage },
                State::Failed(failure) => {
                    warn!(%failure, "Gate failed");
                    return GateOutcome::Failed(failure);
                }
            };
        }
    }

    async fn check_cached(&self, gate_url: &str, scope: &str) -> State {
        let session = self.load_session(scope);
        debug!(cached = !session.is_empty(), "Checking gate session");
        let request = HttpRequest::post(self.ctx.config.proxied(gate_url))
            .headers(self.gate_headers(gate_url))
            .cookies(&session.cookies);

        match self.ctx.http.send(request).await {
            Ok(response) => match first_anchor_href(&response.body) {
                Some(href) => {
                    info!("Gate passed with cached session");
                    State::Done {
                        href,
                        passage: Passage::Cached,
                    }
                }
                None => State::FetchChallenge { attempt: 1 },
            },
            Err(e) => State::Failed(GateFailure::Transport(e.to_string())),
        }
    }

    async fn fetch_challenge(&self, gate_url: &str, attempt: u32) -> State {
        debug!(attempt, "Fetching CAPTCHA challenge");
        let request = HttpRequest::get(self.ctx.config.proxied(gate_url))
            .headers(self.ctx.browser_headers_as(GATE_USER_AGENT));

        let response = match self.ctx.http.send(request).await {
            Ok(response) => response,
            Err(e) => return State::Failed(GateFailure::Transport(e.to_string())),
        };

        match first_image_src(&response.body).and_then(|src| decode_data_uri(&src)) {
            Some(image) => State::Solve {
                attempt,
                image,
                cookies: response.cookies,
            },
            None => State::Failed(GateFailure::NoChallengeImage),
        }
    }

    async fn solve(&self, attempt: u32, image: &[u8], cookies: BTreeMap<String, String>) -> State {
        match self.ctx.ocr.recognize_digits(image).await {
            Ok(digits) if !digits.is_empty() => {
                debug!(attempt, %digits, "OCR result");
                State::Submit {
                    attempt,
                    digits,
                    cookies,
                }
            }
            Ok(_) => State::Failed(GateFailure::OcrUnavailable("no digits recognised".into())),
            Err(e) => State::Failed(GateFailure::OcrUnavailable(e.to_string())),
        }
    }

    async fn submit(
        &self,
        gate_url: &str,
        scope: &str,
        attempt: u32,
        digits: &str,
        mut cookies: BTreeMap<String, String>,
    ) -> State {
        let request = HttpRequest::post(self.ctx.config.proxied(gate_url))
            .headers(self.gate_headers(gate_url))
            .cookies(&cookies)
            .form(vec![(ANSWER_FIELD.to_string(), digits.to_string())]);

        let response = match self.ctx.http.send(request).await {
            Ok(response) => response,
            Err(e) => return State::Failed(GateFailure::Transport(e.to_string())),
        };

        if !response.cookies.is_empty() {
            cookies.extend(response.cookies);
            let session = CaptchaSession { cookies };
            if let Err(e) = self.ctx.sessions.write(scope, &session) {
                warn!(scope, error = %e, "Could not persist gate session");
            }
        }

        match first_anchor_href(&response.body) {
            Some(href) => {
                info!(attempt, "Gate passed after CAPTCHA");
                State::Done {
                    href,
                    passage: Passage::Solved,
                }
            }
            None if attempt < MAX_CAPTCHA_ATTEMPTS => State::FetchChallenge {
                attempt: attempt + 1,
            },
            None => State::Failed(GateFailure::RetriesExhausted),
        }
    }
}
