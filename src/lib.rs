//! `esolve` - Episode stream resolver
//!
//! # Features
//!
//! - **Title matching**: token overlap + Ratcliff/Obershelp similarity with an auditable trace
//! - **Episode location**: season/episode rows in loosely structured post bodies
//! - **CAPTCHA gates**: cached sessions, OCR via tesseract, bounded retries
//! - **Hosts**: DeltaBit form protocol, MixDrop passthrough
//!
//! # Example
//!
//! ```rust,no_run
//! use esolve::{Pipeline, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(ResolverConfig::load(None)?)?;
//!     let resolution = pipeline.resolve("tt6156584:4:5").await;
//!     println!("{:?}", resolution.diagnostics.reason);
//!     Ok(())
//! }
//! ```

pub mod captcha;
pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod form;
pub mod hosts;
pub mod html;
pub mod http_client;
pub mod locator;
pub mod matcher;
pub mod metadata;
pub mod ocr;
pub mod pipeline;
pub mod resolver;
pub mod search;
pub mod session;
pub mod trace;

pub use captcha::{CaptchaGate, GateFailure, GateOutcome, Passage};
pub use config::{ResolverConfig, MAX_CAPTCHA_ATTEMPTS, MAX_DELTABIT_ATTEMPTS};
pub use context::Context;
pub use error::{Error, FailureReason, Result};
pub use fingerprint::{Browser, BrowserProfile};
pub use hosts::{HostError, HostExtractor, HostKind, HostMedia};
pub use http_client::{AcceleratedClient, HttpRequest, HttpResponse, HttpTransport};
pub use matcher::{score, MatchScore, TitleQuery};
pub use metadata::{ImdbMetadata, MetadataProvider, TitleInfo};
pub use ocr::{DigitRecognizer, OcrError, TesseractOcr};
pub use pipeline::{Diagnostics, EpisodeRef, Language, Pipeline, Resolution, ResolvedStream};
pub use resolver::{HostAttempt, HostFailure, HostLinkResolver, LinkOutcome, ResolvedLink};
pub use search::{SearchOrchestrator, SearchOutcome};
pub use session::{CaptchaSession, FileSessionStore, MemorySessionStore, SessionStore};
pub use trace::DiagnosticTrace;

/// Version of esolve
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
