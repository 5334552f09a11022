//! Resolver configuration loaded from `~/.config/esolve/config.toml`.
//!
//! The file is optional; every field has a default. The config is built
//! once by the caller and handed to every component by reference.
//!
//! ```toml
//! site_base = "https://eurostreaming.garden"
//! preferred_host = "deltabit"
//! deltabit_delay_ms = 2500
//! overall_timeout_secs = 90
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hosts::HostKind;

/// How many times the CAPTCHA gate fetches and submits a challenge.
pub const MAX_CAPTCHA_ATTEMPTS: u32 = 2;

/// How many times the DeltaBit form protocol is run before giving up.
pub const MAX_DELTABIT_ATTEMPTS: u32 = 2;

/// Resolver settings shared by every pipeline component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Base URL of the index site (no trailing slash).
    pub site_base: String,
    /// Prefix prepended to every outgoing URL (forwarding proxy), empty to disable.
    pub forward_proxy: String,
    /// Upstream proxy for all requests (`http://`, `https://` or `socks5://`).
    pub proxy: Option<String>,
    /// Host tried first when an episode row offers both.
    pub preferred_host: HostKind,
    /// Return host URLs without host-specific solving where supported.
    pub passthrough: bool,
    /// Pause before the DeltaBit form POST, in milliseconds.
    pub deltabit_delay_ms: u64,
    /// Referer sent on the DeltaBit landing request.
    pub deltabit_referer: String,
    /// Directory for persisted CAPTCHA sessions.
    pub session_dir: Option<PathBuf>,
    /// Explicit tesseract binary, otherwise looked up in `PATH`.
    pub tesseract_path: Option<PathBuf>,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Wall-clock budget for one resolution, reported as `timeout` when exceeded.
    pub overall_timeout_secs: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            site_base: "https://eurostreaming.garden".to_string(),
            forward_proxy: String::new(),
            proxy: None,
            preferred_host: HostKind::DeltaBit,
            passthrough: false,
            deltabit_delay_ms: 2500,
            deltabit_referer: "https://safego.cc/".to_string(),
            session_dir: None,
            tesseract_path: None,
            request_timeout_secs: 30,
            overall_timeout_secs: None,
        }
    }
}

impl ResolverConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields [`ResolverConfig::default`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.site_base)
            .map_err(|e| Error::Config(format!("site_base {:?}: {e}", self.site_base)))?;
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// Prefix a target URL with the forwarding proxy.
    #[must_use]
    pub fn proxied(&self, url: &str) -> String {
        format!("{}{url}", self.forward_proxy)
    }

    /// Inverse of [`Self::proxied`] for URLs reported back by the transport.
    #[must_use]
    pub fn unproxied(&self, url: &str) -> String {
        if self.forward_proxy.is_empty() {
            return url.to_string();
        }
        url.strip_prefix(self.forward_proxy.as_str())
            .unwrap_or(url)
            .to_string()
    }

    #[must_use]
    pub fn deltabit_delay(&self) -> Duration {
        Duration::from_millis(self.deltabit_delay_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }

    /// Session directory, defaulting to `~/.cache/esolve/sessions`.
    #[must_use]
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("esolve")
                .join("sessions")
        })
    }
}

/// Return the path to the default config file.
fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("esolve")
        .join("config.toml")
}
