//! CAPTCHA session persistence
//!
//! A solved gate hands out a session cookie that keeps working until the
//! host invalidates it. Sessions are soft state: losing one only costs a
//! re-solve. Writes replace the whole session for a scope and are never
//! partially applied; concurrent writers resolve last-writer-wins.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Cookies granting passage through one gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaSession {
    pub cookies: BTreeMap<String, String>,
}

impl CaptchaSession {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Key-value blob store for sessions, keyed by gate scope (host name).
pub trait SessionStore: Send + Sync {
    /// Read a scope's session; an unknown scope yields an empty session.
    fn read(&self, scope: &str) -> Result<CaptchaSession>;

    /// Replace a scope's session.
    fn write(&self, scope: &str, session: &CaptchaSession) -> Result<()>;
}

/// Gate scope for a URL: its host, or the raw string if it has none.
#[must_use]
pub fn scope_for(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// One JSON file per scope under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, scope: &str) -> PathBuf {
        let name: String = scope
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, scope: &str) -> Result<CaptchaSession> {
        let path = self.path_for(scope);
        if !path.exists() {
            return Ok(CaptchaSession::default());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(CaptchaSession::default());
        }

        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable session");
                Ok(CaptchaSession::default())
            }
        }
    }

    fn write(&self, scope: &str, session: &CaptchaSession) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(scope);
        let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

        let json = serde_json::to_string_pretty(session)?;
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(path = %path.display(), cookies = session.cookies.len(), "Session saved");
        Ok(())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, CaptchaSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, scope: &str) -> Result<CaptchaSession> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(sessions.get(scope).cloned().unwrap_or_default())
    }

    fn write(&self, scope: &str, session: &CaptchaSession) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.insert(scope.to_string(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(pairs: &[(&str, &str)]) -> CaptchaSession {
        CaptchaSession {
            cookies: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn scope_is_host() {
        assert_eq!(scope_for("https://safego.cc/safe.php?url=abc"), "safego.cc");
        assert_eq!(scope_for("not a url"), "not a url");
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let written = session(&[("PHPSESSID", "abc"), ("captcha", "ok=1")]);

        store.write("safego.cc", &written).unwrap();
        assert_eq!(store.read("safego.cc").unwrap(), written);
    }

    #[test]
    fn file_store_unknown_scope_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested"));
        assert!(store.read("safego.cc").unwrap().is_empty());
    }

    #[test]
    fn file_store_overwrites_whole_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.write("g", &session(&[("a", "1"), ("b", "2")])).unwrap();
        store.write("g", &session(&[("c", "3")])).unwrap();
        assert_eq!(store.read("g").unwrap(), session(&[("c", "3")]));
        // No temp files left behind
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        std::fs::write(dir.path().join("g.json"), "{'PHPSESSID': 'x'}").unwrap();
        assert!(store.read("g").unwrap().is_empty());
    }

    #[test]
    fn scopes_are_sanitised_into_file_names() {
        let store = FileSessionStore::new("/tmp/s");
        assert_eq!(store.path_for("a/b:c"), PathBuf::from("/tmp/s/a_b_c.json"));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let written = session(&[("captcha", "1")]);
        store.write("gate", &written).unwrap();
        assert_eq!(store.read("gate").unwrap(), written);
        assert!(store.read("other").unwrap().is_empty());
    }
}
