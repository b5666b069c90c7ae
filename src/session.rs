//! Connection-intent persistence
//!
//! Remembers whether the user deliberately connected a wallet, so a restart
//! can silently re-request accounts instead of popping a wallet prompt the
//! user never asked for. Stored as a small JSON file next to the app config.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logger::{self, LogTag};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionFlags {
    /// User explicitly connected and has not disconnected since
    #[serde(default)]
    pub wallet_connected: bool,
    #[serde(default)]
    pub last_account: Option<String>,
    #[serde(default)]
    pub last_chain_id: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            wallet_connected: false,
            last_account: None,
            last_chain_id: None,
            updated_at: Utc::now(),
        }
    }
}

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load persisted flags; a missing or corrupt file yields defaults
    pub fn load(&self) -> SessionFlags {
        match self.try_load() {
            Ok(Some(flags)) => flags,
            Ok(None) => SessionFlags::default(),
            Err(e) => {
                logger::warning(
                    LogTag::Session,
                    &format!("Session file unreadable, starting fresh: {:#}", e),
                );
                SessionFlags::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<SessionFlags>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let flags = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(flags))
    }

    pub fn save(&self, flags: &SessionFlags) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(flags)?;
        fs::write(&self.path, raw).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Record a successful connection
    pub fn mark_connected(&self, account: &str, chain_id: u64) -> Result<()> {
        self.save(&SessionFlags {
            wallet_connected: true,
            last_account: Some(account.to_string()),
            last_chain_id: Some(chain_id),
            updated_at: Utc::now(),
        })
    }

    /// Record an explicit disconnect; auto-reconnect stops until the next
    /// deliberate connect
    pub fn mark_disconnected(&self) -> Result<()> {
        let mut flags = self.load();
        flags.wallet_connected = false;
        flags.updated_at = Utc::now();
        self.save(&flags)
    }

    /// Whether startup should silently re-request accounts
    pub fn should_reconnect(&self) -> bool {
        self.load().wallet_connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("session.json"))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.should_reconnect());
        assert_eq!(store.load().last_account, None);
    }

    #[test]
    fn connect_then_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.mark_connected("0xab01", 31337).unwrap();

        let reloaded = store_in(&dir).load();
        assert!(reloaded.wallet_connected);
        assert_eq!(reloaded.last_account.as_deref(), Some("0xab01"));
        assert_eq!(reloaded.last_chain_id, Some(31337));
    }

    #[test]
    fn disconnect_clears_intent_but_keeps_history() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.mark_connected("0xab01", 31337).unwrap();
        store.mark_disconnected().unwrap();

        let flags = store.load();
        assert!(!flags.wallet_connected);
        assert_eq!(flags.last_account.as_deref(), Some("0xab01"));
        assert!(!store.should_reconnect());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::new(&path);
        let flags = store.load();
        assert!(!flags.wallet_connected);
        assert_eq!(flags.last_account, None);
        assert_eq!(flags.last_chain_id, None);
    }
}
