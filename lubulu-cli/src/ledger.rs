//! JSON ledger file holding every local user's settings, pity counter and history.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lubulu_core::{MemoryHistory, MemoryProfile};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLedger {
    #[serde(flatten)]
    pub profile: MemoryProfile,
    #[serde(default)]
    pub history: MemoryHistory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub users: BTreeMap<String, UserLedger>,
}

impl LedgerFile {
    /// Read the ledger, or start an empty one when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no ledger at {}; starting fresh", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write through a sibling temp file so a crash never leaves half a ledger.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to encode ledger")?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp = sibling(path, &format!("{}.{nanos}.tmp", std::process::id()));
        fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        log::debug!("saved ledger to {}", path.display());
        Ok(())
    }

    pub fn user_mut(&mut self, user_id: &str) -> &mut UserLedger {
        self.users.entry(user_id.to_string()).or_default()
    }
}

/// Exclusive lock on a ledger, held from load through save.
///
/// The lock lives on a `<ledger>.lock` sibling because `save` replaces the
/// ledger file itself. Released when dropped.
#[derive(Debug)]
pub struct LedgerLock {
    _file: File,
}

impl LedgerLock {
    /// Block until no other process holds the lock for `path`.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_path = sibling(path, "lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open {}", lock_path.display()))?;
        file.lock()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        log::debug!("locked {}", lock_path.display());
        Ok(Self { _file: file })
    }
}

/// `path` with `.suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
