use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::api::Exchange;

/// Newest announcement ids retained per exchange. The board is polled one
/// page of 20 at a time, so older ids never come back.
pub const MAX_KNOWN_ANNOUNCEMENTS: usize = 500;

/// Everything already reported or already observed as existing.
///
/// Serialized with the historical key names so existing state files keep
/// working: `upbit`, `upbit_markets`, `bithumb_markets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownState {
    #[serde(rename = "upbit", default)]
    upbit_notices: Vec<String>,
    #[serde(default)]
    upbit_markets: BTreeSet<String>,
    #[serde(default)]
    bithumb_markets: BTreeSet<String>,
}

impl KnownState {
    /// Seen announcement ids, oldest first. `None` for exchanges without a feed.
    pub fn announcement_ids(&self, exchange: Exchange) -> Option<&[String]> {
        match exchange {
            Exchange::Upbit => Some(&self.upbit_notices),
            Exchange::Bithumb => None,
        }
    }

    pub fn knows_announcement(&self, exchange: Exchange, id: &str) -> bool {
        self.announcement_ids(exchange)
            .map(|ids| ids.iter().any(|known| known == id))
            .unwrap_or(false)
    }

    /// Appends `id` unless already present. Returns whether it was added.
    pub fn record_announcement(&mut self, exchange: Exchange, id: &str) -> bool {
        let ids = match exchange {
            Exchange::Upbit => &mut self.upbit_notices,
            Exchange::Bithumb => return false,
        };
        if ids.iter().any(|known| known == id) {
            return false;
        }
        ids.push(id.to_string());
        trim_oldest(ids);
        true
    }

    /// True for an exchange with an announcement feed but no ids recorded yet.
    pub fn announcement_baseline_pending(&self, exchange: Exchange) -> bool {
        self.announcement_ids(exchange)
            .map(|ids| ids.is_empty())
            .unwrap_or(false)
    }

    /// Replaces the announcement baseline, dropping duplicates.
    pub fn reset_announcements<I>(&mut self, exchange: Exchange, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Exchange::Upbit = exchange {
            self.upbit_notices = dedup_preserving_order(ids);
            trim_oldest(&mut self.upbit_notices);
        }
    }

    pub fn markets(&self, exchange: Exchange) -> &BTreeSet<String> {
        match exchange {
            Exchange::Upbit => &self.upbit_markets,
            Exchange::Bithumb => &self.bithumb_markets,
        }
    }

    /// Wholesale replacement with the latest snapshot. Empty snapshots are
    /// ignored: an empty fetch means the fetch failed, not a mass delisting.
    pub fn replace_markets(&mut self, exchange: Exchange, snapshot: BTreeSet<String>) -> bool {
        if snapshot.is_empty() {
            return false;
        }
        match exchange {
            Exchange::Upbit => self.upbit_markets = snapshot,
            Exchange::Bithumb => self.bithumb_markets = snapshot,
        }
        true
    }

    /// True when no exchange has a market baseline yet.
    pub fn needs_bootstrap(&self) -> bool {
        Exchange::ALL
            .iter()
            .all(|exchange| self.markets(*exchange).is_empty())
    }

    fn normalize(mut self) -> Self {
        self.upbit_notices = dedup_preserving_order(std::mem::take(&mut self.upbit_notices));
        trim_oldest(&mut self.upbit_notices);
        self
    }
}

fn trim_oldest(ids: &mut Vec<String>) {
    let excess = ids.len().saturating_sub(MAX_KNOWN_ANNOUNCEMENTS);
    if excess > 0 {
        ids.drain(..excess);
    }
}

fn dedup_preserving_order<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// JSON file holding [`KnownState`] between runs.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing or unreadable file yields an empty state.
    pub fn load(&self) -> KnownState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No state file at {}, starting fresh", self.path.display());
                return KnownState::default();
            }
            Err(e) => {
                tracing::warn!("Cannot read state file {}: {}", self.path.display(), e);
                return KnownState::default();
            }
        };

        match serde_json::from_str::<KnownState>(&raw) {
            Ok(state) => state.normalize(),
            Err(e) => {
                tracing::warn!(
                    "State file {} is corrupt ({}), starting fresh",
                    self.path.display(),
                    e
                );
                KnownState::default()
            }
        }
    }

    /// Writes to a sibling temp file, syncs, then renames over the target.
    pub fn save(&self, state: &KnownState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let write_temp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };

        write_temp().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            anyhow::Error::new(e).context(format!("Failed to write {}", self.path.display()))
        })
    }
}
