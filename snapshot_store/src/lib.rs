pub mod persist;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which token of an asset a snapshot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    /// The yield-bearing aToken held by depositors.
    Primary,
    /// The virtual token used for reward-accrual accounting.
    Reward,
}

impl TokenRole {
    /// File-label prefix, kept compatible with existing snapshot files.
    pub fn label_prefix(self) -> &'static str {
        match self {
            TokenRole::Primary => "a",
            TokenRole::Reward => "virtual",
        }
    }

    /// Snapshot label for one token of one asset, e.g. `aUSDC`.
    pub fn label(self, symbol: &str) -> String {
        format!("{}{}", self.label_prefix(), symbol)
    }
}

/// A tracked holder balance.
///
/// Snapshots written without USD valuation store the raw balance string
/// directly; valued snapshots store the raw balance plus its USD worth.
/// Readers must accept both shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolderRecord {
    Valued { raw: String, usd: f64 },
    Raw(String),
}

impl HolderRecord {
    pub fn raw(&self) -> &str {
        match self {
            HolderRecord::Valued { raw, .. } => raw,
            HolderRecord::Raw(raw) => raw,
        }
    }

    /// USD value of the holding; legacy raw-only records count as zero.
    pub fn usd(&self) -> f64 {
        match self {
            HolderRecord::Valued { usd, .. } => *usd,
            HolderRecord::Raw(_) => 0.0,
        }
    }
}

/// Persisted holder cache for one token of one asset.
///
/// `last_checked_block` is the resumption cursor: it never decreases and is
/// never below the asset's origin block. Holders are kept in a sorted map so
/// repeated saves of unchanged data are byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_checked_block: u64,
    pub holders: BTreeMap<String, HolderRecord>,
}

impl Snapshot {
    /// Fresh snapshot for an asset that has never been scanned.
    pub fn seeded_at(origin_block: u64) -> Self {
        Self {
            last_checked_block: origin_block,
            holders: BTreeMap::new(),
        }
    }
}

/// Key-value persistence for snapshots, keyed by label (e.g. `aUSDC`).
///
/// File-backed today; the trait keeps the builder and evaluator independent
/// of the storage engine.
pub trait SnapshotStore: Send + Sync {
    /// Loads the snapshot for `label`, or `None` if it was never written.
    /// A present but unreadable snapshot is an error.
    fn load(&self, label: &str) -> Result<Option<Snapshot>>;

    /// Persists the snapshot under `label`, canonical file plus timestamped
    /// backup. Returns the backup path.
    fn save(&self, label: &str, snapshot: &Snapshot) -> Result<PathBuf>;

    /// Lists canonical snapshot labels starting with `prefix`, backups
    /// excluded.
    fn list_labels(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Snapshot store over pretty-printed JSON files in a single directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self, label: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(label);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed snapshot file {}", path.display()))?;

        Ok(Some(snapshot))
    }

    fn save(&self, label: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let contents = serde_json::to_string_pretty(snapshot)?;
        persist::write_with_backup(&self.path_for(label), &contents)
    }

    fn list_labels(&self, prefix: &str) -> Result<Vec<String>> {
        let mut labels = Vec::new();

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list snapshot directory {}", self.dir.display()))?
        {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            // Timestamped backups carry an extra `.{unix}` segment in the stem.
            if !stem.starts_with(prefix) || stem.contains('.') {
                continue;
            }
            labels.push(stem.to_string());
        }

        labels.sort();
        Ok(labels)
    }
}
