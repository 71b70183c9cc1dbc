use std::path::{Path, PathBuf};

use crate::journal::{self, SyncPolicy};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "store.snapshot";

/// Settings for a durable store.
///
/// ```
/// use memodocs::{StoreOptions, SyncPolicy};
///
/// let options = StoreOptions::new("/var/lib/app/docs").sync_policy(SyncPolicy::EveryNWrites(64));
/// assert!(options.snapshot_path().ends_with("store.snapshot"));
/// ```
#[derive(Debug, Clone)]
pub struct StoreOptions {
    dir: PathBuf,
    sync_policy: SyncPolicy,
}

impl StoreOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StoreOptions {
            dir: dir.into(),
            sync_policy: SyncPolicy::default(),
        }
    }

    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn policy(&self) -> SyncPolicy {
        self.sync_policy
    }

    /// The store's home snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn journal_path(&self) -> PathBuf {
        journal::journal_path(&self.snapshot_path())
    }
}
