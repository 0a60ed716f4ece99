use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Watch directory does not exist: {path}")]
    MissingRoot { path: String },

    #[error("Cannot list watch directory {path}: {source}")]
    RootUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory {name} is not claimed for processing")]
    NotClaimed { name: String },
}

/// Lifecycle of one submission directory within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryState {
    Unknown,
    Discovered,
    Processing,
    Processed,
}

/// Tracks which submission directories have been fully processed and picks
/// the next one to hand to the pipeline.
///
/// Directories found at startup form a backlog that is drained first. After
/// that every call re-lists the watch root and claims one directory that is
/// neither processed nor in flight.
#[derive(Debug)]
pub struct DirectoryLedger {
    root: PathBuf,
    processed: HashSet<String>,
    backlog: VecDeque<String>,
    processing: Option<String>,
    attempts: HashMap<String, u32>,
    ignored: HashSet<OsString>,
}

impl DirectoryLedger {
    /// Opens a ledger over `root`, enumerating the initial backlog.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(LedgerError::MissingRoot {
                path: root.to_string_lossy().to_string(),
            });
        }

        let mut ledger = Self {
            root,
            processed: HashSet::new(),
            backlog: VecDeque::new(),
            processing: None,
            attempts: HashMap::new(),
            ignored: HashSet::new(),
        };
        ledger.backlog = ledger.list()?.into_iter().collect();
        log::info!(
            "Found {} existing directories in {}",
            ledger.backlog.len(),
            ledger.root.display()
        );

        Ok(ledger)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory path for a ledger entry name.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// True while startup directories are still waiting.
    pub fn in_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// Claims the next directory to process, or `None` when nothing is pending.
    ///
    /// At most one directory is claimed at a time; the claim must be settled
    /// with [`mark_processed`](Self::mark_processed) or
    /// [`release`](Self::release) before another is handed out.
    pub fn next_directory(&mut self) -> Result<Option<String>, LedgerError> {
        if let Some(current) = &self.processing {
            return Ok(Some(current.clone()));
        }

        while let Some(name) = self.backlog.pop_front() {
            if !self.processed.contains(&name) {
                return Ok(Some(self.claim(name)));
            }
        }

        let pending = self.pending()?;
        // Fewest failed attempts first so one broken directory cannot starve
        // the rest; name order breaks ties.
        let next = pending
            .into_iter()
            .min_by(|a, b| {
                let attempts_a = self.attempts.get(a).copied().unwrap_or(0);
                let attempts_b = self.attempts.get(b).copied().unwrap_or(0);
                attempts_a.cmp(&attempts_b).then_with(|| a.cmp(b))
            });

        Ok(next.map(|name| self.claim(name)))
    }

    /// Directories currently on disk that are not yet processed.
    pub fn pending(&mut self) -> Result<BTreeSet<String>, LedgerError> {
        let listed = self.list()?;
        Ok(listed
            .into_iter()
            .filter(|name| !self.processed.contains(name))
            .collect())
    }

    /// Records that the claimed directory's records were persisted.
    pub fn mark_processed(&mut self, name: &str) -> Result<(), LedgerError> {
        self.settle(name)?;
        self.attempts.remove(name);
        self.processed.insert(name.to_string());
        log::info!("Directory {} was processed.", name);
        Ok(())
    }

    /// Returns a claimed directory to the pending pool after a failed pass.
    pub fn release(&mut self, name: &str) -> Result<(), LedgerError> {
        self.settle(name)?;
        *self.attempts.entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    pub fn state_of(&self, name: &str) -> DirectoryState {
        if self.processed.contains(name) {
            DirectoryState::Processed
        } else if self.processing.as_deref() == Some(name) {
            DirectoryState::Processing
        } else if self.backlog.iter().any(|n| n == name) || self.root.join(name).is_dir() {
            DirectoryState::Discovered
        } else {
            DirectoryState::Unknown
        }
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn attempts(&self, name: &str) -> u32 {
        self.attempts.get(name).copied().unwrap_or(0)
    }

    /// Lists the watch root, warning once about each directory whose name is
    /// not valid UTF-8. Those can never be stored as an owner and are ignored.
    fn list(&mut self) -> Result<BTreeSet<String>, LedgerError> {
        let listing = list_subdirectories(&self.root)?;
        for name in listing.non_utf8 {
            if !self.ignored.contains(&name) {
                log::warn!(
                    "Ignoring directory with a non UTF-8 name: {}",
                    self.root.join(&name).display()
                );
                self.ignored.insert(name);
            }
        }
        Ok(listing.names)
    }

    fn claim(&mut self, name: String) -> String {
        log::debug!("Claimed directory {}", name);
        self.processing = Some(name.clone());
        name
    }

    fn settle(&mut self, name: &str) -> Result<(), LedgerError> {
        if self.processing.as_deref() != Some(name) {
            return Err(LedgerError::NotClaimed {
                name: name.to_string(),
            });
        }
        self.processing = None;
        Ok(())
    }
}

/// Immediate subdirectories of a watch root.
#[derive(Debug, Default)]
pub struct Subdirectories {
    /// UTF-8 names, sorted.
    pub names: BTreeSet<String>,
    pub non_utf8: Vec<OsString>,
}

pub fn list_subdirectories(root: &Path) -> Result<Subdirectories, LedgerError> {
    let unreadable = |source| LedgerError::RootUnreadable {
        path: root.to_string_lossy().to_string(),
        source,
    };

    let mut listing = Subdirectories::default();
    for entry in fs::read_dir(root).map_err(unreadable)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };
        if entry.path().is_dir() {
            match entry.file_name().into_string() {
                Ok(name) => {
                    listing.names.insert(name);
                }
                Err(name) => listing.non_utf8.push(name),
            }
        }
    }
    Ok(listing)
}
