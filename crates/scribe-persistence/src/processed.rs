//! Set of mention ids that have already been acted upon.
//!
//! Inserting an id is the commit point for a mention: once `insert`
//! returns true the mention is never handled again by this process. The
//! set is saved to disk so a restart does not answer the same mentions a
//! second time.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use scribe_models::MentionId;

use crate::atomic::{read_json, write_json};
use crate::error::Result;

/// Number of most recent ids kept.
pub const DEFAULT_PROCESSED_CAPACITY: usize = 5000;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProcessedFile {
    /// Oldest first.
    ids: Vec<MentionId>,
}

/// Bounded, optionally file-backed set of processed mention ids.
///
/// When more than `capacity` ids have been inserted the oldest ones are
/// forgotten. Those mentions lie behind the search cursor and are not
/// returned by the platform again.
#[derive(Debug)]
pub struct ProcessedSet {
    path: Option<PathBuf>,
    capacity: usize,
    ids: HashSet<MentionId>,
    order: VecDeque<MentionId>,
}

impl ProcessedSet {
    /// Creates an empty set that is never saved.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            capacity: DEFAULT_PROCESSED_CAPACITY,
            ids: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Loads the set from `path`.
    ///
    /// A missing file yields an empty set. A corrupt file is logged and
    /// replaced on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut set = Self::in_memory();

        match read_json::<ProcessedFile>(&path) {
            Ok(Some(file)) => {
                for id in file.ids {
                    set.insert(id);
                }
                debug!(path = %path.display(), count = set.len(), "Loaded processed mentions");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable processed-mentions file");
            }
        }

        set.path = Some(path);
        set
    }

    /// Sets the number of ids retained.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.evict();
        self
    }

    /// File the set is saved to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true if the id has been processed.
    pub fn contains(&self, id: &MentionId) -> bool {
        self.ids.contains(id)
    }

    /// Marks an id as processed.
    ///
    /// Returns false if it was already present.
    pub fn insert(&mut self, id: MentionId) -> bool {
        if !self.ids.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        self.evict();
        true
    }

    /// Number of ids held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no id has been processed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Writes the set to its file. In-memory sets are a no-op.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = ProcessedFile {
            ids: self.order.iter().cloned().collect(),
        };
        write_json(path, &file)
    }

    fn evict(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
    }
}
