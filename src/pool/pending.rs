//! Pending-task table: routes out-of-order responses back to their callers

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::PoolError;

/// Opaque, pool-unique task correlation id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Fresh id; uuid v4 keeps ids unique for the lifetime of the pool
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one successful compression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressOutcome {
    pub original_size: usize,
    pub compressed_size: usize,
    pub data: Vec<u8>,
    /// Index of the slot that ran the task
    pub slot: usize,
}

pub type Settlement = Result<CompressOutcome, PoolError>;

/// Resolve/reject pair for one task
#[derive(Debug)]
pub struct Completion {
    filename: String,
    sender: oneshot::Sender<Settlement>,
}

impl Completion {
    pub fn new(filename: String, sender: oneshot::Sender<Settlement>) -> Self {
        Self { filename, sender }
    }

    /// Settle the task. Consuming `self` makes a second settlement impossible.
    pub fn settle(self, settlement: Settlement) {
        if self.sender.send(settlement).is_err() {
            tracing::trace!("Caller dropped the handle for {}", self.filename);
        }
    }
}

/// Completion handles keyed by task id, inserted at submission and removed at settlement
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<TaskId, Completion>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TaskId, completion: Completion) {
        let previous = self.entries.insert(id, completion);
        debug_assert!(previous.is_none(), "task id reused");
    }

    /// Remove and settle the entry for `id`. Returns false for unknown ids.
    pub fn settle(&mut self, id: &str, settlement: Settlement) -> bool {
        match self.entries.remove(id) {
            Some(completion) => {
                completion.settle(settlement);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Settle every remaining entry with a clone of `error`
    pub fn reject_all(&mut self, error: &PoolError) {
        for (_, completion) in self.entries.drain() {
            completion.settle(Err(error.clone()));
        }
    }
}
