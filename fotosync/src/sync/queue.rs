use std::collections::{HashSet, VecDeque};

use super::names::FileName;

/// Ordered, duplicate-free list of files still waiting for a confirmed upload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingQueue {
    inner: VecDeque<FileName>,
}

impl PendingQueue {
    /// Builds a queue keeping the first occurrence of every name.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = FileName>,
    {
        let mut seen = HashSet::new();
        let mut inner = VecDeque::new();
        let mut duplicates = 0usize;
        for name in names {
            if seen.insert(name.clone()) {
                inner.push_back(name);
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            tracing::warn!(duplicates, "dropped duplicate names from pending queue");
        }
        Self { inner }
    }

    /// The next `size` names from the front (all of them when fewer remain).
    pub fn next_batch(&self, size: usize) -> Vec<FileName> {
        self.inner.iter().take(size.max(1)).cloned().collect()
    }

    /// Removes the given names wherever they sit in the queue; returns how many went.
    pub fn remove_all(&mut self, done: &HashSet<FileName>) -> usize {
        let before = self.inner.len();
        self.inner.retain(|name| !done.contains(name));
        before - self.inner.len()
    }

    pub fn to_vec(&self) -> Vec<FileName> {
        self.inner.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
