//! Deadline queue for debounced searches and delayed refetches.
//!
//! Nothing here sleeps; the owner calls [`Scheduler::due`] with the current instant.

use std::time::Instant;

use crate::query::Query;

/// Deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Apply the debounced search text.
    ApplySearch(String),
    /// Re-fetch a query after a mutation.
    Refetch(Query),
}

impl Task {
    fn slot(&self) -> Slot<'_> {
        match self {
            Self::ApplySearch(_) => Slot::Search,
            Self::Refetch(query) => Slot::Refetch(query),
        }
    }
}

#[derive(PartialEq, Eq)]
enum Slot<'a> {
    Search,
    Refetch(&'a Query),
}

#[derive(Debug, Clone)]
struct Entry {
    due: Instant,
    task: Task,
}

/// Pending tasks keyed by slot; at most one search and one refetch per query.
#[derive(Debug, Default)]
pub struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any pending search with `text`, due at `due`.
    pub fn debounce_search(&mut self, text: String, due: Instant) {
        self.entries
            .retain(|entry| entry.task.slot() != Slot::Search);
        self.entries.push(Entry {
            due,
            task: Task::ApplySearch(text),
        });
    }

    /// Drop any pending search.
    pub fn cancel_search(&mut self) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.task.slot() != Slot::Search);
        before != self.entries.len()
    }

    /// Schedule a refetch of `query`; an earlier pending refetch is pushed back to `due`.
    pub fn schedule_refetch(&mut self, query: Query, due: Instant) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.task.slot() == Slot::Refetch(&query))
        {
            entry.due = entry.due.max(due);
            return;
        }
        self.entries.push(Entry {
            due,
            task: Task::Refetch(query),
        });
    }

    /// Remove and return every task due at `now`, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<Task> {
        let mut ready = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].due <= now {
                ready.push(self.entries.swap_remove(index));
            } else {
                index += 1;
            }
        }
        ready.sort_by_key(|entry| entry.due);
        ready.into_iter().map(|entry| entry.task).collect()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.due).min()
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
