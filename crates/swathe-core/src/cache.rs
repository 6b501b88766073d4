//! Per-query item cache holding the fetched prefix of each result set.
//!
//! # Design
//! - Every entry is a gap-free prefix of the server-ordered result set.
//! - Optimistic strips return a receipt so a failed mutation can be undone exactly.
//! - Entries are evicted least-recently-used once `max_queries` is exceeded.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use swathe_api_models::ItemKey;
use tracing::debug;

use crate::error::CacheError;
use crate::query::{Item, Page, Query};

/// Whether an entry reflects the latest response for its query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from an earlier visit while a background refresh is outstanding.
    Cached,
    /// Merged from a response issued for the current visit.
    Fresh,
}

/// Fetched prefix for one query.
#[derive(Debug, Clone)]
pub struct CachedList {
    items: Vec<Item>,
    total_count: u64,
    freshness: Freshness,
    last_used: u64,
    generation: u64,
}

impl CachedList {
    /// Records in server order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no records are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total records the server reported for the query.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Whether the server holds records beyond the cached prefix.
    #[must_use]
    pub fn has_more(&self) -> bool {
        count_u64(self.items.len()) < self.total_count
    }

    /// Freshness of the entry.
    #[must_use]
    pub const fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Position of the first record carrying `key`.
    #[must_use]
    pub fn position(&self, key: &ItemKey) -> Option<usize> {
        self.items.iter().position(|item| &item.hash == key)
    }
}

/// Result of appending a page to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records added by the page.
    pub appended: usize,
    /// Cached length after the merge.
    pub len: usize,
    /// Total reported by the page.
    pub total_count: u64,
}

/// Result of replacing an entry's prefix with a refreshed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceSummary {
    /// Keys cached before the refresh but absent from it.
    pub removed: Vec<ItemKey>,
    /// Cached length after the refresh.
    pub len: usize,
    /// Total reported by the refresh.
    pub total_count: u64,
    /// Whether the refresh covered the whole result set, making `removed` authoritative.
    pub complete: bool,
}

#[derive(Debug)]
struct StrippedEntry {
    query: Query,
    removed: Vec<(usize, Item)>,
    total_delta: u64,
    generation: u64,
}

/// Record of an optimistic strip, consumed by [`ItemCache::restore`].
#[derive(Debug, Default)]
#[must_use]
pub struct StripReceipt {
    entries: Vec<StrippedEntry>,
}

impl StripReceipt {
    /// Whether nothing was stripped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accept the strip as final; the removed records are released.
    pub fn commit(self) {
        debug!(entries = self.entries.len(), "strip committed");
    }

    /// Records removed from `query`'s entry.
    #[must_use]
    pub fn removed_from(&self, query: &Query) -> usize {
        self.entries
            .iter()
            .filter(|entry| &entry.query == query)
            .map(|entry| entry.removed.len())
            .sum()
    }
}

/// Query-keyed cache of fetched prefixes.
#[derive(Debug)]
pub struct ItemCache {
    entries: HashMap<Query, CachedList>,
    max_queries: usize,
    clock: u64,
}

impl ItemCache {
    /// Cache retaining at most `max_queries` query variants.
    #[must_use]
    pub fn new(max_queries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_queries: max_queries.max(1),
            clock: 0,
        }
    }

    /// Entry for `query`, if cached.
    #[must_use]
    pub fn get(&self, query: &Query) -> Option<&CachedList> {
        self.entries.get(query)
    }

    /// Number of cached query variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark `query` as most recently used.
    pub fn touch(&mut self, query: &Query) {
        let stamp = self.tick();
        if let Some(entry) = self.entries.get_mut(query) {
            entry.last_used = stamp;
        }
    }

    /// Flag an entry as served from cache; returns whether the entry exists.
    pub fn mark_cached(&mut self, query: &Query) -> bool {
        self.entries.get_mut(query).is_some_and(|entry| {
            entry.freshness = Freshness::Cached;
            true
        })
    }

    /// Drop an entry; returns whether one existed.
    pub fn invalidate(&mut self, query: &Query) -> bool {
        self.entries.remove(query).is_some()
    }

    /// Append `page` to the entry for `query`, truncating any overlapped tail.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Gap`] when the page starts beyond the cached prefix.
    pub fn merge_page(&mut self, query: &Query, page: Page) -> Result<MergeSummary, CacheError> {
        let cached = self.entries.get(query).map_or(0, CachedList::len);
        if page.offset > cached {
            return Err(CacheError::Gap {
                cached,
                offset: page.offset,
            });
        }

        let stamp = self.tick();
        let entry = self
            .entries
            .entry(query.clone())
            .or_insert_with(|| CachedList {
                items: Vec::new(),
                total_count: 0,
                freshness: Freshness::Fresh,
                last_used: stamp,
                generation: stamp,
            });
        if page.offset < entry.items.len() {
            debug!(
                offset = page.offset,
                dropped = entry.items.len() - page.offset,
                "page overlaps cached tail"
            );
            entry.items.truncate(page.offset);
        }
        let appended = page.items.len();
        entry.items.extend(page.items.into_iter().map(Rc::new));
        entry.total_count = page.total_count;
        entry.freshness = Freshness::Fresh;
        entry.last_used = stamp;
        entry.generation = stamp;
        let summary = MergeSummary {
            appended,
            len: entry.items.len(),
            total_count: entry.total_count,
        };
        self.evict_over_capacity(query);
        Ok(summary)
    }

    /// Replace the entry for `query` with a refreshed first page.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ReplaceOffset`] unless the page starts at offset 0.
    pub fn replace(&mut self, query: &Query, page: Page) -> Result<ReplaceSummary, CacheError> {
        if page.offset != 0 {
            return Err(CacheError::ReplaceOffset {
                offset: page.offset,
            });
        }
        let incoming: HashSet<&ItemKey> = page.items.iter().map(|item| &item.hash).collect();
        let removed = self
            .entries
            .get(query)
            .map(|entry| {
                entry
                    .items
                    .iter()
                    .filter(|item| !incoming.contains(&item.hash))
                    .map(|item| item.hash.clone())
                    .collect()
            })
            .unwrap_or_default();

        let stamp = self.tick();
        let list = CachedList {
            items: page.items.into_iter().map(Rc::new).collect(),
            total_count: page.total_count,
            freshness: Freshness::Fresh,
            last_used: stamp,
            generation: stamp,
        };
        let summary = ReplaceSummary {
            removed,
            len: list.len(),
            total_count: list.total_count,
            complete: !list.has_more(),
        };
        self.entries.insert(query.clone(), list);
        self.evict_over_capacity(query);
        Ok(summary)
    }

    /// Remove every record whose key is in `keys` from every cached query.
    pub fn strip(&mut self, keys: &HashSet<ItemKey>) -> StripReceipt {
        let mut receipt = StripReceipt::default();
        if keys.is_empty() {
            return receipt;
        }
        for (query, entry) in &mut self.entries {
            let mut removed = Vec::new();
            let mut index = 0;
            entry.items.retain(|item| {
                let keep = !keys.contains(&item.hash);
                if !keep {
                    removed.push((index, Rc::clone(item)));
                }
                index += 1;
                keep
            });
            if removed.is_empty() {
                continue;
            }
            let delta = count_u64(removed.len()).min(entry.total_count);
            entry.total_count -= delta;
            receipt.entries.push(StrippedEntry {
                query: query.clone(),
                removed,
                total_delta: delta,
                generation: entry.generation,
            });
        }
        debug!(entries = receipt.entries.len(), "stripped keys from cache");
        receipt
    }

    /// Lower `query`'s total for removals outside the cached prefix, recording it in `receipt`.
    pub fn reduce_total(&mut self, query: &Query, by: u64, receipt: &mut StripReceipt) {
        let Some(entry) = self.entries.get_mut(query) else {
            return;
        };
        let floor = count_u64(entry.items.len());
        let delta = by.min(entry.total_count.saturating_sub(floor));
        if delta == 0 {
            return;
        }
        entry.total_count -= delta;
        receipt.entries.push(StrippedEntry {
            query: query.clone(),
            removed: Vec::new(),
            total_delta: delta,
            generation: entry.generation,
        });
    }

    /// Undo a strip. Records already present again (e.g. via a refresh) are not duplicated.
    ///
    /// An entry that received a server response since the strip keeps the server's total; the
    /// stripped rows are only put back.
    pub fn restore(&mut self, receipt: StripReceipt) {
        for stripped in receipt.entries.into_iter().rev() {
            let Some(entry) = self.entries.get_mut(&stripped.query) else {
                continue;
            };
            let present: HashSet<ItemKey> =
                entry.items.iter().map(|item| item.hash.clone()).collect();
            for (index, item) in stripped.removed {
                if present.contains(&item.hash) {
                    continue;
                }
                let at = index.min(entry.items.len());
                entry.items.insert(at, item);
            }
            if entry.generation == stripped.generation {
                entry.total_count = entry.total_count.saturating_add(stripped.total_delta);
            } else {
                debug!(
                    search = %stripped.query.search,
                    "entry refreshed since strip; keeping server total"
                );
                entry.total_count = entry.total_count.max(count_u64(entry.items.len()));
            }
        }
    }

    const fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_over_capacity(&mut self, keep: &Query) {
        while self.entries.len() > self.max_queries {
            let victim = self
                .entries
                .iter()
                .filter(|(query, _)| *query != keep)
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(query, _)| query.clone());
            let Some(victim) = victim else {
                break;
            };
            debug!(search = %victim.search, "evicting least recently used query");
            self.entries.remove(&victim);
        }
    }
}

pub(crate) fn count_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
