//! In-memory collection that serves list pages and applies bulk mutations.
//!
//! Behaves like the real endpoints: filters match fields exactly, search is a case-insensitive
//! substring match on `name`, and select-all descriptors are expanded here, never on the client.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use swathe_api_models::{
    ActionDescriptor, Addressing, BulkAction, FilterSet, ItemFailure, ItemKey, ItemRecord,
    MutationReport, SortDirection,
};
use swathe_core::{BackendError, ListBackend, MutationBackend, Page, Query};

#[derive(Debug, Default)]
struct Faults {
    failing_keys: HashMap<ItemKey, String>,
    conflict_next: bool,
    network_next_submit: bool,
    network_next_fetch: bool,
}

/// Fake server-side collection implementing both backends.
#[derive(Debug, Default)]
pub struct FakeCollection {
    items: RefCell<Vec<ItemRecord>>,
    faults: RefCell<Faults>,
    submissions: RefCell<Vec<ActionDescriptor>>,
    fetches: Cell<usize>,
}

impl FakeCollection {
    /// Collection holding `items` in insertion order.
    #[must_use]
    pub fn new(items: Vec<ItemRecord>) -> Self {
        Self {
            items: RefCell::new(items),
            ..Self::default()
        }
    }

    /// Number of records on the server.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the server holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Whether `key` still exists.
    #[must_use]
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.items.borrow().iter().any(|item| &item.hash == key)
    }

    /// Add a record out of band.
    pub fn insert(&self, record: ItemRecord) {
        self.items.borrow_mut().push(record);
    }

    /// Delete records out of band.
    pub fn remove(&self, keys: &[ItemKey]) {
        let doomed: HashSet<&ItemKey> = keys.iter().collect();
        self.items
            .borrow_mut()
            .retain(|item| !doomed.contains(&item.hash));
    }

    /// Field value of `key`, for assertions.
    #[must_use]
    pub fn field(&self, key: &ItemKey, name: &str) -> Option<Value> {
        self.items
            .borrow()
            .iter()
            .find(|item| &item.hash == key)
            .and_then(|item| item.fields.get(name).cloned())
    }

    /// Make mutations of `keys` fail with `message` until cleared.
    pub fn fail_keys(&self, keys: &[ItemKey], message: &str) {
        let mut faults = self.faults.borrow_mut();
        for key in keys {
            faults
                .failing_keys
                .insert(key.clone(), message.to_string());
        }
    }

    /// Reject the next select-all mutation with a conflict.
    pub fn conflict_next(&self) {
        self.faults.borrow_mut().conflict_next = true;
    }

    /// Fail the next mutation in transit.
    pub fn network_failure_next_submit(&self) {
        self.faults.borrow_mut().network_next_submit = true;
    }

    /// Fail the next list request in transit.
    pub fn network_failure_next_fetch(&self) {
        self.faults.borrow_mut().network_next_fetch = true;
    }

    /// Every descriptor submitted so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<ActionDescriptor> {
        self.submissions.borrow().clone()
    }

    /// List requests served so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    /// Records matching `query`, in server order.
    #[must_use]
    pub fn matching(&self, query: &Query) -> Vec<ItemRecord> {
        let mut matches: Vec<ItemRecord> = self
            .items
            .borrow()
            .iter()
            .filter(|item| matches_filters(item, &query.filters) && matches_search(item, &query.search))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            let ordering = compare_field(a, b, &query.sort.field).then_with(|| a.hash.cmp(&b.hash));
            match query.sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        matches
    }

    /// Keys a descriptor addresses, expanding select-all against the current data.
    #[must_use]
    pub fn resolve(&self, descriptor: &ActionDescriptor) -> Vec<ItemKey> {
        match descriptor.addressing() {
            Addressing::Explicit(hashes) => hashes
                .iter()
                .filter(|key| self.contains(key))
                .cloned()
                .collect(),
            Addressing::AllMatching {
                filters,
                search,
                exclusions,
            } => {
                let query = Query::default()
                    .with_filters(filters.cloned().unwrap_or_default())
                    .with_search(search.unwrap_or_default());
                let excluded: HashSet<&ItemKey> = exclusions.iter().collect();
                self.matching(&query)
                    .into_iter()
                    .map(|item| item.hash)
                    .filter(|key| !excluded.contains(key))
                    .collect()
            }
        }
    }

    fn apply(&self, action: &BulkAction, targets: &[ItemKey]) {
        let targets: HashSet<&ItemKey> = targets.iter().collect();
        let mut items = self.items.borrow_mut();
        if action.is_destructive() {
            items.retain(|item| !targets.contains(&item.hash));
            return;
        }
        for item in items.iter_mut().filter(|item| targets.contains(&item.hash)) {
            match action {
                BulkAction::Pause => set(item, "state", "paused"),
                BulkAction::Resume => set(item, "state", "downloading"),
                BulkAction::Move { download_dir } => set(item, "downloadDir", download_dir.as_str()),
                BulkAction::Category { category } => set(item, "category", category.as_str()),
                BulkAction::Tags { tags } => set(item, "tags", tags.clone()),
                BulkAction::Sequential { enable } => set(item, "sequential", *enable),
                BulkAction::Rate {
                    download_bps,
                    upload_bps,
                } => {
                    if let Some(limit) = download_bps {
                        set(item, "downloadLimitBps", *limit);
                    }
                    if let Some(limit) = upload_bps {
                        set(item, "uploadLimitBps", *limit);
                    }
                }
                BulkAction::Recheck | BulkAction::Reannounce | BulkAction::Remove { .. } => {}
            }
        }
    }
}

#[async_trait(?Send)]
impl ListBackend for FakeCollection {
    async fn fetch_page(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Page, BackendError> {
        self.fetches.set(self.fetches.get() + 1);
        if std::mem::take(&mut self.faults.borrow_mut().network_next_fetch) {
            return Err(BackendError::network(std::io::Error::other(
                "connection reset by peer",
            )));
        }
        let matches = self.matching(query);
        let total_count = u64::try_from(matches.len()).unwrap_or(u64::MAX);
        let items = matches.into_iter().skip(offset).take(limit).collect();
        Ok(Page {
            items,
            offset,
            total_count,
        })
    }
}

#[async_trait(?Send)]
impl MutationBackend for FakeCollection {
    async fn submit(&self, descriptor: &ActionDescriptor) -> Result<MutationReport, BackendError> {
        self.submissions.borrow_mut().push(descriptor.clone());
        {
            let mut faults = self.faults.borrow_mut();
            if std::mem::take(&mut faults.network_next_submit) {
                return Err(BackendError::network(std::io::Error::other(
                    "connection reset by peer",
                )));
            }
            if descriptor.select_all && std::mem::take(&mut faults.conflict_next) {
                return Err(BackendError::Conflict {
                    detail: "matching set changed".into(),
                });
            }
        }

        let targets = self.resolve(descriptor);
        let (failed, applied): (Vec<ItemKey>, Vec<ItemKey>) = {
            let faults = self.faults.borrow();
            targets
                .into_iter()
                .partition(|key| faults.failing_keys.contains_key(key))
        };
        self.apply(&descriptor.action, &applied);

        let faults = self.faults.borrow();
        Ok(MutationReport {
            succeeded: u64::try_from(applied.len()).unwrap_or(u64::MAX),
            failed: failed
                .into_iter()
                .map(|hash| ItemFailure {
                    message: faults.failing_keys.get(&hash).cloned().unwrap_or_default(),
                    hash,
                })
                .collect(),
        })
    }
}

fn matches_filters(item: &ItemRecord, filters: &FilterSet) -> bool {
    filters
        .iter()
        .all(|(name, value)| item.text(name) == Some(value.as_str()))
}

fn matches_search(item: &ItemRecord, search: &str) -> bool {
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    item.text("name")
        .is_some_and(|name| name.to_lowercase().contains(&needle))
}

fn compare_field(a: &ItemRecord, b: &ItemRecord, field: &str) -> Ordering {
    match (a.fields.get(field), b.fields.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn set(item: &mut ItemRecord, name: &str, value: impl Into<Value>) {
    item.fields.insert(name.to_string(), value.into());
}
