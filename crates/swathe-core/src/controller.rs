//! Single-writer orchestrator for one list view.
//!
//! # Design
//! - The controller is the only mutator of the cache and the selection; every transition is a
//!   synchronous method taking the current instant.
//! - Async work is reduced to tickets: callers fetch or submit however they like and hand the
//!   result back, so responses from different requests can interleave in any order.
//! - `run_fetch` and `perform_action` bundle the common issue/await/apply sequence.

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use swathe_api_models::{BulkAction, FilterSet, ItemKey, MutationReport, SortSpec};
use swathe_config::ViewConfig;
use swathe_telemetry::Metrics;
use tracing::{debug, warn};

use crate::cache::{CachedList, Freshness, ItemCache};
use crate::dispatch::{ActionReport, BulkActionDispatcher, MutationBackend, PendingAction};
use crate::error::{BackendError, DispatchError, ListError};
use crate::preferences::{PreferenceStore, TORRENT_VIEW_KEY, ViewPreferences};
use crate::provider::{FetchKind, FetchTicket, ListBackend, RemoteListProvider};
use crate::query::{Item, Page, Query};
use crate::scheduler::{Scheduler, Task};
use crate::selection::{ChangeOrigin, SelectionEngine, SelectionPhase, SelectionSummary};
use crate::viewport::{ScrollDemand, ScrollSample, ViewportWindower, VisibleWindow, row_keys};

/// Result of handing a response back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A newer request for the same query superseded this one; nothing changed.
    Stale,
    /// The page was merged.
    Applied {
        /// Whether the page belonged to the active query.
        active: bool,
        /// Why the page was requested.
        kind: FetchKind,
        /// Cached rows for the query after the merge.
        len: usize,
        /// Total reported by the page.
        total_count: u64,
        /// Selected keys dropped because the refresh no longer contained them.
        pruned: usize,
    },
}

/// Result of a scroll event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollResult {
    /// Rows to render.
    pub window: VisibleWindow,
    /// What the windower decided.
    pub demand: ScrollDemand,
    /// Page request to run, when one was issued.
    pub fetch: Option<FetchTicket>,
}

/// Engine for one list view.
pub struct ListController {
    config: ViewConfig,
    query: Query,
    page_size: usize,
    cache: ItemCache,
    provider: RemoteListProvider,
    selection: SelectionEngine,
    windower: ViewportWindower,
    dispatcher: BulkActionDispatcher,
    scheduler: Scheduler,
    preferences: Option<Rc<dyn PreferenceStore>>,
    metrics: Option<Metrics>,
}

impl ListController {
    /// Controller for `query` using `config`.
    #[must_use]
    pub fn new(config: ViewConfig, query: Query) -> Self {
        Self {
            page_size: config.pagination.page_size,
            cache: ItemCache::new(config.cache.max_queries),
            provider: RemoteListProvider::new(),
            selection: SelectionEngine::new(),
            windower: ViewportWindower::new(&config),
            dispatcher: BulkActionDispatcher::new(config.refetch),
            scheduler: Scheduler::new(),
            preferences: None,
            metrics: None,
            query,
            config,
        }
    }

    /// Restore the saved sort and page size from `store`, and persist future sort changes there.
    #[must_use]
    pub fn with_preferences(mut self, store: Rc<dyn PreferenceStore>) -> Self {
        match store.load(TORRENT_VIEW_KEY) {
            Ok(Some(prefs)) => {
                debug!(sort = %prefs.sort.field, "restored view preferences");
                self.query.sort = prefs.sort;
                if let Some(page_size) = prefs.page_size.filter(|size| *size > 0) {
                    self.page_size = page_size;
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to load view preferences"),
        }
        self.preferences = Some(store);
        self
    }

    /// Record fetch, selection, and action metrics into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Active query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Rows requested per page.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Item cache, for diagnostics.
    #[must_use]
    pub const fn cache(&self) -> &ItemCache {
        &self.cache
    }

    /// Selection engine, for read-only inspection.
    #[must_use]
    pub const fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    fn active_entry(&self) -> Option<&CachedList> {
        self.cache.get(&self.query)
    }

    /// Total matches of the active query, `0` until the first page arrives.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.active_entry().map_or(0, CachedList::total_count)
    }

    /// Whether the server holds rows beyond the cached prefix.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.active_entry().is_some_and(CachedList::has_more)
    }

    /// Materialized row budget.
    #[must_use]
    pub const fn loaded_count(&self) -> usize {
        self.windower.loaded_count()
    }

    /// Whether the rows on screen are a snapshot from an earlier visit.
    #[must_use]
    pub fn is_cached_data(&self) -> bool {
        self.active_entry()
            .is_some_and(|entry| entry.freshness() == Freshness::Cached)
    }

    /// Whether the rows on screen come from a response for the current visit.
    #[must_use]
    pub fn is_fresh_data(&self) -> bool {
        self.active_entry()
            .is_some_and(|entry| entry.freshness() == Freshness::Fresh)
    }

    /// Materialized rows of the active query.
    #[must_use]
    pub fn rows(&self) -> &[Item] {
        match self.active_entry() {
            Some(entry) => self.windower.materialize(entry.items()),
            None => &[],
        }
    }

    /// Render keys for [`rows`](Self::rows).
    #[must_use]
    pub fn row_keys(&self) -> Vec<String> {
        row_keys(self.rows())
    }

    /// Rows to render at `sample` without side effects.
    #[must_use]
    pub fn visible_slice(&self, sample: ScrollSample) -> VisibleWindow {
        let cached_len = self.active_entry().map_or(0, CachedList::len);
        self.windower
            .visible_slice(sample, cached_len, self.total_count())
    }

    /// Selected items of the active query.
    #[must_use]
    pub fn effective_count(&self) -> u64 {
        self.selection.effective_count(self.total_count())
    }

    /// Header summary of the selection.
    #[must_use]
    pub fn selection_summary(&self) -> SelectionSummary {
        self.selection.summary(self.total_count())
    }

    /// Whether a row is checked.
    #[must_use]
    pub fn is_selected(&self, key: &ItemKey) -> bool {
        self.selection.is_selected(key)
    }

    /// Earliest pending scheduler deadline; call [`tick`](Self::tick) then.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Open the active query: serve any cached snapshot and issue its first request.
    pub fn start(&mut self, now: Instant) -> FetchTicket {
        self.open_query(now)
    }

    /// Record a search keystroke; the query changes once the debounce window passes.
    pub fn set_search_text(&mut self, text: &str, now: Instant) {
        self.selection.note_user_action(now);
        let due = now + self.config.search.debounce();
        self.scheduler.debounce_search(text.to_string(), due);
    }

    /// Set or clear one filter.
    pub fn set_filter(
        &mut self,
        name: &str,
        value: Option<&str>,
        now: Instant,
    ) -> Option<FetchTicket> {
        let next = self.query.clone().with_filter(name, value);
        self.change_query(next, now)
    }

    /// Replace every filter.
    pub fn set_filters(&mut self, filters: FilterSet, now: Instant) -> Option<FetchTicket> {
        let next = self.query.clone().with_filters(filters);
        self.change_query(next, now)
    }

    /// Change the sort and persist it.
    pub fn set_sort(&mut self, sort: SortSpec, now: Instant) -> Option<FetchTicket> {
        self.save_preferences(&sort);
        let next = self.query.clone().with_sort(sort);
        self.change_query(next, now)
    }

    /// User-initiated query change; `None` when the query tuple is unchanged.
    pub fn change_query(&mut self, next: Query, now: Instant) -> Option<FetchTicket> {
        self.selection.note_user_action(now);
        if next == self.query {
            return None;
        }
        self.scheduler.cancel_search();
        self.query = next;
        self.selection.on_query_changed(ChangeOrigin::User);
        self.record_selection();
        Some(self.open_query(now))
    }

    /// Passive re-fetch of the loaded prefix; the selection is preserved.
    pub fn refresh(&mut self, now: Instant) -> FetchTicket {
        self.selection.on_query_changed(ChangeOrigin::Passive);
        if self.windower.is_awaiting_page() {
            self.windower.on_fetch_failed();
        }
        let Some(cached_len) = self.active_entry().map(CachedList::len) else {
            return self.issue(FetchKind::Initial, 0, self.page_size, now);
        };
        self.issue(FetchKind::Refresh, 0, self.page_size.max(cached_len), now)
    }

    /// Request the page after the cached prefix, unless one is outstanding or none remain.
    pub fn load_more(&mut self, now: Instant) -> Option<FetchTicket> {
        if self.provider.is_in_flight(&self.query) {
            return None;
        }
        let entry = self.active_entry()?;
        if !entry.has_more() {
            return None;
        }
        let offset = entry.len();
        Some(self.issue(FetchKind::NextPage, offset, self.page_size, now))
    }

    /// Handle a scroll event; may reveal cached rows or issue the next page.
    pub fn on_scroll(&mut self, sample: ScrollSample, now: Instant) -> ScrollResult {
        let cached_len = self.active_entry().map_or(0, CachedList::len);
        let outcome = self
            .windower
            .on_scroll(sample, cached_len, self.total_count(), now);
        let mut demand = outcome.demand;
        let fetch = if demand == ScrollDemand::FetchMore {
            let ticket = self.load_more(now);
            if ticket.is_none() {
                self.windower.on_fetch_failed();
                demand = ScrollDemand::Idle;
            }
            ticket
        } else {
            None
        };
        ScrollResult {
            window: outcome.window,
            demand,
            fetch,
        }
    }

    /// Run every scheduler task due at `now`; returns the requests they issued.
    pub fn tick(&mut self, now: Instant) -> Vec<FetchTicket> {
        let mut tickets = Vec::new();
        for task in self.scheduler.due(now) {
            match task {
                Task::ApplySearch(text) => {
                    let next = self.query.clone().with_search(&text);
                    if let Some(ticket) = self.change_query(next, now) {
                        tickets.push(ticket);
                    }
                }
                Task::Refetch(query) if query == self.query => tickets.push(self.refresh(now)),
                Task::Refetch(query) => {
                    debug!(search = %query.search, "refetch target no longer active");
                    self.cache.mark_cached(&query);
                }
            }
        }
        tickets
    }

    /// Apply the response to `ticket`.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure, or [`ListError::Cache`] when the page would break the cached
    /// prefix. Either way the cache is unchanged.
    pub fn apply_page(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Page, ListError>,
    ) -> Result<FetchOutcome, ListError> {
        let active = ticket.query == self.query;
        if let Some(metrics) = &self.metrics {
            metrics.inc_list_fetch(ticket.kind.as_str());
        }
        if !self.provider.accept(ticket) {
            if let Some(metrics) = &self.metrics {
                metrics.inc_stale_response();
            }
            return Ok(FetchOutcome::Stale);
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                if active {
                    self.windower.on_fetch_failed();
                }
                warn!(error = %err, kind = ticket.kind.as_str(), "list fetch failed");
                return Err(err);
            }
        };

        let outcome = match ticket.kind {
            FetchKind::Refresh => {
                let summary = self
                    .cache
                    .replace(&ticket.query, page)
                    .map_err(|source| ListError::Cache { source })?;
                debug!(removed = summary.removed.len(), "refreshed cached prefix");
                let pruned = if active
                    && summary.complete
                    && self.selection.may_prune(ticket.issued_at)
                {
                    self.prune_missing()
                } else {
                    0
                };
                FetchOutcome::Applied {
                    active,
                    kind: ticket.kind,
                    len: summary.len,
                    total_count: summary.total_count,
                    pruned,
                }
            }
            FetchKind::Initial | FetchKind::NextPage => {
                let summary = match self.cache.merge_page(&ticket.query, page) {
                    Ok(summary) => summary,
                    Err(source) => {
                        if active {
                            self.windower.on_fetch_failed();
                        }
                        return Err(ListError::Cache { source });
                    }
                };
                if active && ticket.kind == FetchKind::NextPage {
                    self.windower.on_page_merged(summary.len);
                }
                FetchOutcome::Applied {
                    active,
                    kind: ticket.kind,
                    len: summary.len,
                    total_count: summary.total_count,
                    pruned: 0,
                }
            }
        };
        self.record_cache();
        self.record_selection();
        Ok(outcome)
    }

    /// Check or uncheck one row.
    pub fn toggle(&mut self, key: &ItemKey, checked: bool, now: Instant) {
        self.selection.toggle(key, checked, now);
        self.record_selection();
    }

    /// Header checkbox.
    pub fn select_all_visible(&mut self, now: Instant) -> SelectionPhase {
        let phase = self.selection.select_all_visible(self.total_count(), now);
        self.record_selection();
        phase
    }

    /// Select the rendered span between `anchor` and `target`.
    pub fn range_select(
        &mut self,
        anchor: Option<&ItemKey>,
        target: &ItemKey,
        now: Instant,
    ) -> usize {
        let order = self.rendered_order();
        let span = self.selection.range_select(anchor, target, &order, now);
        self.record_selection();
        span
    }

    /// Extend from the last toggled row to `target`.
    pub fn extend_selection(&mut self, target: &ItemKey, now: Instant) -> usize {
        let order = self.rendered_order();
        let span = self.selection.extend_to(target, &order, now);
        self.record_selection();
        span
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self, now: Instant) {
        self.selection.clear(now);
        self.record_selection();
    }

    /// Items deleted out of band (e.g. by another client): drop them everywhere.
    pub fn apply_removals(&mut self, keys: &[ItemKey]) -> usize {
        let removed: HashSet<ItemKey> = keys.iter().cloned().collect();
        let receipt = self.cache.strip(&removed);
        let stripped = receipt.removed_from(&self.query);
        let pruned = self.selection.prune(keys);
        debug!(stripped, pruned, "applied out-of-band removals");
        self.record_selection();
        stripped
    }

    /// Validate the action, build its descriptor, pin the selection, and strip optimistically.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptySelection`] or [`DispatchError::InvalidAction`]; nothing
    /// changes in that case.
    pub fn begin_action(
        &mut self,
        action: BulkAction,
        now: Instant,
    ) -> Result<PendingAction, DispatchError> {
        let verb = action.verb();
        let total = self.total_count();
        let prepared = self.dispatcher.prepare(
            self.selection.state(),
            &self.query,
            total,
            action,
            &mut self.cache,
            now,
        );
        match prepared {
            Ok(pending) => {
                self.selection.pin();
                self.selection.note_user_action(now);
                Ok(pending)
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_bulk_action(verb, "invalid");
                }
                Err(err)
            }
        }
    }

    /// Apply the backend result of `pending`, reconcile the selection, and schedule a refetch.
    ///
    /// # Errors
    ///
    /// Surfaces every failure classified by [`BulkActionDispatcher::settle`].
    pub fn complete_action(
        &mut self,
        pending: PendingAction,
        result: Result<MutationReport, BackendError>,
        now: Instant,
    ) -> Result<ActionReport, DispatchError> {
        let descriptor = pending.descriptor().clone();
        let query = pending.query().clone();
        let destructive = descriptor.action.is_destructive();
        let delay = self.dispatcher.refetch_delay(&descriptor.action);

        let settled = self.dispatcher.settle(pending, result, &mut self.cache, now);
        let outcome_label = match &settled {
            Ok(report) => {
                if destructive {
                    self.reconcile_selection(descriptor.select_all, &descriptor.hashes, &[]);
                }
                self.scheduler.schedule_refetch(query, report.refetch_at);
                "ok"
            }
            Err(DispatchError::PartialFailure { failed, .. }) => {
                if destructive {
                    let failed: Vec<ItemKey> = failed.iter().map(|f| f.hash.clone()).collect();
                    self.reconcile_selection(descriptor.select_all, &descriptor.hashes, &failed);
                }
                self.scheduler.schedule_refetch(query, now + delay);
                "partial"
            }
            Err(DispatchError::AddressingConflict { .. }) => "conflict",
            Err(_) => "error",
        };
        self.selection.unpin();
        if let Some(metrics) = &self.metrics {
            metrics.inc_bulk_action(descriptor.action.verb(), outcome_label);
        }
        self.record_cache();
        self.record_selection();
        settled
    }

    /// Fetch `ticket` from `backend` and apply it.
    ///
    /// # Errors
    ///
    /// See [`apply_page`](Self::apply_page).
    pub async fn run_fetch<B>(
        &mut self,
        backend: &B,
        ticket: FetchTicket,
    ) -> Result<FetchOutcome, ListError>
    where
        B: ListBackend + ?Sized,
    {
        let result = RemoteListProvider::fetch(backend, &ticket).await;
        self.apply_page(&ticket, result)
    }

    /// Begin, submit, and complete `action` against `backend`.
    ///
    /// # Errors
    ///
    /// See [`begin_action`](Self::begin_action) and [`complete_action`](Self::complete_action).
    pub async fn perform_action<B>(
        &mut self,
        backend: &B,
        action: BulkAction,
        now: Instant,
    ) -> Result<ActionReport, DispatchError>
    where
        B: MutationBackend + ?Sized,
    {
        let pending = self.begin_action(action, now)?;
        let result = BulkActionDispatcher::submit(backend, &pending).await;
        self.complete_action(pending, result, now)
    }

    fn open_query(&mut self, now: Instant) -> FetchTicket {
        self.windower.reset();
        if self.cache.mark_cached(&self.query) {
            self.cache.touch(&self.query);
            let cached_len = self.active_entry().map_or(0, CachedList::len);
            debug!(cached_len, "serving cached snapshot while refreshing");
            return self.issue(FetchKind::Refresh, 0, self.page_size.max(cached_len), now);
        }
        self.issue(FetchKind::Initial, 0, self.page_size, now)
    }

    fn issue(&mut self, kind: FetchKind, offset: usize, limit: usize, now: Instant) -> FetchTicket {
        self.provider.issue(&self.query, kind, offset, limit, now)
    }

    /// After a complete refresh, tracked keys absent from the result set no longer exist.
    fn prune_missing(&mut self) -> usize {
        let Some(entry) = self.cache.get(&self.query) else {
            return 0;
        };
        let present: HashSet<&ItemKey> = entry.items().iter().map(|item| &item.hash).collect();
        let missing: Vec<ItemKey> = self
            .selection
            .tracked_keys()
            .filter(|key| !present.contains(key))
            .cloned()
            .collect();
        self.selection.prune(&missing)
    }

    fn rendered_order(&self) -> Vec<ItemKey> {
        self.rows().iter().map(|item| item.hash.clone()).collect()
    }

    /// Destructive success: drop addressed keys, or clear an all-matching selection; keys that
    /// failed stay selected.
    fn reconcile_selection(&mut self, select_all: bool, hashes: &[ItemKey], failed: &[ItemKey]) {
        if select_all {
            if matches!(
                self.selection.phase(),
                SelectionPhase::AllMatchingFull | SelectionPhase::AllMatchingPartial
            ) {
                self.selection.narrow_to(failed.iter().cloned().collect());
            }
            return;
        }
        let failed: HashSet<&ItemKey> = failed.iter().collect();
        self.selection
            .prune(hashes.iter().filter(|key| !failed.contains(key)));
    }

    fn save_preferences(&self, sort: &SortSpec) {
        let Some(store) = &self.preferences else {
            return;
        };
        let prefs = ViewPreferences {
            sort: sort.clone(),
            page_size: (self.page_size != self.config.pagination.page_size).then_some(self.page_size),
        };
        if let Err(err) = store.save(TORRENT_VIEW_KEY, &prefs) {
            warn!(error = %err, "failed to persist view preferences");
        }
    }

    fn record_cache(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_cached_queries(self.cache.len());
        }
    }

    fn record_selection(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_selected_items(self.effective_count());
        }
    }
}
