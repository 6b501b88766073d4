//! Bulk action dispatch: selection → descriptor → backend → cache reconciliation.
//!
//! # Design
//! - Descriptors are projections of the selection; an all-matching selection is never expanded
//!   into keys on the client.
//! - Destructive actions strip affected rows optimistically and keep a receipt for rollback.
//! - `prepare` and `settle` are synchronous; only `submit` suspends.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use swathe_api_models::{ActionDescriptor, BulkAction, ItemKey, MutationReport};
use swathe_config::RefetchConfig;
use tracing::{info, instrument, warn};

use crate::cache::{ItemCache, StripReceipt, count_u64};
use crate::error::{BackendError, DispatchError};
use crate::query::Query;
use crate::selection::SelectionState;

/// Target of bulk mutations.
#[async_trait(?Send)]
pub trait MutationBackend {
    /// Apply `descriptor` server-side.
    async fn submit(&self, descriptor: &ActionDescriptor) -> Result<MutationReport, BackendError>;
}

/// Reject action parameters the server would refuse.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidAction`] naming the verb and the failed constraint.
pub fn validate_action(action: &BulkAction) -> Result<(), DispatchError> {
    let reason = match action {
        BulkAction::Move { download_dir } if download_dir.trim().is_empty() => {
            Some("download_dir must not be empty")
        }
        BulkAction::Tags { tags } if tags.is_empty() => Some("at least one tag is required"),
        BulkAction::Tags { tags } if tags.iter().any(|tag| tag.trim().is_empty()) => {
            Some("tags must not be blank")
        }
        BulkAction::Rate {
            download_bps: None,
            upload_bps: None,
        } => Some("at least one rate limit is required"),
        _ => None,
    };
    reason.map_or(Ok(()), |reason| {
        Err(DispatchError::InvalidAction {
            action: action.verb(),
            reason,
        })
    })
}

/// Project the selection and the active query into a wire descriptor.
#[must_use]
pub fn build_descriptor(
    selection: &SelectionState,
    query: &Query,
    action: BulkAction,
) -> ActionDescriptor {
    match selection {
        SelectionState::Explicit { keys } => {
            let mut hashes: Vec<ItemKey> = keys.iter().cloned().collect();
            hashes.sort();
            ActionDescriptor::explicit(action, hashes)
        }
        SelectionState::AllMatching { exclusions } => {
            let mut excluded: Vec<ItemKey> = exclusions.iter().cloned().collect();
            excluded.sort();
            ActionDescriptor::all_matching(
                action,
                query.filters.clone(),
                query.search.clone(),
                excluded,
            )
        }
    }
}

/// An action between `prepare` and `settle`.
#[derive(Debug)]
pub struct PendingAction {
    descriptor: ActionDescriptor,
    query: Query,
    optimistic: HashSet<ItemKey>,
    expected: u64,
    receipt: Option<StripReceipt>,
    started_at: Instant,
}

impl PendingAction {
    /// Descriptor to submit.
    #[must_use]
    pub const fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    /// Query active when the action started.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Items the selection addressed when the action started.
    #[must_use]
    pub const fn expected(&self) -> u64 {
        self.expected
    }

    /// When the action started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }
}

/// Successful outcome of a dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    /// Verb that ran.
    pub verb: &'static str,
    /// Items the server reported as changed.
    pub succeeded: u64,
    /// Whether affected rows left the collection.
    pub destructive: bool,
    /// When the authoritative refetch is due.
    pub refetch_at: Instant,
}

/// Turns selections into mutations and reconciles the cache with their results.
#[derive(Debug, Clone, Copy)]
pub struct BulkActionDispatcher {
    refetch: RefetchConfig,
}

impl BulkActionDispatcher {
    /// Dispatcher using `refetch` delays.
    #[must_use]
    pub const fn new(refetch: RefetchConfig) -> Self {
        Self { refetch }
    }

    /// Delay before the authoritative refetch after `action`.
    #[must_use]
    pub const fn refetch_delay(&self, action: &BulkAction) -> Duration {
        self.refetch.delay(action.touches_disk())
    }

    /// Validate, build the descriptor, and strip destructive targets from the cache.
    ///
    /// `total` is the active query's match count.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptySelection`] or [`DispatchError::InvalidAction`].
    pub fn prepare(
        &self,
        selection: &SelectionState,
        query: &Query,
        total: u64,
        action: BulkAction,
        cache: &mut ItemCache,
        now: Instant,
    ) -> Result<PendingAction, DispatchError> {
        validate_action(&action)?;
        let expected = effective(selection, total);
        if expected == 0 {
            return Err(DispatchError::EmptySelection);
        }

        let destructive = action.is_destructive();
        let descriptor = build_descriptor(selection, query, action);
        let mut pending = PendingAction {
            descriptor,
            query: query.clone(),
            optimistic: HashSet::new(),
            expected,
            receipt: None,
            started_at: now,
        };
        if destructive {
            pending.optimistic = addressed_cached_keys(selection, query, cache);
            pending.receipt = Some(strip_optimistic(
                cache,
                query,
                &pending.optimistic,
                expected,
            ));
        }
        Ok(pending)
    }

    /// Send the descriptor to the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure unchanged; [`settle`](Self::settle) classifies it.
    #[instrument(skip_all, fields(action = pending.descriptor.action.verb(), select_all = pending.descriptor.select_all))]
    pub async fn submit<B>(
        backend: &B,
        pending: &PendingAction,
    ) -> Result<MutationReport, BackendError>
    where
        B: MutationBackend + ?Sized,
    {
        backend.submit(&pending.descriptor).await
    }

    /// Apply the backend result to the cache.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::PartialFailure`]: successes stay stripped, failed rows are restored.
    /// - [`DispatchError::AddressingConflict`], [`DispatchError::Network`],
    ///   [`DispatchError::Rejected`]: every optimistic change is rolled back.
    pub fn settle(
        &self,
        pending: PendingAction,
        result: Result<MutationReport, BackendError>,
        cache: &mut ItemCache,
        now: Instant,
    ) -> Result<ActionReport, DispatchError> {
        let PendingAction {
            descriptor,
            query,
            optimistic,
            receipt,
            ..
        } = pending;
        let verb = descriptor.action.verb();
        let destructive = descriptor.action.is_destructive();

        let report = match result {
            Ok(report) => report,
            Err(source) => {
                if let Some(receipt) = receipt {
                    cache.restore(receipt);
                }
                warn!(action = verb, error = %source, "bulk action failed; rolled back");
                return Err(match source {
                    BackendError::Conflict { detail } => {
                        DispatchError::AddressingConflict { detail }
                    }
                    BackendError::Network { .. } => DispatchError::Network { source },
                    other => DispatchError::Rejected { source: other },
                });
            }
        };

        if !report.failed.is_empty() {
            if let Some(receipt) = receipt {
                cache.restore(receipt);
                let failed: HashSet<&ItemKey> =
                    report.failed.iter().map(|failure| &failure.hash).collect();
                let kept: HashSet<ItemKey> = optimistic
                    .into_iter()
                    .filter(|key| !failed.contains(key))
                    .collect();
                strip_optimistic(cache, &query, &kept, report.succeeded).commit();
            }
            warn!(
                action = verb,
                succeeded = report.succeeded,
                failed = report.failed.len(),
                "bulk action partially failed"
            );
            return Err(DispatchError::PartialFailure {
                succeeded: report.succeeded,
                failed: report.failed,
            });
        }

        if let Some(receipt) = receipt {
            receipt.commit();
        }
        info!(action = verb, succeeded = report.succeeded, "bulk action applied");
        Ok(ActionReport {
            verb,
            succeeded: report.succeeded,
            destructive,
            refetch_at: now + self.refetch.delay(descriptor.action.touches_disk()),
        })
    }
}

fn effective(selection: &SelectionState, total: u64) -> u64 {
    match selection {
        SelectionState::Explicit { keys } => count_u64(keys.len()).min(total),
        SelectionState::AllMatching { exclusions } => {
            total.saturating_sub(count_u64(exclusions.len()))
        }
    }
}

fn addressed_cached_keys(
    selection: &SelectionState,
    query: &Query,
    cache: &ItemCache,
) -> HashSet<ItemKey> {
    match selection {
        SelectionState::Explicit { keys } => keys.clone(),
        SelectionState::AllMatching { exclusions } => cache
            .get(query)
            .map(|entry| {
                entry
                    .items()
                    .iter()
                    .filter(|item| !exclusions.contains(&item.hash))
                    .map(|item| item.hash.clone())
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Strip `keys` everywhere and lower the active total for addressed rows outside the prefix.
fn strip_optimistic(
    cache: &mut ItemCache,
    query: &Query,
    keys: &HashSet<ItemKey>,
    expected: u64,
) -> StripReceipt {
    let mut receipt = cache.strip(keys);
    let stripped = count_u64(receipt.removed_from(query));
    cache.reduce_total(query, expected.saturating_sub(stripped), &mut receipt);
    receipt
}
