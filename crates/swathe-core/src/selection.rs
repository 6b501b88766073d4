//! Dual-mode selection over a paginated, mutating result set.
//!
//! # Design
//! - `Explicit` tracks the chosen keys; `AllMatching` tracks only the carve-outs, so selecting
//!   every match costs nothing regardless of the collection size.
//! - Switching variants drops the previous payload.
//! - Counts are derived from the server total on demand and clamped to `[0, total]`.

use std::collections::HashSet;
use std::time::Instant;

use swathe_api_models::ItemKey;
use tracing::debug;

/// Selection payload; exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    /// Exactly these keys are selected.
    Explicit {
        /// Selected keys.
        keys: HashSet<ItemKey>,
    },
    /// Every item matching the active query is selected except these keys.
    AllMatching {
        /// Excluded keys.
        exclusions: HashSet<ItemKey>,
    },
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::Explicit {
            keys: HashSet::new(),
        }
    }
}

/// Observable selection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    /// Nothing selected.
    Empty,
    /// Some explicit keys selected.
    Explicit,
    /// Every match selected.
    AllMatchingFull,
    /// Every match selected except at least one carve-out.
    AllMatchingPartial,
}

/// Header summary of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSummary {
    /// Nothing selected.
    None,
    /// `n` explicitly selected items.
    Some(u64),
    /// All `n` matches selected.
    All(u64),
    /// `n` matches selected after carve-outs.
    AllExcept(u64),
}

impl SelectionSummary {
    /// Short label for the selection header.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::None => String::new(),
            Self::Some(count) | Self::AllExcept(count) => format!("{count} selected"),
            Self::All(count) => format!("All {count} selected"),
        }
    }
}

/// Who changed the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A user gesture (search, filter, sort).
    User,
    /// A background refresh with the same query tuple.
    Passive,
}

/// Selection state machine.
#[derive(Debug, Default)]
pub struct SelectionEngine {
    state: SelectionState,
    anchor: Option<ItemKey>,
    last_user_action: Option<Instant>,
    pins: usize,
    reset_deferred: bool,
}

impl SelectionEngine {
    /// Empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current payload.
    #[must_use]
    pub const fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SelectionPhase {
        match &self.state {
            SelectionState::Explicit { keys } if keys.is_empty() => SelectionPhase::Empty,
            SelectionState::Explicit { .. } => SelectionPhase::Explicit,
            SelectionState::AllMatching { exclusions } if exclusions.is_empty() => {
                SelectionPhase::AllMatchingFull
            }
            SelectionState::AllMatching { .. } => SelectionPhase::AllMatchingPartial,
        }
    }

    /// Whether a row is checked.
    #[must_use]
    pub fn is_selected(&self, key: &ItemKey) -> bool {
        match &self.state {
            SelectionState::Explicit { keys } => keys.contains(key),
            SelectionState::AllMatching { exclusions } => !exclusions.contains(key),
        }
    }

    /// Number of selected items against `total` matches.
    #[must_use]
    pub fn effective_count(&self, total: u64) -> u64 {
        match &self.state {
            SelectionState::Explicit { keys } => len_u64(keys.len()).min(total),
            SelectionState::AllMatching { exclusions } => {
                total.saturating_sub(len_u64(exclusions.len()))
            }
        }
    }

    /// Header summary against `total` matches.
    #[must_use]
    pub fn summary(&self, total: u64) -> SelectionSummary {
        let count = self.effective_count(total);
        match self.phase() {
            SelectionPhase::Empty => SelectionSummary::None,
            SelectionPhase::Explicit => SelectionSummary::Some(count),
            SelectionPhase::AllMatchingFull => SelectionSummary::All(count),
            SelectionPhase::AllMatchingPartial => SelectionSummary::AllExcept(count),
        }
    }

    /// Keys held by the active payload: selected keys, or exclusions.
    pub fn tracked_keys(&self) -> impl Iterator<Item = &ItemKey> {
        match &self.state {
            SelectionState::Explicit { keys } => keys.iter(),
            SelectionState::AllMatching { exclusions } => exclusions.iter(),
        }
    }

    /// Instant of the most recent user gesture.
    #[must_use]
    pub const fn last_user_action(&self) -> Option<Instant> {
        self.last_user_action
    }

    /// Record a user gesture that did not change the selection itself.
    pub fn note_user_action(&mut self, now: Instant) {
        self.last_user_action = Some(self.last_user_action.map_or(now, |last| last.max(now)));
    }

    /// Whether a refresh issued at `issued_at` may prune keys.
    #[must_use]
    pub fn may_prune(&self, issued_at: Instant) -> bool {
        self.last_user_action.is_none_or(|last| issued_at >= last)
    }

    /// Check or uncheck a single row.
    pub fn toggle(&mut self, key: &ItemKey, checked: bool, now: Instant) {
        self.note_user_action(now);
        match &mut self.state {
            SelectionState::Explicit { keys } => {
                if checked {
                    keys.insert(key.clone());
                } else {
                    keys.remove(key);
                }
            }
            SelectionState::AllMatching { exclusions } => {
                if checked {
                    exclusions.remove(key);
                } else {
                    exclusions.insert(key.clone());
                }
            }
        }
        self.anchor = Some(key.clone());
    }

    /// Header checkbox: clear when anything is selected, otherwise select every match.
    pub fn select_all_visible(&mut self, total: u64, now: Instant) -> SelectionPhase {
        self.note_user_action(now);
        self.state = if self.effective_count(total) > 0 {
            SelectionState::default()
        } else {
            SelectionState::AllMatching {
                exclusions: HashSet::new(),
            }
        };
        self.anchor = None;
        self.phase()
    }

    /// Select the contiguous span between `anchor` and `target` in rendered `order`.
    ///
    /// A missing or unrendered anchor selects only the target. Returns the span length.
    pub fn range_select(
        &mut self,
        anchor: Option<&ItemKey>,
        target: &ItemKey,
        order: &[ItemKey],
        now: Instant,
    ) -> usize {
        let Some(end) = order.iter().position(|key| key == target) else {
            return 0;
        };
        let start = anchor
            .and_then(|anchor| order.iter().position(|key| key == anchor))
            .unwrap_or(end);
        let (low, high) = if start <= end { (start, end) } else { (end, start) };
        let span = &order[low..=high];

        self.note_user_action(now);
        match &mut self.state {
            SelectionState::Explicit { keys } => keys.extend(span.iter().cloned()),
            SelectionState::AllMatching { exclusions } => {
                for key in span {
                    exclusions.remove(key);
                }
            }
        }
        if self.anchor.is_none() {
            self.anchor = Some(target.clone());
        }
        span.len()
    }

    /// Shift-click / shift-arrow: extend from the last toggled row to `target`.
    pub fn extend_to(&mut self, target: &ItemKey, order: &[ItemKey], now: Instant) -> usize {
        let anchor = self.anchor.clone();
        self.range_select(anchor.as_ref(), target, order, now)
    }

    /// Drop keys that no longer exist from whichever payload is active. Idempotent.
    pub fn prune<'a>(&mut self, removed: impl IntoIterator<Item = &'a ItemKey>) -> usize {
        let payload = match &mut self.state {
            SelectionState::Explicit { keys } => keys,
            SelectionState::AllMatching { exclusions } => exclusions,
        };
        let before = payload.len();
        for key in removed {
            payload.remove(key);
        }
        let pruned = before - payload.len();
        if pruned > 0 {
            debug!(pruned, "pruned selection");
        }
        pruned
    }

    /// Replace the selection with exactly `keys`.
    pub fn narrow_to(&mut self, keys: HashSet<ItemKey>) {
        self.state = SelectionState::Explicit { keys };
        self.anchor = None;
    }

    /// Clear the selection as a user gesture.
    pub fn clear(&mut self, now: Instant) {
        self.note_user_action(now);
        self.reset();
    }

    /// React to a query change; returns whether the selection was reset.
    ///
    /// User changes reset the selection, or defer the reset while an action holds a pin.
    pub fn on_query_changed(&mut self, origin: ChangeOrigin) -> bool {
        match origin {
            ChangeOrigin::Passive => false,
            ChangeOrigin::User if self.pins > 0 => {
                self.reset_deferred = true;
                false
            }
            ChangeOrigin::User => {
                self.reset();
                true
            }
        }
    }

    /// Hold the selection for an in-flight action.
    pub const fn pin(&mut self) {
        self.pins += 1;
    }

    /// Release a pin; applies a deferred reset once the last pin is released.
    pub fn unpin(&mut self) -> bool {
        self.pins = self.pins.saturating_sub(1);
        if self.pins == 0 && self.reset_deferred {
            self.reset();
            return true;
        }
        false
    }

    /// Whether an action currently holds the selection.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    fn reset(&mut self) {
        self.state = SelectionState::default();
        self.anchor = None;
        self.reset_deferred = false;
    }
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
