//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers consumed by the list engine.
//! - Durations are stored as milliseconds so documents stay human-editable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Complete view configuration for one list controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewConfig {
    /// Page sizes and progressive reveal settings.
    pub pagination: PaginationConfig,
    /// Search input settings.
    pub search: SearchConfig,
    /// Overscan tiers for the viewport windower.
    pub overscan: OverscanConfig,
    /// Scroll-triggered pagination throttling.
    pub scroll: ScrollConfig,
    /// Post-mutation refetch delays.
    pub refetch: RefetchConfig,
    /// Item cache retention.
    pub cache: CacheConfig,
}

/// Pagination and progressive materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Rows requested per page.
    pub page_size: usize,
    /// Rows revealed per materialization step.
    pub reveal_batch: usize,
    /// Rows from the materialized end at which pagination fires.
    pub scroll_margin: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: defaults::PAGE_SIZE,
            reveal_batch: defaults::REVEAL_BATCH,
            scroll_margin: defaults::SCROLL_MARGIN,
        }
    }
}

/// Search input settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Debounce window applied to search keystrokes.
    pub debounce_ms: u64,
}

impl SearchConfig {
    /// Debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::SEARCH_DEBOUNCE_MS,
        }
    }
}

/// One overscan tier: datasets with at least `min_rows` rows use `rows` overscan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverscanTier {
    /// Inclusive lower bound on dataset size.
    pub min_rows: usize,
    /// Overscan rows applied above and below the visible range.
    pub rows: usize,
}

/// Overscan policy, scaling inversely with dataset size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverscanConfig {
    /// Overscan for datasets below every tier.
    pub default_rows: usize,
    /// Tiers sorted ascending by `min_rows`.
    pub tiers: Vec<OverscanTier>,
}

impl OverscanConfig {
    /// Overscan rows for a dataset of `len` rows; the largest matching tier wins.
    #[must_use]
    pub fn rows_for(&self, len: usize) -> usize {
        self.tiers
            .iter()
            .rev()
            .find(|tier| len >= tier.min_rows)
            .map_or(self.default_rows, |tier| tier.rows)
    }
}

impl Default for OverscanConfig {
    fn default() -> Self {
        Self {
            default_rows: defaults::OVERSCAN_DEFAULT_ROWS,
            tiers: defaults::OVERSCAN_TIERS
                .iter()
                .map(|(min_rows, rows)| OverscanTier {
                    min_rows: *min_rows,
                    rows: *rows,
                })
                .collect(),
        }
    }
}

/// Throttling for scroll-triggered pagination checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Pixels per millisecond below which the scroll counts as settling.
    pub settle_velocity: f64,
    /// Minimum spacing between checks while the scroll is still fast.
    pub min_check_interval_ms: u64,
}

impl ScrollConfig {
    /// Minimum check spacing as a [`Duration`].
    #[must_use]
    pub const fn min_check_interval(&self) -> Duration {
        Duration::from_millis(self.min_check_interval_ms)
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            settle_velocity: defaults::SETTLE_VELOCITY,
            min_check_interval_ms: defaults::MIN_CHECK_INTERVAL_MS,
        }
    }
}

/// Delays before the authoritative refetch that follows a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefetchConfig {
    /// Delay for actions that only change torrent state.
    pub delay_ms: u64,
    /// Delay for actions that also move or delete data on disk.
    pub disk_delay_ms: u64,
}

impl RefetchConfig {
    /// Refetch delay for an action, longer when it touches disk.
    #[must_use]
    pub const fn delay(&self, touches_disk: bool) -> Duration {
        if touches_disk {
            Duration::from_millis(self.disk_delay_ms)
        } else {
            Duration::from_millis(self.delay_ms)
        }
    }
}

impl Default for RefetchConfig {
    fn default() -> Self {
        Self {
            delay_ms: defaults::REFETCH_DELAY_MS,
            disk_delay_ms: defaults::REFETCH_DISK_DELAY_MS,
        }
    }
}

/// Item cache retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum query variants kept before the least recently used is evicted.
    pub max_queries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_queries: defaults::MAX_CACHED_QUERIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overscan_shrinks_as_dataset_grows() {
        let config = OverscanConfig::default();
        assert_eq!(config.rows_for(10), defaults::OVERSCAN_DEFAULT_ROWS);
        assert_eq!(config.rows_for(1_000), 6);
        assert_eq!(config.rows_for(50_000), 3);
        assert!(config.rows_for(50_000) < config.rows_for(10));
    }

    #[test]
    fn refetch_delay_is_longer_for_disk_actions() {
        let refetch = RefetchConfig::default();
        assert!(refetch.delay(true) > refetch.delay(false));
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let config: ViewConfig =
            serde_json::from_str(r#"{"pagination":{"page_size":250}}"#).expect("valid document");
        assert_eq!(config.pagination.page_size, 250);
        assert_eq!(config.pagination.reveal_batch, defaults::REVEAL_BATCH);
        assert_eq!(config.search, SearchConfig::default());
    }
}
