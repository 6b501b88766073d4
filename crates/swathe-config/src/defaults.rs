//! Default tuning values for the list engine.
//!
//! # Design
//! - Keep every tuning constant in one place so tests and docs agree.
//! - None of these values are correctness contracts; they only shape cost and feel.

/// Rows requested per page from the list endpoint.
pub const PAGE_SIZE: usize = 100;
/// Rows revealed per progressive materialization step.
pub const REVEAL_BATCH: usize = 100;
/// Distance (in rows) from the materialized end that triggers pagination.
pub const SCROLL_MARGIN: usize = 50;
/// Search keystroke debounce window.
pub const SEARCH_DEBOUNCE_MS: u64 = 200;
/// Overscan used when no tier matches (small datasets).
pub const OVERSCAN_DEFAULT_ROWS: usize = 12;
/// Overscan tiers as `(min_rows, overscan)`, ascending by `min_rows`.
pub const OVERSCAN_TIERS: [(usize, usize); 2] = [(1_000, 6), (10_000, 3)];
/// Scroll velocity (pixels per millisecond) below which scrolling counts as settling.
pub const SETTLE_VELOCITY: f64 = 1.5;
/// Minimum spacing between pagination checks while scrolling fast.
pub const MIN_CHECK_INTERVAL_MS: u64 = 150;
/// Delay before the authoritative refetch after a mutation.
pub const REFETCH_DELAY_MS: u64 = 1_000;
/// Delay before the authoritative refetch after a mutation that touches disk.
pub const REFETCH_DISK_DELAY_MS: u64 = 3_000;
/// Maximum number of query variants retained in the item cache.
pub const MAX_CACHED_QUERIES: usize = 16;
