//! Viewport windowing: progressive materialization and scroll-triggered pagination.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;

use swathe_config::{OverscanConfig, PaginationConfig, ScrollConfig, ViewConfig};

use crate::query::Item;

/// Scroll position reported by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSample {
    /// Pixels scrolled from the top of the list.
    pub scroll_top: u32,
    /// Height of the visible viewport in pixels.
    pub viewport_height: u32,
    /// Fixed row height in pixels.
    pub row_height: u32,
}

/// Rows to render for one scroll position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleWindow {
    /// Row indices to render, overscan included, clamped to the materialized rows.
    pub range: Range<usize>,
    /// Pixel offset of the first rendered row.
    pub offset_px: u64,
    /// Pixel height of every materialized row.
    pub total_height_px: u64,
}

/// What a scroll event asks of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDemand {
    /// Nothing to do.
    Idle,
    /// Scrolling too fast; the near-end check was skipped.
    Throttled,
    /// More cached rows were materialized.
    Revealed {
        /// Materialized row budget after the reveal.
        loaded_count: usize,
    },
    /// Cached rows are exhausted; the next page should be fetched.
    FetchMore,
}

/// Result of [`ViewportWindower::on_scroll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Rows to render.
    pub window: VisibleWindow,
    /// Follow-up requested by the scroll.
    pub demand: ScrollDemand,
}

/// Tracks the materialized row budget and decides when to paginate.
#[derive(Debug, Clone)]
pub struct ViewportWindower {
    pagination: PaginationConfig,
    overscan: OverscanConfig,
    scroll: ScrollConfig,
    loaded_count: usize,
    awaiting_page: bool,
    last_sample: Option<(u32, Instant)>,
    last_check: Option<Instant>,
}

impl ViewportWindower {
    /// Windower starting at one reveal batch.
    #[must_use]
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            pagination: config.pagination,
            overscan: config.overscan.clone(),
            scroll: config.scroll,
            loaded_count: config.pagination.reveal_batch,
            awaiting_page: false,
            last_sample: None,
            last_check: None,
        }
    }

    /// Materialized row budget; only grows until the next [`reset`](Self::reset).
    #[must_use]
    pub const fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    /// Whether a scroll-triggered page is outstanding.
    #[must_use]
    pub const fn is_awaiting_page(&self) -> bool {
        self.awaiting_page
    }

    /// Back to the initial batch for a new query.
    pub const fn reset(&mut self) {
        self.loaded_count = self.pagination.reveal_batch;
        self.awaiting_page = false;
        self.last_sample = None;
        self.last_check = None;
    }

    /// Rows actually renderable given `cached_len` cached rows.
    #[must_use]
    pub fn rendered_len(&self, cached_len: usize) -> usize {
        self.loaded_count.min(cached_len)
    }

    /// The materialized prefix of `items`.
    #[must_use]
    pub fn materialize<'a>(&self, items: &'a [Item]) -> &'a [Item] {
        &items[..self.rendered_len(items.len())]
    }

    /// Rows to render at `sample`, with overscan sized for a `total_count`-row dataset.
    #[must_use]
    pub fn visible_slice(
        &self,
        sample: ScrollSample,
        cached_len: usize,
        total_count: u64,
    ) -> VisibleWindow {
        let len = self.rendered_len(cached_len);
        let dataset = usize::try_from(total_count).unwrap_or(usize::MAX);
        let overscan = self.overscan.rows_for(dataset.max(len));
        let row_height = sample.row_height.max(1);
        let first = usize::try_from(sample.scroll_top / row_height).unwrap_or(usize::MAX);
        let visible = usize::try_from(sample.viewport_height.div_ceil(row_height).max(1))
            .unwrap_or(usize::MAX);

        let start = first.saturating_sub(overscan).min(len);
        let end = first
            .saturating_add(visible)
            .saturating_add(overscan)
            .min(len);
        VisibleWindow {
            range: start..end.max(start),
            offset_px: u64::from(row_height).saturating_mul(count_u64(start)),
            total_height_px: u64::from(row_height).saturating_mul(count_u64(len)),
        }
    }

    /// Handle a scroll event and decide whether to reveal rows or fetch a page.
    pub fn on_scroll(
        &mut self,
        sample: ScrollSample,
        cached_len: usize,
        total_count: u64,
        now: Instant,
    ) -> ScrollOutcome {
        let window = self.visible_slice(sample, cached_len, total_count);
        let velocity = self.velocity(sample.scroll_top, now);
        self.last_sample = Some((sample.scroll_top, now));

        let settling = velocity <= self.scroll.settle_velocity;
        let interval_elapsed = self
            .last_check
            .is_none_or(|last| now.duration_since(last) >= self.scroll.min_check_interval());
        if !settling && !interval_elapsed {
            return ScrollOutcome {
                window,
                demand: ScrollDemand::Throttled,
            };
        }
        self.last_check = Some(now);

        let has_more = count_u64(cached_len) < total_count;
        let demand = self.check_near_end(window.range.end, cached_len, has_more);
        ScrollOutcome { window, demand }
    }

    /// A page merged for the active query; grows the budget if it was waiting on one.
    pub const fn on_page_merged(&mut self, cached_len: usize) -> bool {
        if !self.awaiting_page {
            return false;
        }
        self.awaiting_page = false;
        if cached_len > self.loaded_count {
            self.loaded_count += self.pagination.reveal_batch;
            return true;
        }
        false
    }

    /// The outstanding page failed; the next scroll may ask again.
    pub const fn on_fetch_failed(&mut self) {
        self.awaiting_page = false;
    }

    fn check_near_end(&mut self, rendered_end: usize, cached_len: usize, has_more: bool) -> ScrollDemand {
        let rendered = self.rendered_len(cached_len);
        if rendered == 0 || rendered_end + self.pagination.scroll_margin < rendered {
            return ScrollDemand::Idle;
        }
        if cached_len > self.loaded_count {
            self.loaded_count += self.pagination.reveal_batch;
            return ScrollDemand::Revealed {
                loaded_count: self.loaded_count,
            };
        }
        if has_more && !self.awaiting_page {
            self.awaiting_page = true;
            return ScrollDemand::FetchMore;
        }
        ScrollDemand::Idle
    }

    #[allow(clippy::cast_precision_loss)]
    fn velocity(&self, scroll_top: u32, now: Instant) -> f64 {
        let Some((previous, at)) = self.last_sample else {
            return 0.0;
        };
        let distance = f64::from(scroll_top.abs_diff(previous));
        let elapsed_ms = now.duration_since(at).as_millis() as f64;
        if elapsed_ms > 0.0 {
            distance / elapsed_ms
        } else if distance > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Render keys for `items`: the item key, salted with the position only for repeats.
#[must_use]
pub fn row_keys(items: &[Item]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let count = seen.entry(item.hash.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                item.hash.to_string()
            } else {
                format!("{}#{index}", item.hash)
            }
        })
        .collect()
}

fn count_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
