#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! Selection, caching, and virtualization core for large remote lists.
//!
//! The [`ListController`] owns every piece of mutable state for one view and is driven by
//! synchronous events plus the responses to the requests it issues. Time is always passed in,
//! which keeps debounce, refetch, and scroll throttling deterministic under test.

pub mod cache;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod preferences;
pub mod provider;
pub mod query;
pub mod scheduler;
pub mod selection;
pub mod viewport;

pub use cache::{CachedList, Freshness, ItemCache, MergeSummary, ReplaceSummary, StripReceipt};
pub use controller::{FetchOutcome, ListController, ScrollResult};
pub use dispatch::{
    ActionReport, BulkActionDispatcher, MutationBackend, PendingAction, build_descriptor,
    validate_action,
};
pub use error::{BackendError, CacheError, DispatchError, ListError};
pub use preferences::{MemoryPreferenceStore, PreferenceStore, TORRENT_VIEW_KEY, ViewPreferences};
pub use provider::{FetchKind, FetchTicket, ListBackend, RemoteListProvider};
pub use query::{Item, Page, Query};
pub use scheduler::{Scheduler, Task};
pub use selection::{
    ChangeOrigin, SelectionEngine, SelectionPhase, SelectionState, SelectionSummary,
};
pub use viewport::{
    ScrollDemand, ScrollOutcome, ScrollSample, ViewportWindower, VisibleWindow, row_keys,
};
