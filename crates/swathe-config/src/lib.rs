#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Typed configuration for the Swathe list engine.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (tuning defaults), `validate.rs`
//! (field parsers and cross-field checks), `loader.rs` (JSON documents, files, and patches).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_patch, load_from_path, parse_document};
pub use model::{
    CacheConfig, OverscanConfig, OverscanTier, PaginationConfig, RefetchConfig, ScrollConfig,
    SearchConfig, ViewConfig,
};
