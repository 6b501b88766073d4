#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
//! Shared wire DTOs for the torrent list and bulk-mutation endpoints.
//!
//! These types are re-used by the engine, the HTTP client, and the in-memory test collection so
//! the addressing contract stays a single source of truth.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable unique key of a list item (the torrent info-hash).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Wrap a raw key.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ItemKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque list record: a stable key plus fields carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Stable unique key.
    pub hash: ItemKey,
    #[serde(flatten)]
    /// Every other field reported by the server.
    pub fields: Map<String, Value>,
}

impl ItemRecord {
    /// Build a record with no extra fields.
    #[must_use]
    pub fn bare(hash: impl Into<ItemKey>) -> Self {
        Self {
            hash: hash.into(),
            fields: Map::new(),
        }
    }

    /// Attach a field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Read a string field when present.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Named filters applied to the list (e.g. `state=downloading`, `category=tv`).
///
/// Ordered so equality and hashing of the enclosing query are deterministic.
pub type FilterSet = BTreeMap<String, String>;

/// Sort direction for the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Render the direction as its query-string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Sort key and direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field name understood by the server.
    pub field: String,
    /// Direction applied to the field.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending sort on `field`.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending sort on `field`.
    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::asc("name")
    }
}

/// Paginated list response for the torrent collection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Page of records in server order.
    pub items: Vec<ItemRecord>,
    /// Total records matching the query, across all pages.
    pub total_count: u64,
}

/// Bulk action verb with only the parameters that verb requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BulkAction {
    /// Pause the torrents without removing any data.
    Pause,
    /// Resume previously paused torrents.
    Resume,
    /// Schedule a full recheck of the torrent contents.
    Recheck,
    /// Force a reannounce to trackers.
    Reannounce,
    /// Remove the torrents and optionally delete their data.
    Remove {
        #[serde(default)]
        /// Flag indicating whether to delete downloaded files as well.
        delete_data: bool,
    },
    /// Relocate torrent storage to a new download directory.
    Move {
        /// Destination path for the payload.
        download_dir: String,
    },
    /// Assign a category.
    Category {
        /// Category name; empty clears the category.
        category: String,
    },
    /// Add tags.
    Tags {
        /// Tags to add.
        tags: Vec<String>,
    },
    /// Adjust per-torrent bandwidth limits.
    Rate {
        #[serde(default)]
        /// Download cap in bytes per second.
        download_bps: Option<u64>,
        #[serde(default)]
        /// Upload cap in bytes per second.
        upload_bps: Option<u64>,
    },
    /// Toggle sequential download mode.
    Sequential {
        /// Enables sequential reading when `true`.
        enable: bool,
    },
}

impl BulkAction {
    /// Wire verb for logs and metrics labels.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Recheck => "recheck",
            Self::Reannounce => "reannounce",
            Self::Remove { .. } => "remove",
            Self::Move { .. } => "move",
            Self::Category { .. } => "category",
            Self::Tags { .. } => "tags",
            Self::Rate { .. } => "rate",
            Self::Sequential { .. } => "sequential",
        }
    }

    /// Whether affected items leave the collection on success.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    /// Whether the server performs disk I/O for this action.
    #[must_use]
    pub const fn touches_disk(&self) -> bool {
        matches!(
            self,
            Self::Remove { delete_data: true } | Self::Move { .. } | Self::Recheck
        )
    }
}

/// Self-contained addressing payload for the bulk-mutation endpoint.
///
/// `select_all = false` addresses exactly `hashes`. `select_all = true` addresses every item
/// matching `(filters, search)` except `exclude_hashes`; `hashes` is then empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    #[serde(flatten)]
    /// Verb and its parameters.
    pub action: BulkAction,
    #[serde(default)]
    /// Explicitly addressed keys.
    pub hashes: Vec<ItemKey>,
    /// Whether the descriptor addresses the full matching set.
    pub select_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Filters of the matching set; present only with `select_all`.
    pub filters: Option<FilterSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Search text of the matching set; present only with `select_all`.
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Keys carved out of the matching set; present only with `select_all`.
    pub exclude_hashes: Option<Vec<ItemKey>>,
}

/// Borrowed view of how a descriptor addresses its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing<'a> {
    /// Exactly these keys.
    Explicit(&'a [ItemKey]),
    /// Everything matching the filters and search, minus the exclusions.
    AllMatching {
        /// Filters of the matching set.
        filters: Option<&'a FilterSet>,
        /// Search text of the matching set.
        search: Option<&'a str>,
        /// Keys carved out of the set.
        exclusions: &'a [ItemKey],
    },
}

impl ActionDescriptor {
    /// Descriptor addressing exactly `hashes`.
    #[must_use]
    pub const fn explicit(action: BulkAction, hashes: Vec<ItemKey>) -> Self {
        Self {
            action,
            hashes,
            select_all: false,
            filters: None,
            search: None,
            exclude_hashes: None,
        }
    }

    /// Descriptor addressing every match of `(filters, search)` except `exclusions`.
    #[must_use]
    pub fn all_matching(
        action: BulkAction,
        filters: FilterSet,
        search: String,
        exclusions: Vec<ItemKey>,
    ) -> Self {
        Self {
            action,
            hashes: Vec::new(),
            select_all: true,
            filters: Some(filters),
            search: Some(search),
            exclude_hashes: Some(exclusions),
        }
    }

    /// Interpret the addressing fields.
    #[must_use]
    pub fn addressing(&self) -> Addressing<'_> {
        if self.select_all {
            Addressing::AllMatching {
                filters: self.filters.as_ref(),
                search: self.search.as_deref(),
                exclusions: self.exclude_hashes.as_deref().unwrap_or_default(),
            }
        } else {
            Addressing::Explicit(&self.hashes)
        }
    }
}

/// Per-item failure reported by the mutation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Key that could not be mutated.
    pub hash: ItemKey,
    /// Server-provided reason.
    pub message: String,
}

/// Aggregate result of a bulk mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport {
    /// Number of items the action applied to.
    pub succeeded: u64,
    #[serde(default)]
    /// Items that failed, when the server reports per-item results.
    pub failed: Vec<ItemFailure>,
}

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}
