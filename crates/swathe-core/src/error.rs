//! Error types for list fetching, cache merging, and bulk dispatch.

use std::error::Error;

use swathe_api_models::ItemFailure;
use thiserror::Error;

/// Failure reported by a list or mutation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("network request failed")]
    Network {
        /// Underlying transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The server could not resolve a select-all descriptor against its current data.
    #[error("server reported an addressing conflict")]
    Conflict {
        /// Server-provided detail.
        detail: String,
    },
    /// The server rejected the request.
    #[error("server rejected the request with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided detail.
        detail: String,
    },
    /// The response body could not be decoded.
    #[error("response body could not be decoded")]
    Decode {
        /// Underlying decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl BackendError {
    /// Wrap any transport error as a network failure.
    pub fn network(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Network {
            source: source.into(),
        }
    }
}

/// Violations of the cache's prefix invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// A page would leave a gap between the cached prefix and its first row.
    #[error("page at offset {offset} would leave a gap after {cached} cached rows")]
    Gap {
        /// Rows already cached for the query.
        cached: usize,
        /// Offset of the rejected page.
        offset: usize,
    },
    /// A replacement page did not start at the beginning of the result set.
    #[error("replacement page must start at offset 0, got {offset}")]
    ReplaceOffset {
        /// Offset of the rejected page.
        offset: usize,
    },
}

/// Errors surfaced by list fetching.
#[derive(Debug, Error)]
pub enum ListError {
    /// The backend failed; the caller retries on its next request.
    #[error("list fetch failed")]
    Backend {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
    /// The returned page could not be merged.
    #[error("list page could not be merged")]
    Cache {
        /// Underlying prefix violation.
        #[source]
        source: CacheError,
    },
}

/// Errors surfaced by bulk action dispatch. None of these are swallowed.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Nothing is selected, so there is nothing to address.
    #[error("no items are selected")]
    EmptySelection,
    /// The action parameters failed validation at the dispatch boundary.
    #[error("invalid parameters for '{action}': {reason}")]
    InvalidAction {
        /// Verb that failed validation.
        action: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Some explicitly addressed items failed; successes are kept.
    #[error("{} of {} items failed", .failed.len(), .succeeded + .failed.len() as u64)]
    PartialFailure {
        /// Items the action applied to.
        succeeded: u64,
        /// Items that failed, with reasons.
        failed: Vec<ItemFailure>,
    },
    /// The server could not resolve the select-all descriptor; optimistic changes were undone.
    #[error("selection changed, please retry")]
    AddressingConflict {
        /// Server-provided detail.
        detail: String,
    },
    /// The request failed in transit; optimistic changes were undone and nothing is retried.
    #[error("bulk action could not reach the server")]
    Network {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
    /// The server refused the action; optimistic changes were undone.
    #[error("bulk action was rejected")]
    Rejected {
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
}

impl DispatchError {
    /// Whether the cache was restored to its pre-dispatch contents.
    #[must_use]
    pub const fn rolled_back(&self) -> bool {
        matches!(
            self,
            Self::AddressingConflict { .. } | Self::Network { .. } | Self::Rejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swathe_api_models::ItemKey;

    #[test]
    fn partial_failure_message_counts_items() {
        let err = DispatchError::PartialFailure {
            succeeded: 3,
            failed: vec![ItemFailure {
                hash: ItemKey::from("aa"),
                message: "locked".into(),
            }],
        };
        assert_eq!(err.to_string(), "1 of 4 items failed");
        assert!(!err.rolled_back());
    }

    #[test]
    fn conflict_is_user_facing() {
        let err = DispatchError::AddressingConflict {
            detail: "total changed".into(),
        };
        assert_eq!(err.to_string(), "selection changed, please retry");
        assert!(err.rolled_back());
    }
}
