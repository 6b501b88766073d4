//! Paginated list fetching with per-query request tokens.
//!
//! # Design
//! - Fetching is split into a synchronous `issue`, an awaited backend call, and a synchronous
//!   `accept`, so the caller can interleave other events while a request is in flight.
//! - Every issued request carries a token that increases per query. Only the latest token for a
//!   query may be applied; anything older is stale and dropped on arrival.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{BackendError, ListError};
use crate::query::{Page, Query};

/// Source of list pages.
#[async_trait(?Send)]
pub trait ListBackend {
    /// Fetch `limit` records of `query` starting at `offset`. Never mutates local state.
    async fn fetch_page(
        &self,
        query: &Query,
        offset: usize,
        limit: usize,
    ) -> Result<Page, BackendError>;
}

/// Why a page was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First page after a query change.
    Initial,
    /// The page after the cached prefix.
    NextPage,
    /// Re-fetch of the already-loaded prefix.
    Refresh,
}

impl FetchKind {
    /// Metrics label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::NextPage => "next_page",
            Self::Refresh => "refresh",
        }
    }
}

/// An issued request; hand it back to [`RemoteListProvider::accept`] with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Query the request was issued for.
    pub query: Query,
    /// Per-query request token.
    pub token: u64,
    /// Why the page was requested.
    pub kind: FetchKind,
    /// First record requested.
    pub offset: usize,
    /// Records requested.
    pub limit: usize,
    /// When the request was issued.
    pub issued_at: Instant,
}

/// Tracks request tokens and in-flight requests per query.
#[derive(Debug, Default)]
pub struct RemoteListProvider {
    tokens: HashMap<Query, u64>,
    in_flight: HashMap<Query, u64>,
}

impl RemoteListProvider {
    /// Provider with no outstanding requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new request for `query`, superseding any earlier one for the same query.
    pub fn issue(
        &mut self,
        query: &Query,
        kind: FetchKind,
        offset: usize,
        limit: usize,
        now: Instant,
    ) -> FetchTicket {
        let token = self.tokens.entry(query.clone()).or_insert(0);
        *token += 1;
        let token = *token;
        self.in_flight.insert(query.clone(), token);
        debug!(token, kind = kind.as_str(), offset, limit, "issued list request");
        FetchTicket {
            query: query.clone(),
            token,
            kind,
            offset,
            limit,
            issued_at: now,
        }
    }

    /// Latest token issued for `query`.
    #[must_use]
    pub fn latest_token(&self, query: &Query) -> Option<u64> {
        self.tokens.get(query).copied()
    }

    /// Whether `ticket` is still the latest request for its query.
    #[must_use]
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.latest_token(&ticket.query) == Some(ticket.token)
    }

    /// Whether a request for `query` is awaiting its response.
    #[must_use]
    pub fn is_in_flight(&self, query: &Query) -> bool {
        self.in_flight.contains_key(query)
    }

    /// Settle `ticket`; returns `false` when it is stale and its response must be dropped.
    pub fn accept(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(token = ticket.token, "dropping stale list response");
            return false;
        }
        self.in_flight.remove(&ticket.query);
        true
    }

    /// Call the backend for `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Backend`] when the backend fails.
    #[instrument(skip_all, fields(token = ticket.token, kind = ticket.kind.as_str()))]
    pub async fn fetch<B>(backend: &B, ticket: &FetchTicket) -> Result<Page, ListError>
    where
        B: ListBackend + ?Sized,
    {
        let mut page = backend
            .fetch_page(&ticket.query, ticket.offset, ticket.limit)
            .await
            .map_err(|source| ListError::Backend { source })?;
        page.offset = ticket.offset;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use swathe_api_models::ItemRecord;

    struct Numbered {
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl ListBackend for Numbered {
        async fn fetch_page(
            &self,
            _query: &Query,
            offset: usize,
            limit: usize,
        ) -> Result<Page, BackendError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Page {
                items: (offset..offset + limit)
                    .map(|i| ItemRecord::bare(format!("k{i}")))
                    .collect(),
                offset: 0,
                total_count: 1_000,
            })
        }
    }

    #[test]
    fn tokens_increase_per_query() {
        let now = Instant::now();
        let mut provider = RemoteListProvider::new();
        let a = Query::default();
        let b = Query::default().with_search("b");
        let first = provider.issue(&a, FetchKind::Initial, 0, 10, now);
        let other = provider.issue(&b, FetchKind::Initial, 0, 10, now);
        let second = provider.issue(&a, FetchKind::Refresh, 0, 10, now);
        assert_eq!((first.token, other.token, second.token), (1, 1, 2));
        assert!(!provider.is_current(&first));
        assert!(provider.is_current(&other));
    }

    #[test]
    fn stale_tickets_are_refused_and_leave_request_in_flight() {
        let now = Instant::now();
        let mut provider = RemoteListProvider::new();
        let query = Query::default();
        let old = provider.issue(&query, FetchKind::Initial, 0, 10, now);
        let new = provider.issue(&query, FetchKind::Refresh, 0, 10, now);
        assert!(!provider.accept(&old));
        assert!(provider.is_in_flight(&query));
        assert!(provider.accept(&new));
        assert!(!provider.is_in_flight(&query));
    }

    #[tokio::test]
    async fn fetch_stamps_the_requested_offset() {
        let backend = Numbered {
            calls: Cell::new(0),
        };
        let mut provider = RemoteListProvider::new();
        let ticket = provider.issue(&Query::default(), FetchKind::NextPage, 20, 5, Instant::now());
        let page = RemoteListProvider::fetch(&backend, &ticket)
            .await
            .expect("fetch");
        assert_eq!(page.offset, 20);
        assert_eq!(page.items.len(), 5);
        assert_eq!(backend.calls.get(), 1);
    }
}
