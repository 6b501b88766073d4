//! Query and page values exchanged between the provider and the cache.

use std::rc::Rc;

use swathe_api_models::{FilterSet, ItemRecord, ListResponse, SortSpec};

/// Shared handle to a cached record; pages are merged without cloning field maps.
pub type Item = Rc<ItemRecord>;

/// Immutable `(search, filters, sort)` tuple identifying one server-side result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Query {
    /// Free-text search, trimmed.
    pub search: String,
    /// Named filters.
    pub filters: FilterSet,
    /// Sort key and direction.
    pub sort: SortSpec,
}

impl Query {
    /// Query with the given search text; surrounding whitespace never changes identity.
    #[must_use]
    pub fn with_search(mut self, search: &str) -> Self {
        search.trim().clone_into(&mut self.search);
        self
    }

    /// Query with `name` set to `value`, or removed when `value` is `None`.
    #[must_use]
    pub fn with_filter(mut self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => {
                self.filters.insert(name.to_string(), value.to_string());
            }
            None => {
                self.filters.remove(name);
            }
        }
        self
    }

    /// Query with every filter replaced.
    #[must_use]
    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    /// Query with a different sort.
    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

/// One page of server-ordered records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in server order.
    pub items: Vec<ItemRecord>,
    /// Position of the first record in the full result set.
    pub offset: usize,
    /// Total records matching the producing query.
    pub total_count: u64,
}

impl Page {
    /// Attach the request offset to a decoded list response.
    #[must_use]
    pub fn from_response(response: ListResponse, offset: usize) -> Self {
        Self {
            items: response.items,
            offset,
            total_count: response.total_count,
        }
    }

    /// Offset just past the last record of this page.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swathe_api_models::SortDirection;

    #[test]
    fn whitespace_does_not_change_identity() {
        let a = Query::default().with_search("  ubuntu ");
        let b = Query::default().with_search("ubuntu");
        assert_eq!(a, b);
    }

    #[test]
    fn filter_order_does_not_change_identity() {
        let a = Query::default()
            .with_filter("state", Some("seeding"))
            .with_filter("category", Some("tv"));
        let b = Query::default()
            .with_filter("category", Some("tv"))
            .with_filter("state", Some("seeding"));
        assert_eq!(a, b);
        assert_ne!(a, a.clone().with_filter("state", None));
    }

    #[test]
    fn sort_direction_is_part_of_identity() {
        let asc = Query::default();
        let desc = Query::default().with_sort(SortSpec {
            field: "name".into(),
            direction: SortDirection::Desc,
        });
        assert_ne!(asc, desc);
    }
}
