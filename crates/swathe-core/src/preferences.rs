//! View preferences behind an injected store.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use swathe_api_models::SortSpec;

/// Storage key for the torrent list view.
pub const TORRENT_VIEW_KEY: &str = "swathe.torrents.view";

/// Per-view preferences restored on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ViewPreferences {
    /// Last sort chosen by the user.
    pub sort: SortSpec,
    /// Page size override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

/// Preference persistence.
pub trait PreferenceStore {
    /// Load preferences stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn load(&self, key: &str) -> anyhow::Result<Option<ViewPreferences>>;

    /// Persist `prefs` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be written.
    fn save(&self, key: &str, prefs: &ViewPreferences) -> anyhow::Result<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RefCell<HashMap<String, ViewPreferences>>,
}

impl MemoryPreferenceStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<ViewPreferences>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, prefs: &ViewPreferences) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), prefs.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_preferences_round_trip_by_key() -> anyhow::Result<()> {
        let store = MemoryPreferenceStore::new();
        assert!(store.load(TORRENT_VIEW_KEY)?.is_none());
        let prefs = ViewPreferences {
            sort: SortSpec::desc("added_at"),
            page_size: Some(250),
        };
        store.save(TORRENT_VIEW_KEY, &prefs)?;
        assert_eq!(store.load(TORRENT_VIEW_KEY)?, Some(prefs));
        assert!(store.load("other")?.is_none());
        Ok(())
    }

    #[test]
    fn page_size_is_omitted_when_unset() {
        let encoded = serde_json::to_value(ViewPreferences::default()).expect("serialize");
        assert_eq!(
            encoded,
            serde_json::json!({ "sort": { "field": "name", "direction": "asc" } })
        );
    }
}
