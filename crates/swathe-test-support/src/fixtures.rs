//! Record builders for list scenarios.

use swathe_api_models::{ItemKey, ItemRecord};

const STATES: [&str; 3] = ["downloading", "seeding", "paused"];

/// Info-hash style key for the `index`th fixture torrent.
#[must_use]
pub fn hash(index: usize) -> ItemKey {
    ItemKey::new(format!("{index:040x}"))
}

/// Deterministic torrent record: state cycles through downloading, seeding, paused.
#[must_use]
pub fn torrent(index: usize) -> ItemRecord {
    ItemRecord::bare(hash(index))
        .with_field("name", format!("torrent-{index:05}"))
        .with_field("state", STATES[index % STATES.len()])
        .with_field("sizeBytes", u64::try_from(index).unwrap_or(u64::MAX) * 1_024)
}

/// `count` fixture torrents in index order.
#[must_use]
pub fn torrents(count: usize) -> Vec<ItemRecord> {
    (0..count).map(torrent).collect()
}

/// Keys of the fixture torrents at `indices`.
#[must_use]
pub fn hashes(indices: &[usize]) -> Vec<ItemKey> {
    indices.iter().copied().map(hash).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_deterministic() {
        let record = torrent(4);
        assert_eq!(record.hash, hash(4));
        assert_eq!(record.hash.as_str().len(), 40);
        assert_eq!(record.text("name"), Some("torrent-00004"));
        assert_eq!(record.text("state"), Some("seeding"));
        assert_eq!(torrents(3).len(), 3);
    }
}
