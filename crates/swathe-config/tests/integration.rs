use std::io::Write;

use anyhow::Result;
use swathe_config::{ConfigError, ViewConfig, load_from_path};

#[test]
fn loads_partial_document_from_disk() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "pagination": {{ "page_size": 500, "reveal_batch": 200 }}, "refetch": {{ "disk_delay_ms": 5000 }} }}"#
    )?;

    let config = load_from_path(file.path())?;
    assert_eq!(config.pagination.page_size, 500);
    assert_eq!(config.pagination.reveal_batch, 200);
    assert_eq!(config.refetch.disk_delay_ms, 5_000);
    assert_eq!(config.search, ViewConfig::default().search);
    Ok(())
}

#[test]
fn missing_file_reports_io_error() {
    let err = load_from_path("/definitely/missing/swathe.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn malformed_json_reports_parse_error() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, "{{ not json")?;
    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}
