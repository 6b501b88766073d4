//! JSON document loading and patching for [`ViewConfig`].
//!
//! # Design
//! - Every document is applied as a patch over the defaults, so a partial file is valid.
//! - Unknown sections and fields are rejected rather than ignored.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::model::ViewConfig;
use crate::validate::{parse_tiers, required_f64, required_u64, required_usize, validate};

/// Load a configuration file from disk, falling back to defaults for absent fields.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, [`ConfigError::Parse`] when it is
/// not JSON, and validation errors from [`apply_patch`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<ViewConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { source })?;
    parse_document(&document)
}

/// Build a configuration from a JSON document layered over the defaults.
///
/// # Errors
///
/// Returns the first validation failure encountered.
pub fn parse_document(document: &Value) -> ConfigResult<ViewConfig> {
    let mut config = ViewConfig::default();
    apply_patch(&mut config, document)?;
    Ok(config)
}

/// Apply a JSON patch to an existing configuration; returns whether anything changed.
///
/// The configuration is left untouched when the patch fails validation.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownField`] for unrecognised sections or fields and
/// [`ConfigError::InvalidField`] for ill-typed or inconsistent values.
pub fn apply_patch(config: &mut ViewConfig, patch: &Value) -> ConfigResult<bool> {
    let sections = patch
        .as_object()
        .ok_or_else(|| ConfigError::invalid("root", "document", "must be an object"))?;

    let mut working = config.clone();
    let mut changed = false;
    for (section, body) in sections {
        let fields = section_fields(section, body)?;
        for (field, value) in fields {
            changed |= apply_field(&mut working, section, field, value)?;
        }
    }
    validate(&working)?;

    if changed {
        debug!("view configuration updated");
        *config = working;
    }
    Ok(changed)
}

fn section_fields<'a>(section: &str, body: &'a Value) -> ConfigResult<&'a Map<String, Value>> {
    body.as_object()
        .ok_or_else(|| ConfigError::invalid(section, "section", "must be an object"))
}

fn apply_field(
    working: &mut ViewConfig,
    section: &str,
    field: &str,
    value: &Value,
) -> ConfigResult<bool> {
    match (section, field) {
        ("pagination", "page_size") => Ok(assign_if_changed(
            &mut working.pagination.page_size,
            required_usize(value, section, field)?,
        )),
        ("pagination", "reveal_batch") => Ok(assign_if_changed(
            &mut working.pagination.reveal_batch,
            required_usize(value, section, field)?,
        )),
        ("pagination", "scroll_margin") => Ok(assign_if_changed(
            &mut working.pagination.scroll_margin,
            required_usize(value, section, field)?,
        )),
        ("search", "debounce_ms") => Ok(assign_if_changed(
            &mut working.search.debounce_ms,
            required_u64(value, section, field)?,
        )),
        ("overscan", "default_rows") => Ok(assign_if_changed(
            &mut working.overscan.default_rows,
            required_usize(value, section, field)?,
        )),
        ("overscan", "tiers") => Ok(assign_if_changed(
            &mut working.overscan.tiers,
            parse_tiers(value)?,
        )),
        ("scroll", "settle_velocity") => {
            let velocity = required_f64(value, section, field)?;
            let changed = (working.scroll.settle_velocity - velocity).abs() > f64::EPSILON;
            working.scroll.settle_velocity = velocity;
            Ok(changed)
        }
        ("scroll", "min_check_interval_ms") => Ok(assign_if_changed(
            &mut working.scroll.min_check_interval_ms,
            required_u64(value, section, field)?,
        )),
        ("refetch", "delay_ms") => Ok(assign_if_changed(
            &mut working.refetch.delay_ms,
            required_u64(value, section, field)?,
        )),
        ("refetch", "disk_delay_ms") => Ok(assign_if_changed(
            &mut working.refetch.disk_delay_ms,
            required_u64(value, section, field)?,
        )),
        ("cache", "max_queries") => Ok(assign_if_changed(
            &mut working.cache.max_queries,
            required_usize(value, section, field)?,
        )),
        ("pagination" | "search" | "overscan" | "scroll" | "refetch" | "cache", other) => {
            Err(ConfigError::unknown(section, other))
        }
        (other, _) => Err(ConfigError::unknown("root", other)),
    }
}

fn assign_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
