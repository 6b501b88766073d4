//! Validation helpers and parsing utilities for configuration documents.

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{OverscanTier, ViewConfig};

pub(crate) fn required_usize(value: &Value, section: &str, field: &str) -> ConfigResult<usize> {
    let raw = value
        .as_u64()
        .ok_or_else(|| ConfigError::invalid(section, field, "must be a non-negative integer"))?;
    usize::try_from(raw)
        .map_err(|_| ConfigError::invalid(section, field, "exceeds the platform word size"))
}

pub(crate) fn required_u64(value: &Value, section: &str, field: &str) -> ConfigResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| ConfigError::invalid(section, field, "must be a non-negative integer"))
}

pub(crate) fn required_f64(value: &Value, section: &str, field: &str) -> ConfigResult<f64> {
    let number = value
        .as_f64()
        .ok_or_else(|| ConfigError::invalid(section, field, "must be a number"))?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(ConfigError::invalid(section, field, "must be finite"))
    }
}

pub(crate) fn parse_tiers(value: &Value) -> ConfigResult<Vec<OverscanTier>> {
    let entries = value
        .as_array()
        .ok_or_else(|| ConfigError::invalid("overscan", "tiers", "must be an array"))?;
    entries
        .iter()
        .map(|entry| {
            let map = entry.as_object().ok_or_else(|| {
                ConfigError::invalid("overscan", "tiers", "entries must be objects")
            })?;
            let min_rows = map
                .get("min_rows")
                .ok_or_else(|| ConfigError::invalid("overscan", "tiers.min_rows", "is required"))
                .and_then(|v| required_usize(v, "overscan", "tiers.min_rows"))?;
            let rows = map
                .get("rows")
                .ok_or_else(|| ConfigError::invalid("overscan", "tiers.rows", "is required"))
                .and_then(|v| required_usize(v, "overscan", "tiers.rows"))?;
            Ok(OverscanTier { min_rows, rows })
        })
        .collect()
}

/// Cross-field validation run after every load or patch.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that violates its constraint.
pub fn validate(config: &ViewConfig) -> ConfigResult<()> {
    let pagination = &config.pagination;
    if pagination.page_size == 0 {
        return Err(ConfigError::invalid(
            "pagination",
            "page_size",
            "must be positive",
        ));
    }
    if pagination.reveal_batch == 0 {
        return Err(ConfigError::invalid(
            "pagination",
            "reveal_batch",
            "must be positive",
        ));
    }
    if pagination.scroll_margin >= pagination.reveal_batch {
        return Err(ConfigError::invalid(
            "pagination",
            "scroll_margin",
            "must be smaller than reveal_batch",
        ));
    }
    if config
        .overscan
        .tiers
        .windows(2)
        .any(|pair| pair[0].min_rows >= pair[1].min_rows)
    {
        return Err(ConfigError::invalid(
            "overscan",
            "tiers",
            "must be sorted by strictly ascending min_rows",
        ));
    }
    if config.scroll.settle_velocity <= 0.0 {
        return Err(ConfigError::invalid(
            "scroll",
            "settle_velocity",
            "must be positive",
        ));
    }
    if config.refetch.disk_delay_ms < config.refetch.delay_ms {
        return Err(ConfigError::invalid(
            "refetch",
            "disk_delay_ms",
            "must not be shorter than delay_ms",
        ));
    }
    if config.cache.max_queries == 0 {
        return Err(ConfigError::invalid(
            "cache",
            "max_queries",
            "must be positive",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        validate(&ViewConfig::default()).expect("defaults should validate");
    }

    #[test]
    fn margin_must_fit_inside_batch() {
        let mut config = ViewConfig::default();
        config.pagination.scroll_margin = config.pagination.reveal_batch;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "scroll_margin"));
    }

    #[test]
    fn unsorted_tiers_are_rejected() {
        let mut config = ViewConfig::default();
        config.overscan.tiers.reverse();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn tier_parser_requires_both_fields() {
        assert!(parse_tiers(&json!([{ "min_rows": 10 }])).is_err());
        let parsed = parse_tiers(&json!([{ "min_rows": 10, "rows": 4 }])).expect("valid tiers");
        assert_eq!(parsed, vec![OverscanTier { min_rows: 10, rows: 4 }]);
    }

    #[test]
    fn negative_numbers_are_rejected() {
        assert!(required_usize(&json!(-1), "pagination", "page_size").is_err());
        assert!(required_f64(&json!("fast"), "scroll", "settle_velocity").is_err());
    }
}
