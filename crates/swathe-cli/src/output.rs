//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use serde_json::json;
use swathe_api_models::{ItemKey, ListResponse};
use swathe_core::{ActionReport, SelectionSummary};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const HASH_WIDTH: usize = 12;

pub(crate) fn render_list(
    list: &ListResponse,
    has_more: bool,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(list).map_err(CliError::failure)?)?,
        OutputFormat::Table => {
            println!("{:<12} {:<12} NAME", "HASH", "STATE");
            for item in &list.items {
                println!(
                    "{:<12} {:<12} {}",
                    short_hash(&item.hash),
                    item.text("state").unwrap_or("-"),
                    item.text("name").unwrap_or("<unnamed>")
                );
            }
            println!("{}", list_footer(list.items.len(), list.total_count, has_more));
        }
    }
    Ok(())
}

pub(crate) fn render_action(
    report: &ActionReport,
    summary: SelectionSummary,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "action": report.verb,
            "succeeded": report.succeeded,
            "selection": summary.label(),
        }))?,
        OutputFormat::Table => {
            println!(
                "{}: {} updated ({})",
                report.verb,
                plural(report.succeeded, "torrent"),
                summary.label()
            );
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn short_hash(hash: &ItemKey) -> &str {
    let raw = hash.as_str();
    raw.char_indices()
        .nth(HASH_WIDTH)
        .map_or(raw, |(index, _)| &raw[..index])
}

pub(crate) fn list_footer(shown: usize, total: u64, has_more: bool) -> String {
    let mut footer = format!("{shown} of {}", plural(total, "torrent"));
    if has_more {
        footer.push_str(" (raise --pages to see more)");
    }
    footer
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
