//! Argument parsing, logging setup, and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use swathe_api_models::{FilterSet, SortSpec};
use swathe_core::Query;
use swathe_telemetry::{LogFormat, LoggingConfig, init_logging};
use url::Url;

use crate::client::{AppContext, CliError, CliResult};
use crate::commands::{act::handle_act, list::handle_list};

const DEFAULT_API_URL: &str = "http://127.0.0.1:7070";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments and executes the requested command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    install_logging(&cli);

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn install_logging(cli: &Cli) {
    let config = LoggingConfig {
        level: &cli.log_level,
        format: LogFormat::from_name(&cli.log_format),
        build_sha: option_env!("SWATHE_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: {err:#}");
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = AppContext::new(
        &cli.api_url,
        cli.api_key.as_deref(),
        Duration::from_secs(cli.timeout),
        cli.config.as_deref(),
        cli.metrics,
    )?;

    match cli.command {
        Command::List(args) => handle_list(&ctx, &args).await?,
        Command::Act(args) => handle_act(&ctx, &args).await?,
    }

    if let Some(metrics) = &ctx.metrics {
        let rendered = metrics.render().map_err(CliError::failure)?;
        eprint!("{rendered}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "swathe", about = "Browse and bulk-edit a remote torrent collection")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "SWATHE_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(long, global = true, env = "SWATHE_API_KEY")]
    pub(crate) api_key: Option<String>,
    /// JSON view configuration layered over the defaults.
    #[arg(long, global = true, env = "SWATHE_CONFIG")]
    pub(crate) config: Option<PathBuf>,
    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub(crate) timeout: u64,
    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "SWATHE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    /// Log output format: compact, pretty, or json.
    #[arg(long, global = true, default_value = "compact")]
    pub(crate) log_format: String,
    /// Print Prometheus metrics to stderr after the command finishes.
    #[arg(long, global = true)]
    pub(crate) metrics: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List torrents matching a query.
    #[command(alias = "ls")]
    List(ListArgs),
    /// Apply a bulk action to explicit hashes or to every matching torrent.
    Act(ActArgs),
}

/// Search, filter, and sort flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct QueryArgs {
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Filter as `name=value`; repeatable.
    #[arg(long = "filter", value_parser = parse_filter)]
    pub(crate) filters: Vec<(String, String)>,
    /// Sort as `field` or `field:desc`.
    #[arg(long, value_parser = parse_sort)]
    pub(crate) sort: Option<SortSpec>,
}

impl QueryArgs {
    pub(crate) fn to_query(&self) -> Query {
        let filters: FilterSet = self.filters.iter().cloned().collect();
        Query::default()
            .with_search(self.search.as_deref().unwrap_or_default())
            .with_filters(filters)
            .with_sort(self.sort.clone().unwrap_or_default())
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub(crate) query: QueryArgs,
    /// Number of pages to fetch.
    #[arg(long, default_value_t = 1)]
    pub(crate) pages: usize,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) output: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ActArgs {
    #[arg(value_enum)]
    pub(crate) verb: Verb,
    /// Torrent hash to act on; repeatable.
    #[arg(long = "hash", conflicts_with = "all")]
    pub(crate) hashes: Vec<String>,
    /// Act on every torrent matching the query.
    #[arg(long)]
    pub(crate) all: bool,
    /// Hash to leave out of `--all`; repeatable.
    #[arg(long = "exclude", requires = "all")]
    pub(crate) exclude: Vec<String>,
    #[command(flatten)]
    pub(crate) query: QueryArgs,
    /// Delete downloaded data when removing.
    #[arg(long)]
    pub(crate) delete_data: bool,
    /// Destination for `move`.
    #[arg(long)]
    pub(crate) download_dir: Option<String>,
    /// Category for `category`; empty clears it.
    #[arg(long)]
    pub(crate) category: Option<String>,
    /// Tag for `tags`; repeatable.
    #[arg(long = "tag")]
    pub(crate) tags: Vec<String>,
    #[arg(long)]
    pub(crate) download_bps: Option<u64>,
    #[arg(long)]
    pub(crate) upload_bps: Option<u64>,
    /// Sequential mode for `sequential`.
    #[arg(long)]
    pub(crate) enable: Option<bool>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) output: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Verb {
    Pause,
    Resume,
    Recheck,
    Reannounce,
    Remove,
    Move,
    Category,
    Tags,
    Rate,
    Sequential,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_url(input: &str) -> Result<Url, String> {
    Url::parse(input).map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn parse_filter(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("filter '{input}' must look like name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("filter '{input}' is missing a name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_sort(input: &str) -> Result<SortSpec, String> {
    let (field, direction) = input.split_once(':').unwrap_or((input, "asc"));
    let field = field.trim();
    if field.is_empty() {
        return Err("sort field must not be empty".to_string());
    }
    match direction.trim() {
        "asc" => Ok(SortSpec::asc(field)),
        "desc" => Ok(SortSpec::desc(field)),
        other => Err(format!("unknown sort direction '{other}' (use asc or desc)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swathe_api_models::SortDirection;

    #[test]
    fn parse_url_rejects_invalid_input() {
        assert!(parse_url("not a url").is_err());
        assert!(parse_url("http://localhost:7070").is_ok());
    }

    #[test]
    fn parse_filter_splits_on_first_equals() {
        assert_eq!(
            parse_filter("tracker=udp://a=b").expect("valid filter"),
            ("tracker".to_string(), "udp://a=b".to_string())
        );
        assert!(parse_filter("state").is_err());
        assert!(parse_filter("=seeding").is_err());
    }

    #[test]
    fn parse_sort_accepts_direction_suffix() {
        assert_eq!(parse_sort("name").expect("valid"), SortSpec::asc("name"));
        let sort = parse_sort("added_at:desc").expect("valid");
        assert_eq!(sort.field, "added_at");
        assert_eq!(sort.direction, SortDirection::Desc);
        assert!(parse_sort("size:sideways").is_err());
        assert!(parse_sort(":desc").is_err());
    }

    #[test]
    fn query_args_build_a_trimmed_query() {
        let args = QueryArgs {
            search: Some("  ubuntu ".to_string()),
            filters: vec![("state".to_string(), "seeding".to_string())],
            sort: None,
        };
        let query = args.to_query();
        assert_eq!(query.search, "ubuntu");
        assert_eq!(query.filters.get("state").map(String::as_str), Some("seeding"));
        assert_eq!(query.sort, SortSpec::default());
    }

    #[test]
    fn act_flags_parse_with_all_and_exclusions() {
        let cli = Cli::try_parse_from([
            "swathe",
            "act",
            "remove",
            "--all",
            "--exclude",
            "aa",
            "--filter",
            "state=paused",
            "--delete-data",
        ])
        .expect("valid arguments");
        let Command::Act(args) = cli.command else {
            panic!("expected act");
        };
        assert_eq!(args.verb, Verb::Remove);
        assert!(args.all && args.delete_data);
        assert_eq!(args.exclude, vec!["aa".to_string()]);
    }

    #[test]
    fn exclusions_require_all_and_hashes_conflict_with_it() {
        assert!(Cli::try_parse_from(["swathe", "act", "pause", "--exclude", "aa"]).is_err());
        assert!(
            Cli::try_parse_from(["swathe", "act", "pause", "--all", "--hash", "aa"]).is_err()
        );
    }

    #[test]
    fn list_defaults_to_one_table_page() {
        let cli = Cli::try_parse_from(["swathe", "ls"]).expect("valid arguments");
        assert_eq!(cli.api_url.as_str(), "http://127.0.0.1:7070/");
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.pages, 1);
        assert_eq!(args.output, OutputFormat::Table);
    }
}
