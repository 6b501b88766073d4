//! `swathe act`: select torrents and dispatch one bulk action.

use std::time::Instant;

use swathe_api_models::{BulkAction, ItemKey};
use swathe_core::{ActionReport, SelectionSummary, validate_action};
use tracing::info;

use crate::cli::{ActArgs, Verb};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_action;

pub(crate) async fn handle_act(ctx: &AppContext, args: &ActArgs) -> CliResult<()> {
    let (report, summary) = dispatch_action(ctx, args).await?;
    render_action(&report, summary, args.output)
}

pub(crate) async fn dispatch_action(
    ctx: &AppContext,
    args: &ActArgs,
) -> CliResult<(ActionReport, SelectionSummary)> {
    let action = build_action(args)?;
    if !args.all && args.hashes.is_empty() {
        return Err(CliError::validation(
            "nothing to act on (pass --hash at least once, or --all)",
        ));
    }

    let mut controller = ctx.controller(args.query.to_query());
    let ticket = controller.start(Instant::now());
    controller.run_fetch(&ctx.backend, ticket).await?;

    let now = Instant::now();
    if args.all {
        controller.select_all_visible(now);
        for hash in &args.exclude {
            controller.toggle(&ItemKey::from(hash.trim()), false, now);
        }
    } else {
        for hash in &args.hashes {
            controller.toggle(&ItemKey::from(hash.trim()), true, now);
        }
    }

    let summary = controller.selection_summary();
    info!(
        action = action.verb(),
        selected = controller.effective_count(),
        "dispatching bulk action"
    );
    let report = controller
        .perform_action(&ctx.backend, action, Instant::now())
        .await?;
    Ok((report, summary))
}

/// Turn the verb and its flags into a validated action.
pub(crate) fn build_action(args: &ActArgs) -> CliResult<BulkAction> {
    let action = match args.verb {
        Verb::Pause => BulkAction::Pause,
        Verb::Resume => BulkAction::Resume,
        Verb::Recheck => BulkAction::Recheck,
        Verb::Reannounce => BulkAction::Reannounce,
        Verb::Remove => BulkAction::Remove {
            delete_data: args.delete_data,
        },
        Verb::Move => BulkAction::Move {
            download_dir: required(args.download_dir.as_deref(), "--download-dir", "move")?,
        },
        Verb::Category => BulkAction::Category {
            category: required(args.category.as_deref(), "--category", "category")?,
        },
        Verb::Tags => BulkAction::Tags {
            tags: args.tags.clone(),
        },
        Verb::Rate => BulkAction::Rate {
            download_bps: args.download_bps,
            upload_bps: args.upload_bps,
        },
        Verb::Sequential => BulkAction::Sequential {
            enable: args.enable.ok_or_else(|| {
                CliError::validation("--enable true|false is required for sequential")
            })?,
        },
    };
    validate_action(&action)?;
    Ok(action)
}

fn required(value: Option<&str>, flag: &str, verb: &str) -> CliResult<String> {
    value
        .map(str::to_string)
        .ok_or_else(|| CliError::validation(format!("{flag} is required for {verb}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::{Value, json};

    use crate::cli::{OutputFormat, QueryArgs};

    fn context_for(server: &MockServer) -> AppContext {
        AppContext::new(
            &server.base_url().parse().expect("valid URL"),
            Some("secret"),
            Duration::from_secs(5),
            None,
            false,
        )
        .expect("context")
    }

    fn args(verb: Verb) -> ActArgs {
        ActArgs {
            verb,
            hashes: Vec::new(),
            all: false,
            exclude: Vec::new(),
            query: QueryArgs::default(),
            delete_data: false,
            download_dir: None,
            category: None,
            tags: Vec::new(),
            download_bps: None,
            upload_bps: None,
            enable: None,
            output: OutputFormat::Table,
        }
    }

    fn items(hashes: &[&str]) -> Vec<Value> {
        hashes
            .iter()
            .map(|hash| json!({ "hash": hash, "name": format!("torrent-{hash}") }))
            .collect()
    }

    #[test]
    fn verb_flags_are_required_and_validated() {
        let err = build_action(&args(Verb::Move)).unwrap_err();
        assert_eq!(err.display_message(), "--download-dir is required for move");

        let mut blank_move = args(Verb::Move);
        blank_move.download_dir = Some("  ".to_string());
        assert_eq!(build_action(&blank_move).unwrap_err().exit_code(), 2);

        assert!(build_action(&args(Verb::Tags)).is_err());
        assert!(build_action(&args(Verb::Rate)).is_err());
        assert!(build_action(&args(Verb::Sequential)).is_err());

        let mut rate = args(Verb::Rate);
        rate.upload_bps = Some(1_024);
        assert_eq!(
            build_action(&rate).expect("valid rate"),
            BulkAction::Rate {
                download_bps: None,
                upload_bps: Some(1_024)
            }
        );
    }

    #[tokio::test]
    async fn explicit_hashes_are_sent_sorted() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/torrents");
            then.status(200)
                .json_body(json!({ "items": items(&["aa", "bb", "cc"]), "totalCount": 3 }));
        });
        let bulk = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/torrents/bulk")
                .header("x-swathe-api-key", "secret")
                .json_body(json!({
                    "action": "pause",
                    "hashes": ["aa", "cc"],
                    "selectAll": false
                }));
            then.status(200).json_body(json!({ "succeeded": 2 }));
        });

        let ctx = context_for(&server);
        let mut request = args(Verb::Pause);
        request.hashes = vec!["cc".to_string(), "aa".to_string()];
        let (report, summary) = dispatch_action(&ctx, &request).await.expect("dispatch");

        bulk.assert();
        assert_eq!(report.verb, "pause");
        assert_eq!(report.succeeded, 2);
        assert_eq!(summary, SelectionSummary::Some(2));
    }

    #[tokio::test]
    async fn all_matching_sends_query_and_exclusions() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/v1/torrents")
                .query_param("filter.state", "paused");
            then.status(200)
                .json_body(json!({ "items": items(&["aa", "bb"]), "totalCount": 250 }));
        });
        let bulk = server.mock(|when, then| {
            when.method(POST).path("/v1/torrents/bulk").json_body(json!({
                "action": "remove",
                "deleteData": false,
                "hashes": [],
                "selectAll": true,
                "filters": { "state": "paused" },
                "search": "",
                "excludeHashes": ["bb"]
            }));
            then.status(200).json_body(json!({ "succeeded": 249 }));
        });

        let ctx = context_for(&server);
        let mut request = args(Verb::Remove);
        request.all = true;
        request.exclude = vec!["bb".to_string()];
        request.query.filters = vec![("state".to_string(), "paused".to_string())];
        let (report, summary) = dispatch_action(&ctx, &request).await.expect("dispatch");

        bulk.assert();
        assert_eq!(report.succeeded, 249);
        assert_eq!(summary, SelectionSummary::AllExcept(249));
    }

    #[tokio::test]
    async fn conflict_is_reported_as_validation() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v1/torrents");
            then.status(200)
                .json_body(json!({ "items": items(&["aa"]), "totalCount": 1 }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1/torrents/bulk");
            then.status(409).body("matching set changed");
        });

        let ctx = context_for(&server);
        let mut request = args(Verb::Resume);
        request.all = true;
        let err = dispatch_action(&ctx, &request).await.err().expect("must fail");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "selection changed, please retry");
    }

    #[tokio::test]
    async fn missing_targets_never_reach_the_server() {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(GET).path("/v1/torrents");
            then.status(200).json_body(json!({ "items": [], "totalCount": 0 }));
        });

        let ctx = context_for(&server);
        let err = dispatch_action(&ctx, &args(Verb::Pause)).await.err().expect("must fail");
        assert_eq!(err.exit_code(), 2);
        list.assert_calls(0);
    }
}
