//! `swathe list`: fetch the first pages of a query and render them.

use std::time::Instant;

use swathe_api_models::{ItemRecord, ListResponse};
use tracing::debug;

use crate::cli::ListArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_list;

pub(crate) async fn handle_list(ctx: &AppContext, args: &ListArgs) -> CliResult<()> {
    let list = fetch_pages(ctx, args).await?;
    render_list(&list.response, list.has_more, args.output)
}

pub(crate) struct FetchedList {
    pub(crate) response: ListResponse,
    pub(crate) has_more: bool,
}

pub(crate) async fn fetch_pages(ctx: &AppContext, args: &ListArgs) -> CliResult<FetchedList> {
    if args.pages == 0 {
        return Err(CliError::validation("--pages must be at least 1"));
    }

    let mut controller = ctx.controller(args.query.to_query());
    let ticket = controller.start(Instant::now());
    controller.run_fetch(&ctx.backend, ticket).await?;
    for _ in 1..args.pages {
        let Some(ticket) = controller.load_more(Instant::now()) else {
            break;
        };
        controller.run_fetch(&ctx.backend, ticket).await?;
    }

    let items: Vec<ItemRecord> = controller
        .cache()
        .get(controller.query())
        .map_or_else(Vec::new, |entry| {
            entry.items().iter().map(|item| ItemRecord::clone(item)).collect()
        });
    debug!(fetched = items.len(), total = controller.total_count(), "list complete");
    Ok(FetchedList {
        response: ListResponse {
            items,
            total_count: controller.total_count(),
        },
        has_more: controller.has_more(),
    })
}
