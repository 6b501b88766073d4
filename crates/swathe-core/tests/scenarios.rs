//! End-to-end controller scenarios against the in-memory collection.

use std::time::{Duration, Instant};

use swathe_api_models::{BulkAction, ItemKey};
use swathe_config::ViewConfig;
use swathe_core::{
    DispatchError, FetchKind, FetchOutcome, ListController, ListError, Query, ScrollSample,
    SelectionPhase, SelectionSummary,
};
use swathe_test_support::collection::FakeCollection;
use swathe_test_support::fixtures::{hash, hashes, torrent, torrents};

async fn opened(collection: &FakeCollection, now: Instant) -> ListController {
    let mut controller = ListController::new(ViewConfig::default(), Query::default());
    let ticket = controller.start(now);
    controller
        .run_fetch(collection, ticket)
        .await
        .expect("initial page");
    controller
}

fn rendered(controller: &ListController) -> Vec<ItemKey> {
    controller
        .rows()
        .iter()
        .map(|item| item.hash.clone())
        .collect()
}

#[tokio::test]
async fn exclusions_survive_a_refresh_that_grows_the_total() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(500));
    let mut controller = opened(&collection, now).await;
    assert_eq!(controller.total_count(), 500);

    assert_eq!(
        controller.select_all_visible(now),
        SelectionPhase::AllMatchingFull
    );
    assert_eq!(controller.effective_count(), 500);
    for key in hashes(&[3, 4, 5]) {
        controller.toggle(&key, false, now);
    }
    assert_eq!(controller.effective_count(), 497);

    for index in 500..510 {
        collection.insert(torrent(index));
    }
    let ticket = controller.refresh(now + Duration::from_secs(2));
    controller
        .run_fetch(&collection, ticket)
        .await
        .expect("refresh");
    assert_eq!(controller.total_count(), 510);
    assert_eq!(controller.effective_count(), 507);
    assert_eq!(
        controller.selection_summary(),
        SelectionSummary::AllExcept(507)
    );
}

#[tokio::test]
async fn scrolling_to_the_end_loads_the_next_page_before_growing() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(1_000));
    let mut controller = opened(&collection, now).await;
    assert_eq!(controller.loaded_count(), 100);

    let sample = ScrollSample {
        scroll_top: 95 * 30,
        viewport_height: 300,
        row_height: 30,
    };
    let scrolled = controller.on_scroll(sample, now);
    let ticket = scrolled.fetch.expect("page requested");
    assert_eq!(ticket.kind, FetchKind::NextPage);
    assert_eq!(controller.loaded_count(), 100);
    assert!(
        controller
            .on_scroll(sample, now + Duration::from_secs(1))
            .fetch
            .is_none()
    );

    controller
        .run_fetch(&collection, ticket)
        .await
        .expect("next page");
    assert_eq!(controller.loaded_count(), 200);
    assert_eq!(controller.rows().len(), 200);
    assert!(controller.has_more());
}

#[tokio::test]
async fn deleting_explicit_keys_updates_every_cached_query() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(30));
    let mut controller = opened(&collection, now).await;

    let downloading = controller
        .set_filter("state", Some("downloading"), now)
        .expect("query changed");
    let downloading_query = downloading.query.clone();
    controller
        .run_fetch(&collection, downloading)
        .await
        .expect("filtered page");
    assert_eq!(controller.total_count(), 10);

    let back = controller
        .set_filter("state", None, now)
        .expect("query changed");
    controller
        .run_fetch(&collection, back)
        .await
        .expect("refresh");
    assert_eq!(controller.total_count(), 30);

    let doomed = hashes(&[0, 1, 2, 3, 6]);
    for key in &doomed {
        controller.toggle(key, true, now);
    }
    assert_eq!(controller.effective_count(), 5);

    let report = controller
        .perform_action(&collection, BulkAction::Remove { delete_data: false }, now)
        .await
        .expect("remove");
    assert_eq!(report.succeeded, 5);
    assert_eq!(controller.total_count(), 25);
    assert_eq!(controller.selection_summary(), SelectionSummary::None);
    let rows = rendered(&controller);
    assert_eq!(rows.len(), 25);
    assert!(doomed.iter().all(|key| !rows.contains(key)));

    let filtered = controller
        .cache()
        .get(&downloading_query)
        .expect("filtered entry kept");
    assert_eq!(filtered.total_count(), 7);
    assert_eq!(filtered.len(), 7);
    assert_eq!(collection.len(), 25);
}

#[tokio::test]
async fn all_matching_descriptor_resolves_to_total_minus_exclusions() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(250));
    let mut controller = opened(&collection, now).await;
    controller.select_all_visible(now);
    controller.toggle(&hash(0), false, now);
    controller.toggle(&hash(1), false, now);
    let expected = controller.effective_count();

    let report = controller
        .perform_action(&collection, BulkAction::Pause, now)
        .await
        .expect("pause");
    assert_eq!(report.succeeded, expected);
    assert_eq!(report.succeeded, 248);

    let submitted = collection.submissions();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].select_all);
    assert!(submitted[0].hashes.is_empty());
    assert_eq!(submitted[0].exclude_hashes.as_deref(), Some(&hashes(&[0, 1])[..]));
    assert_eq!(
        controller.selection().phase(),
        SelectionPhase::AllMatchingPartial
    );
}

#[tokio::test]
async fn conflict_rolls_back_the_optimistic_removal() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(50));
    let mut controller = opened(&collection, now).await;
    controller.select_all_visible(now);
    collection.conflict_next();

    let err = controller
        .perform_action(&collection, BulkAction::Remove { delete_data: true }, now)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AddressingConflict { .. }));
    assert_eq!(err.to_string(), "selection changed, please retry");
    assert_eq!(controller.rows().len(), 50);
    assert_eq!(controller.total_count(), 50);
    assert_eq!(controller.effective_count(), 50);
    assert_eq!(collection.len(), 50);
    assert!(controller.next_deadline().is_none());
}

#[tokio::test]
async fn partial_failure_keeps_successes_and_failed_selection() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(50));
    let mut controller = opened(&collection, now).await;
    for key in hashes(&[10, 11, 12]) {
        controller.toggle(&key, true, now);
    }
    collection.fail_keys(&[hash(11)], "files in use");

    let err = controller
        .perform_action(&collection, BulkAction::Remove { delete_data: false }, now)
        .await
        .unwrap_err();
    let DispatchError::PartialFailure { succeeded, failed } = err else {
        panic!("expected a partial failure");
    };
    assert_eq!(succeeded, 2);
    assert_eq!(failed.len(), 1);
    assert_eq!(controller.total_count(), 48);
    assert!(rendered(&controller).contains(&hash(11)));
    assert!(controller.is_selected(&hash(11)));
    assert_eq!(controller.effective_count(), 1);
    assert!(controller.next_deadline().is_some());
}

#[tokio::test]
async fn network_failures_surface_and_the_next_request_recovers() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(20));
    let mut controller = ListController::new(ViewConfig::default(), Query::default());
    collection.network_failure_next_fetch();

    let ticket = controller.start(now);
    let err = controller.run_fetch(&collection, ticket).await.unwrap_err();
    assert!(matches!(err, ListError::Backend { .. }));
    assert!(controller.rows().is_empty());

    let retry = controller.refresh(now);
    let outcome = controller
        .run_fetch(&collection, retry)
        .await
        .expect("retry");
    assert!(matches!(outcome, FetchOutcome::Applied { active: true, .. }));
    assert_eq!(controller.rows().len(), 20);

    controller.toggle(&hash(0), true, now);
    collection.network_failure_next_submit();
    let err = controller
        .perform_action(&collection, BulkAction::Remove { delete_data: false }, now)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Network { .. }));
    assert_eq!(controller.rows().len(), 20);
    assert!(controller.is_selected(&hash(0)));
}

#[tokio::test]
async fn invalid_actions_never_reach_the_server() {
    let now = Instant::now();
    let collection = FakeCollection::new(torrents(5));
    let mut controller = opened(&collection, now).await;

    let err = controller
        .perform_action(&collection, BulkAction::Pause, now)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::EmptySelection));

    controller.toggle(&hash(0), true, now);
    let err = controller
        .perform_action(&collection, BulkAction::Tags { tags: vec![] }, now)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidAction { .. }));
    assert!(collection.submissions().is_empty());
    assert!(!controller.selection().is_pinned());
}
