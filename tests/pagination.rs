//! Pagination and refresh coordination: epoch invalidation, cursor ordering,
//! debounced load-recent.

mod support;

use std::time::Duration;

use ladle_sync::{DebounceKey, LoadState, Page, PageApplied, RemoteError};
use support::{Notice, notice, rig};

fn page(ids: &[&str], end: bool) -> Page<Notice> {
    Page {
        items: ids.iter().map(|id| notice(id, true)).collect(),
        end_of_collection: end,
    }
}

fn ids(items: &[Notice]) -> Vec<String> {
    items.iter().map(|n| n.id.clone()).collect()
}

#[test]
fn refresh_load_page_cycle() {
    let mut rig = rig::<Notice>("feed");

    let refresh = rig.facade.begin_refresh(2, None).expect("refresh starts");
    assert_eq!(rig.facade.state().load_state(), &LoadState::Loading);

    let applied = rig
        .facade
        .apply_page(refresh, Ok(page(&["n-1", "n-2"], false)));
    assert_eq!(applied, PageApplied::Applied);
    assert_eq!(rig.facade.state().load_state(), &LoadState::Loaded);

    let next = rig.facade.begin_load_page(2, 2);
    let applied = rig.facade.apply_page(next, Ok(page(&["n-3", "n-4"], true)));
    assert_eq!(applied, PageApplied::Applied);
    assert_eq!(
        ids(rig.facade.state().items()),
        vec!["n-1", "n-2", "n-3", "n-4"]
    );
}

#[test]
fn refresh_in_flight_drops_stale_page_append() {
    let mut rig = rig::<Notice>("feed");

    let refresh = rig.facade.begin_refresh(2, None).expect("refresh");
    rig.facade
        .apply_page(refresh, Ok(page(&["n-1", "n-2"], false)));

    // A next-page load goes out, then the user pulls to refresh before the
    // append lands.
    let append = rig.facade.begin_load_page(2, 2);
    let second_refresh = rig.facade.begin_refresh(2, None).expect("second refresh");

    // The append completes late: dropped, not spliced.
    let applied = rig.facade.apply_page(append, Ok(page(&["n-3", "n-4"], false)));
    assert_eq!(applied, PageApplied::Stale);

    let applied = rig
        .facade
        .apply_page(second_refresh, Ok(page(&["n-9", "n-1"], false)));
    assert_eq!(applied, PageApplied::Applied);
    assert_eq!(ids(rig.facade.state().items()), vec!["n-9", "n-1"]);
    assert!(rig.sink.names().contains(&"stale_page_dropped"));
}

#[test]
fn out_of_order_append_cannot_jump_the_cursor() {
    let mut rig = rig::<Notice>("feed");

    let refresh = rig.facade.begin_refresh(2, None).expect("refresh");
    rig.facade
        .apply_page(refresh, Ok(page(&["n-1", "n-2"], false)));

    // Two appends issued back to back; the later offset completes first.
    let first = rig.facade.begin_load_page(2, 2);
    let second = rig.facade.begin_load_page(4, 2);

    let applied = rig.facade.apply_page(second, Ok(page(&["n-5", "n-6"], true)));
    assert_eq!(applied, PageApplied::Stale);

    let applied = rig.facade.apply_page(first, Ok(page(&["n-3", "n-4"], false)));
    assert_eq!(applied, PageApplied::Applied);
    assert_eq!(
        ids(rig.facade.state().items()),
        vec!["n-1", "n-2", "n-3", "n-4"]
    );
}

#[test]
fn refresh_is_debounced_per_key() {
    let mut rig = rig::<Notice>("feed");
    let debounce = || Some(DebounceKey::with_cooldown("load_recent:u-7", Duration::from_secs(2)));

    let first = rig.facade.begin_refresh(20, debounce());
    assert!(first.is_some());

    let second = rig.facade.begin_refresh(20, debounce());
    assert!(second.is_none());

    rig.advance(Duration::from_secs(2));
    let third = rig.facade.begin_refresh(20, debounce());
    assert!(third.is_some());
}

#[test]
fn page_failure_marks_load_state_failed() {
    let mut rig = rig::<Notice>("feed");

    let refresh = rig.facade.begin_refresh(2, None).expect("refresh");
    let applied = rig.facade.apply_page(
        refresh,
        Err(RemoteError::Timeout { waited_ms: 8_000 }),
    );
    assert!(matches!(applied, PageApplied::Failed(_)));
    assert!(matches!(
        rig.facade.state().load_state(),
        LoadState::Failed(_)
    ));
}

#[test]
fn refresh_truncates_removed_tail() {
    let mut rig = rig::<Notice>("feed");

    let refresh = rig.facade.begin_refresh(4, None).expect("refresh");
    rig.facade
        .apply_page(refresh, Ok(page(&["n-1", "n-2", "n-3", "n-4"], false)));

    // Server now reports a shorter collection.
    let refresh = rig.facade.begin_refresh(4, None).expect("refresh");
    let applied = rig.facade.apply_page(refresh, Ok(page(&["n-2", "n-4"], true)));
    assert_eq!(applied, PageApplied::Applied);
    assert_eq!(ids(rig.facade.state().items()), vec!["n-2", "n-4"]);
}
