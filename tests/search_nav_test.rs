//! End-to-end search: matching, navigation, highlighting, scrolling

use std::time::Instant;

use docview::engine::DocumentSource;
use docview::test_utils::{FakeEngine, FakePageSpec, pump_view_until_idle};
use docview::viewer::{ContainerSize, DocumentView, MatchStatus, SearchOptions};
use docview::ViewerOptions;

/// 3-page document: "the" twice on page 0, once on page 1, absent on page 2
fn three_page_view() -> DocumentView<FakeEngine> {
    let engine = FakeEngine::with_pages(vec![
        FakePageSpec::letter().with_text(&["the quick brown ", "fox and the lazy dog"]),
        FakePageSpec::letter().with_text(&["over the hills"]),
        FakePageSpec::letter().with_text(&["final page"]),
    ]);
    let mut view = DocumentView::new(engine, ViewerOptions::default());
    view.resize(ContainerSize::new(800.0, 600.0));
    view.load(DocumentSource::Bytes(Vec::new())).expect("load");
    pump_view_until_idle(&mut view, Instant::now());
    view
}

fn all_highlight_options() -> SearchOptions {
    SearchOptions {
        highlight_all: true,
        ..SearchOptions::default()
    }
}

#[test]
fn three_page_scenario_with_circular_navigation() {
    let mut view = three_page_view();

    let status = view.search("the", all_highlight_options());
    assert_eq!(status.total, 3);
    assert_eq!(status.current, 1);

    // second match, still page 0
    let status = view.search_next();
    assert_eq!(status.current, 2);
    assert!(!status.wrapped);

    // third match moves to page 1 and scrolls it into view
    assert_eq!(view.scroll_offset(), 0.0);
    let status = view.search_next();
    assert_eq!(status.current, 3);
    assert!(!status.wrapped);
    assert!(view.scroll_offset() > 0.0);

    // k-th next() wraps back to the first match
    let status = view.search_next();
    assert_eq!(status.current, 1);
    assert!(status.wrapped);

    let status = view.search_previous();
    assert_eq!(status.current, 3);
    assert!(status.wrapped);
}

#[test]
fn highlights_land_on_the_right_slots() {
    let mut view = three_page_view();
    view.search("the", all_highlight_options());

    let page0 = view.slot(0).expect("slot 0").highlights();
    assert_eq!(page0.len(), 2);
    assert_eq!(page0.iter().filter(|span| span.selected).count(), 1);

    assert_eq!(view.slot(1).expect("slot 1").highlights().len(), 1);
    assert!(view.slot(2).expect("slot 2").highlights().is_empty());

    // selection moves: the selected flag follows it
    view.search_next();
    view.search_next();
    let page0 = view.slot(0).expect("slot 0").highlights();
    assert!(page0.iter().all(|span| !span.selected));
    assert!(view.slot(1).expect("slot 1").highlights()[0].selected);
}

#[test]
fn empty_query_clears_results_and_markup() {
    let mut view = three_page_view();
    view.search("the", all_highlight_options());
    assert!(!view.slot(0).expect("slot 0").highlights().is_empty());

    let status = view.search("", SearchOptions::default());
    assert_eq!(
        status,
        MatchStatus {
            current: 0,
            total: 0,
            wrapped: false
        }
    );
    for page in 0..3 {
        assert!(view.slot(page).expect("slot").highlights().is_empty());
    }
    // empty query reverts to "search not yet run"
    assert_eq!(view.match_status(), None);
}

#[test]
fn zero_matches_is_distinct_from_never_ran() {
    let mut view = three_page_view();
    assert_eq!(view.match_status(), None);

    view.search("zebra", SearchOptions::default());
    assert_eq!(
        view.match_status(),
        Some(MatchStatus {
            current: 0,
            total: 0,
            wrapped: false
        })
    );

    // navigation with no matches is silently ignored
    let status = view.search_next();
    assert_eq!(status.current, 0);
    assert_eq!(status.total, 0);
}

#[test]
fn clear_search_resets_counters_and_spans() {
    let mut view = three_page_view();
    view.search("the", all_highlight_options());
    view.search_next();

    view.clear_search();
    assert_eq!(view.match_status(), None);
    for page in 0..3 {
        assert!(view.slot(page).expect("slot").highlights().is_empty());
    }
}

#[test]
fn selecting_an_offscreen_match_scrolls_to_it() {
    let mut view = three_page_view();
    assert_eq!(view.scroll_offset(), 0.0);

    // the only match is on page 1; its anchor fragment sits at content
    // offset 886 (page start 808 + pixel y 78), outside the 600px viewport
    let status = view.search("hills", SearchOptions::default());
    assert_eq!(status.total, 1);

    let offset = view.scroll_offset();
    assert!(offset > 0.0);
    assert!(offset <= 886.0 && 886.0 < offset + 600.0, "match not in view");

    // re-selecting the already-visible match must not move the view
    let status = view.search_next();
    assert!(status.wrapped);
    assert_eq!(view.scroll_offset(), offset);
}

#[test]
fn highlights_survive_re_render_after_zoom() {
    let mut view = three_page_view();
    view.search("the", all_highlight_options());

    view.set_scale(2.0);
    pump_view_until_idle(&mut view, Instant::now());

    // fragments were not re-extracted, spans still attached
    let page0 = view.slot(0).expect("slot 0").highlights();
    assert_eq!(page0.len(), 2);
}

#[test]
fn search_before_render_uses_engine_extraction() {
    // no pumping: no page has rendered yet when the search runs
    let engine = FakeEngine::with_pages(vec![
        FakePageSpec::letter().with_text(&["needle in a haystack"]),
    ]);
    let mut view = DocumentView::new(engine, ViewerOptions::default());
    view.resize(ContainerSize::new(800.0, 600.0));
    view.load(DocumentSource::Bytes(Vec::new())).expect("load");

    let status = view.search("needle", SearchOptions::default());
    assert_eq!(status.total, 1);
}
