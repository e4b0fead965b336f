//! Document lifecycle, viewport operations, overlays and presentation

use std::time::Instant;

use docview::engine::DocumentSource;
use docview::test_utils::{FakeEngine, FakePageSpec, pump_view_until_idle};
use docview::viewer::{
    BoundingRegion, ContainerSize, DocumentView, RegionStyle, RenderPhase, Rotation,
};
use docview::ViewerOptions;

fn loaded_view(pages: usize) -> DocumentView<FakeEngine> {
    let mut view = DocumentView::new(FakeEngine::uniform(pages), ViewerOptions::default());
    view.resize(ContainerSize::new(800.0, 1000.0));
    view.load(DocumentSource::Bytes(Vec::new())).expect("load");
    view
}

#[test]
fn slot_count_equals_page_count_across_viewport_changes() {
    let mut view = loaded_view(9);
    assert_eq!(view.page_count(), 9);

    let t0 = Instant::now();
    for _ in 0..3 {
        view.zoom_in();
        view.rotate_clockwise();
        pump_view_until_idle(&mut view, t0);
        assert_eq!(view.page_count(), 9);
        assert_eq!(view.slots().len(), 9);
    }
}

#[test]
fn scale_is_clamped_and_rotation_normalized() {
    let mut view = loaded_view(2);

    view.set_scale(100.0);
    assert_eq!(view.scale(), 10.0);
    view.set_scale(0.0001);
    assert_eq!(view.scale(), 0.1);
    view.set_scale(f32::NAN);
    assert_eq!(view.scale(), 1.0);

    for _ in 0..5 {
        view.rotate_clockwise();
    }
    assert_eq!(view.rotation(), Rotation::R90);
    view.rotate_counter_clockwise();
    view.rotate_counter_clockwise();
    assert_eq!(view.rotation(), Rotation::R270);
}

#[test]
fn load_failure_is_a_terminal_error_state() {
    let mut view = DocumentView::new(
        FakeEngine::failing_open("not a document"),
        ViewerOptions::default(),
    );
    view.resize(ContainerSize::new(800.0, 1000.0));

    let result = view.load(DocumentSource::Bytes(vec![0xde, 0xad]));
    assert!(result.is_err());
    assert!(view.load_error().is_some());
    assert!(!view.is_loaded());
    assert_eq!(view.page_count(), 0);

    // operations on a failed viewer are inert, not panicking
    view.zoom_in();
    view.go_to_page(3);
    assert_eq!(view.search("x", docview::SearchOptions::default()).total, 0);
}

#[test]
fn reload_tears_down_and_rebuilds_everything() {
    let mut view = loaded_view(5);
    let t0 = Instant::now();
    pump_view_until_idle(&mut view, t0);
    view.search("anything", docview::SearchOptions::default());
    view.go_to_page(3);

    view.load(DocumentSource::Bytes(Vec::new())).expect("reload");

    assert_eq!(view.page_count(), 5);
    assert_eq!(view.current_page(), 0);
    assert_eq!(view.scroll_offset(), 0.0);
    assert_eq!(view.match_status(), None);
    assert!(
        view.slots()
            .iter()
            .all(|slot| slot.phase() == RenderPhase::Initial)
    );

    pump_view_until_idle(&mut view, t0);
    assert_eq!(view.slot(0).expect("slot 0").phase(), RenderPhase::Finished);
}

#[test]
fn bounding_boxes_distribute_to_their_pages() {
    let mut view = loaded_view(3);

    let regions: Vec<BoundingRegion> = serde_json::from_str(
        r#"[
            {"page": 0, "x": 10.0, "y": 20.0, "width": 100.0, "height": 50.0},
            {"page": 2, "x": 30.0, "y": 40.0, "width": 60.0, "height": 60.0, "closable": true},
            {"page": 2, "x": 5.0, "y": 5.0, "width": 10.0, "height": 10.0}
        ]"#,
    )
    .expect("region fixtures");

    view.update_bounding_boxes(regions);

    assert_eq!(view.slot(0).expect("slot 0").regions().len(), 1);
    assert!(view.slot(1).expect("slot 1").regions().is_empty());
    let page2 = view.slot(2).expect("slot 2").regions();
    assert_eq!(page2.len(), 2);
    assert!(page2[0].closable);

    // replacement, not accumulation
    view.update_bounding_boxes(Vec::new());
    assert!(view.slot(2).expect("slot 2").regions().is_empty());
}

#[test]
fn drawn_region_is_anchored_in_document_space() {
    let mut view = loaded_view(2);

    // drawing is inert until draw mode is on
    view.draw_begin(0, 100.0, 100.0);
    view.draw_update(200.0, 150.0);
    assert!(view.draw_finish(RegionStyle::default()).is_none());

    view.set_draw_mode(true);
    view.draw_begin(0, 100.0, 100.0);
    view.draw_update(200.0, 150.0);
    let region = view
        .draw_finish(RegionStyle::default())
        .expect("drawn region");

    assert_eq!(region.page, 0);
    assert_eq!(view.regions().len(), 1);
    assert_eq!(view.slot(0).expect("slot 0").regions().len(), 1);

    // zooming moves the pixels but not the document anchor
    let bounds_before = region.bounds();
    view.set_scale(2.0);
    let shown = view.slot(0).expect("slot 0").regions()[0].clone();
    assert_eq!(shown.bounds(), bounds_before);
}

#[test]
fn degenerate_drag_adds_nothing() {
    let mut view = loaded_view(1);
    view.set_draw_mode(true);

    view.draw_begin(0, 50.0, 50.0);
    assert!(view.draw_finish(RegionStyle::default()).is_none());
    assert!(view.regions().is_empty());
}

#[test]
fn presentation_session_is_independent_of_scroll_state() {
    let mut view = loaded_view(6);
    let t0 = Instant::now();
    pump_view_until_idle(&mut view, t0);
    view.go_to_page(4);

    let session = view.presentation_mut();
    assert!(session.request(2));
    session.confirm_entered();
    assert!(session.is_fullscreen());
    assert!(session.next_page());
    assert_eq!(session.current_page(), 3);

    let back_at = session.exit();
    assert_eq!(back_at, 3);

    // the main viewer's scroll position was untouched
    assert_eq!(view.current_page(), 4);
}

#[test]
fn annotations_are_exposed_per_slot() {
    let mut view = loaded_view(2);
    pump_view_until_idle(&mut view, Instant::now());

    // the fake engine reports none, but the layer is present and stable
    assert!(view.slot(0).expect("slot 0").annotations().is_empty());
}

#[test]
fn intrinsically_rotated_page_swaps_display_axes() {
    let engine = FakeEngine::with_pages(vec![
        FakePageSpec::letter().with_rotation(Rotation::R90),
        FakePageSpec::letter(),
    ]);
    let mut view = DocumentView::new(engine, ViewerOptions::default());
    view.resize(ContainerSize::new(800.0, 1000.0));
    view.load(DocumentSource::Bytes(Vec::new())).expect("load");

    let sideways = view.slot(0).expect("slot 0");
    let upright = view.slot(1).expect("slot 1");
    assert_eq!(sideways.display_size(), (792.0, 612.0));
    assert_eq!(upright.display_size(), (612.0, 792.0));

    // one viewer quarter-turn brings the sideways page upright
    view.rotate_clockwise();
    assert_eq!(view.slot(0).expect("slot 0").display_size(), (612.0, 792.0));
}
