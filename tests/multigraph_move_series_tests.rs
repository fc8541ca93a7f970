use std::cell::RefCell;
use std::rc::Rc;

use chart_sync::SyncError;
use chart_sync::api::{
    GraphCountChange, MoveTarget, MultigraphConfig, MultigraphController, SeriesMove, SyncMember,
};
use chart_sync::core::{ChartId, SeriesSpec};
use chart_sync::interaction::DragDrop;

fn controller_with(series: Vec<SeriesSpec>) -> MultigraphController {
    let controller =
        MultigraphController::new(MultigraphConfig::default().with_id("mv")).expect("controller");
    controller.set_series(series).expect("set series");
    controller
}

fn layout(controller: &MultigraphController) -> Vec<Vec<String>> {
    controller
        .multi_series()
        .iter()
        .map(|group| group.series.iter().map(|s| s.key.clone()).collect())
        .collect()
}

fn request(key: &str, target: MoveTarget) -> SeriesMove {
    SeriesMove {
        series_key: key.to_owned(),
        target,
        axis_index: None,
    }
}

#[test]
fn move_to_bottom_creates_a_graph() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    let counts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&counts);
    let _sub = controller.on_graph_count_changed(move |change| sink.borrow_mut().push(*change));

    controller
        .move_series(request("mem", MoveTarget::Bottom))
        .expect("move to bottom");

    assert_eq!(layout(&controller), vec![vec!["cpu"], vec!["mem"]]);
    assert_eq!(
        *counts.borrow(),
        vec![GraphCountChange {
            graph_count: 2,
            previous: 1
        }]
    );
}

#[test]
fn move_to_top_shifts_existing_graphs_down() {
    let controller = controller_with(vec![
        SeriesSpec::new("cpu"),
        SeriesSpec::new("mem").with_graph(1),
    ]);

    controller
        .move_series(request("mem", MoveTarget::Top))
        .expect("move to top");

    assert_eq!(layout(&controller), vec![vec!["mem"], vec!["cpu"]]);
    assert_eq!(controller.multi_series()[0].series[0].multigrapher_graph_index, 0);
}

#[test]
fn moving_the_last_series_out_collapses_its_graph() {
    let controller = controller_with(vec![
        SeriesSpec::new("cpu"),
        SeriesSpec::new("mem").with_graph(1),
        SeriesSpec::new("disk").with_graph(2),
    ]);
    let middle = controller.chart(1).expect("middle chart");
    let last = controller.chart(2).expect("last chart");

    controller
        .move_series(request("mem", MoveTarget::Graph(0)))
        .expect("merge into first graph");

    assert_eq!(layout(&controller), vec![vec!["cpu", "mem"], vec!["disk"]]);
    assert!(!middle.is_disposed());
    assert!(last.is_disposed());
    assert_eq!(middle.series()[0].key, "disk");
}

#[test]
fn placement_survives_later_series_updates() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    controller
        .move_series(request("mem", MoveTarget::Bottom))
        .expect("move to bottom");

    controller
        .set_series(vec![
            SeriesSpec::new("cpu"),
            SeriesSpec::new("mem"),
            SeriesSpec::new("load"),
        ])
        .expect("add series");

    assert_eq!(layout(&controller), vec![vec!["cpu", "load"], vec!["mem"]]);
}

#[test]
fn axis_index_travels_with_the_move() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);

    controller
        .move_series(SeriesMove {
            series_key: "mem".to_owned(),
            target: MoveTarget::Bottom,
            axis_index: Some(1),
        })
        .expect("move with axis");

    let bottom = controller.chart(1).expect("bottom chart");
    assert_eq!(bottom.series()[0].axis_index, Some(1));
}

#[test]
fn invalid_moves_are_rejected_without_side_effects() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);

    let unknown = controller
        .move_series(request("nope", MoveTarget::Bottom))
        .expect_err("unknown series");
    let out_of_range = controller
        .move_series(request("mem", MoveTarget::Graph(5)))
        .expect_err("graph out of range");

    assert!(matches!(unknown, SyncError::InvalidMove(_)));
    assert!(matches!(out_of_range, SyncError::InvalidMove(_)));
    assert_eq!(layout(&controller), vec![vec!["cpu", "mem"]]);
}

#[test]
fn drop_on_another_sub_chart_moves_the_series() {
    let controller = controller_with(vec![
        SeriesSpec::new("cpu"),
        SeriesSpec::new("mem").with_graph(1),
    ]);
    let top = controller.chart(0).expect("top chart");

    top.mark_drag_start();
    top.finalize_drag(Some(DragDrop {
        series_key: "cpu".to_owned(),
        axis_index: Some(1),
        target: ChartId::from("multigrapher-mv-1"),
    }));

    assert_eq!(layout(&controller), vec![vec!["cpu", "mem"]]);
    assert!(!controller.dragging_y());
    let merged = controller.chart(0).expect("merged chart");
    assert_eq!(merged.series()[0].axis_index, Some(1));
}

#[test]
fn drop_on_bottom_zone_splits_a_series_off() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    let top = controller.chart(0).expect("top chart");

    top.mark_drag_start();
    top.finalize_drag(Some(DragDrop {
        series_key: "cpu".to_owned(),
        axis_index: None,
        target: controller.bottom_drop_target(),
    }));

    assert_eq!(layout(&controller), vec![vec!["mem"], vec!["cpu"]]);
}

#[test]
fn drop_on_top_zone_places_series_first() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    let top = controller.chart(0).expect("top chart");

    top.mark_drag_start();
    top.finalize_drag(Some(DragDrop {
        series_key: "mem".to_owned(),
        axis_index: None,
        target: controller.top_drop_target(),
    }));

    assert_eq!(layout(&controller), vec![vec!["mem"], vec!["cpu"]]);
}

#[test]
fn drop_on_foreign_chart_is_ignored() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    let top = controller.chart(0).expect("top chart");

    top.mark_drag_start();
    top.finalize_drag(Some(DragDrop {
        series_key: "cpu".to_owned(),
        axis_index: None,
        target: ChartId::from("multigrapher-other-bottom"),
    }));

    assert_eq!(layout(&controller), vec![vec!["cpu", "mem"]]);
}

#[test]
fn drop_on_source_chart_only_changes_the_axis() {
    let controller = controller_with(vec![SeriesSpec::new("cpu"), SeriesSpec::new("mem")]);
    let top = controller.chart(0).expect("top chart");

    top.mark_drag_start();
    top.finalize_drag(Some(DragDrop {
        series_key: "mem".to_owned(),
        axis_index: Some(2),
        target: ChartId::from("multigrapher-mv-0"),
    }));

    assert_eq!(controller.graph_count(), 1);
    assert_eq!(top.series()[1].axis_index, Some(2));

    controller
        .set_series(vec![
            SeriesSpec::new("cpu"),
            SeriesSpec::new("mem"),
            SeriesSpec::new("load"),
        ])
        .expect("add series");
    assert_eq!(top.series()[1].axis_index, Some(2));
    assert_eq!(controller.multi_series()[0].series[1].axis_index, Some(2));
}
