use std::cell::RefCell;
use std::rc::Rc;

use chart_sync::api::{ChartState, ChartStateConfig, SyncMember, SyncPool, SyncPoolConfig};
use chart_sync::core::{ChartId, MultigraphSeries, SeriesSpec};
use chart_sync::interaction::DragDrop;

fn chart_with_series(id: &str, key: &str) -> Rc<ChartState> {
    let state = ChartState::new(id, ChartStateConfig::default());
    state.set_series(vec![MultigraphSeries::decorate(
        &SeriesSpec::new(key),
        0,
        0,
        None,
    )]);
    state
}

fn linked_pair() -> (SyncPool, Rc<ChartState>, Rc<ChartState>) {
    let pool = SyncPool::new(SyncPoolConfig::default().with_sync_drag_state(true));
    let a = chart_with_series("a", "cpu");
    let b = chart_with_series("b", "mem");
    pool.add(&a).expect("add a");
    pool.add(&b).expect("add b");
    (pool, a, b)
}

#[test]
fn drag_start_is_mirrored() {
    let (_pool, a, b) = linked_pair();

    a.mark_drag_start();

    assert!(a.dragging_y());
    assert!(b.dragging_y());
}

#[test]
fn drag_end_on_source_cancels_on_peers() {
    let (_pool, a, b) = linked_pair();
    let b_drops = Rc::new(RefCell::new(Vec::<DragDrop>::new()));
    let sink = Rc::clone(&b_drops);
    let _sub = b.on_dragging_y_finalized(move |drop: &DragDrop| sink.borrow_mut().push(drop.clone()));

    a.mark_drag_start();
    a.finalize_drag(Some(DragDrop {
        series_key: "mem".to_owned(),
        axis_index: Some(1),
        target: ChartId::from("b"),
    }));

    assert!(!a.dragging_y());
    assert!(!b.dragging_y());
    assert!(b_drops.borrow().is_empty());
    assert_eq!(b.series()[0].axis_index, None);
}

#[test]
fn source_still_reports_its_own_drop() {
    let (_pool, a, _b) = linked_pair();
    let drops = Rc::new(RefCell::new(Vec::<DragDrop>::new()));
    let sink = Rc::clone(&drops);
    let _sub = a.on_dragging_y_finalized(move |drop: &DragDrop| sink.borrow_mut().push(drop.clone()));

    let drop = DragDrop {
        series_key: "cpu".to_owned(),
        axis_index: Some(2),
        target: ChartId::from("a"),
    };
    a.mark_drag_start();
    a.finalize_drag(Some(drop.clone()));

    assert_eq!(*drops.borrow(), vec![drop]);
    assert_eq!(a.series()[0].axis_index, Some(2));
}

#[test]
fn dragging_events_fire_once_per_member_per_transition() {
    let (_pool, a, b) = linked_pair();
    let transitions = Rc::new(RefCell::new(Vec::<(&'static str, bool)>::new()));

    let sink = Rc::clone(&transitions);
    let _sub_a = a.on_dragging_y_changed(Box::new(move |dragging: &bool| {
        sink.borrow_mut().push(("a", *dragging));
    }));
    let sink = Rc::clone(&transitions);
    let _sub_b = b.on_dragging_y_changed(Box::new(move |dragging: &bool| {
        sink.borrow_mut().push(("b", *dragging));
    }));

    b.mark_drag_start();
    b.mark_drag_start();
    b.finalize_drag(None);

    let transitions = transitions.borrow();
    assert_eq!(transitions.len(), 4);
    assert_eq!(transitions.iter().filter(|(_, dragging)| *dragging).count(), 2);
}

#[test]
fn drag_state_is_not_linked_by_default() {
    let pool = SyncPool::new(SyncPoolConfig::default());
    let a = chart_with_series("a", "cpu");
    let b = chart_with_series("b", "mem");
    pool.add(&a).expect("add a");
    pool.add(&b).expect("add b");

    a.mark_drag_start();

    assert!(a.dragging_y());
    assert!(!b.dragging_y());
}

#[test]
fn drag_transitions_reach_each_of_three_members_exactly_once() {
    let (pool, diagnostics) =
        SyncPool::with_diagnostics(SyncPoolConfig::default().with_sync_drag_state(true));
    let charts = [
        chart_with_series("a", "cpu"),
        chart_with_series("b", "mem"),
        chart_with_series("c", "disk"),
    ];
    let transitions = Rc::new(RefCell::new(Vec::<(usize, bool)>::new()));
    let mut subs = Vec::new();
    for (index, chart) in charts.iter().enumerate() {
        pool.add(chart).expect("add chart");
        let sink = Rc::clone(&transitions);
        subs.push(chart.on_dragging_y_changed(Box::new(move |dragging: &bool| {
            sink.borrow_mut().push((index, *dragging));
        })));
    }

    charts[0].mark_drag_start();

    let starts = |index: usize| {
        transitions
            .borrow()
            .iter()
            .filter(|&&(chart, dragging)| chart == index && dragging)
            .count()
    };
    assert_eq!([starts(0), starts(1), starts(2)], [1, 1, 1]);
    assert!(charts.iter().all(|chart| chart.dragging_y()));
    // Every member relays to both peers; repeated starts are absorbed.
    assert_eq!(diagnostics.snapshot().drag_start_relays, 6);

    transitions.borrow_mut().clear();
    charts[0].finalize_drag(None);

    let mut cancels = transitions.borrow().clone();
    cancels.sort_unstable();
    assert_eq!(cancels, vec![(0, false), (1, false), (2, false)]);
    assert!(charts.iter().all(|chart| !chart.dragging_y()));
}
