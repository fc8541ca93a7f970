use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::core::{
    BoundCalculator, BoundHistory, ChartId, EventEmitter, MultigraphSeries, Subscription,
};
use crate::interaction::{DragDrop, TooltipChange, TooltipMousePosition, TooltipState, TooltipToken};

use super::SyncMember;

/// Inputs handed to a [`TooltipResolver`] when the pointer moves.
#[derive(Debug, Clone, Copy)]
pub struct TooltipQuery<'a> {
    pub mouse_x: f64,
    pub mouse_y: f64,
    pub series: &'a [MultigraphSeries],
    pub saved_tooltips: usize,
    /// Set when the move came from a linked chart and every series should be
    /// tooltipped regardless of distance.
    pub tooltip_all: bool,
}

/// Counts the ephemeral tooltips a pointer position produces.
///
/// Hit-testing against rendered geometry belongs to the renderer; the state
/// object only needs the resulting count. Resolvers run while the chart state
/// is borrowed and must not call back into it.
pub trait TooltipResolver {
    fn unsaved_tooltips(&self, query: &TooltipQuery<'_>) -> usize;
}

/// Default resolver: one tooltip per series, minus the pinned ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeriesTooltipResolver;

impl TooltipResolver for SeriesTooltipResolver {
    fn unsaved_tooltips(&self, query: &TooltipQuery<'_>) -> usize {
        query.series.len().saturating_sub(query.saved_tooltips)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartStateConfig {
    #[serde(default)]
    pub default_bound_calculator: BoundCalculator,
}

impl ChartStateConfig {
    #[must_use]
    pub fn with_default_bound_calculator(mut self, calculator: BoundCalculator) -> Self {
        self.default_bound_calculator = calculator;
        self
    }
}

struct ChartStateInner {
    bound_history: Vec<BoundCalculator>,
    bound_index: usize,
    dragging_y: bool,
    tooltip: TooltipState,
    saved_tooltips: usize,
    series: Vec<MultigraphSeries>,
    disposed: bool,
}

impl ChartStateInner {
    fn bound_calculator(&self) -> &BoundCalculator {
        &self.bound_history[self.bound_index]
    }

    fn bound_history_state(&self) -> BoundHistory {
        BoundHistory {
            has_previous: self.bound_index > 0,
            has_next: self.bound_index + 1 < self.bound_history.len(),
        }
    }
}

/// Reactive view state of a single chart.
///
/// Every mutation happens through `&self` and is followed by a synchronous
/// event emission; no borrow of the internal state is held while listeners
/// run, so listeners (typically a [`SyncPool`](super::SyncPool)) may call
/// straight back into this or any other chart.
pub struct ChartState {
    chart_id: ChartId,
    inner: RefCell<ChartStateInner>,
    tooltip_resolver: Box<dyn TooltipResolver>,
    bound_calculator_changed: EventEmitter<BoundCalculator>,
    bound_history_changed: EventEmitter<BoundHistory>,
    tooltip_state_changed: EventEmitter<TooltipChange>,
    dragging_y_changed: EventEmitter<bool>,
    dragging_y_finalized: EventEmitter<DragDrop>,
    series_changed: EventEmitter<Vec<MultigraphSeries>>,
    disposed: EventEmitter<ChartId>,
}

impl ChartState {
    #[must_use]
    pub fn new(chart_id: impl Into<ChartId>, config: ChartStateConfig) -> Rc<Self> {
        Self::with_tooltip_resolver(chart_id, config, SeriesTooltipResolver)
    }

    #[must_use]
    pub fn with_tooltip_resolver(
        chart_id: impl Into<ChartId>,
        config: ChartStateConfig,
        tooltip_resolver: impl TooltipResolver + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            chart_id: chart_id.into(),
            inner: RefCell::new(ChartStateInner {
                bound_history: vec![config.default_bound_calculator],
                bound_index: 0,
                dragging_y: false,
                tooltip: TooltipState::default(),
                saved_tooltips: 0,
                series: Vec::new(),
                disposed: false,
            }),
            tooltip_resolver: Box::new(tooltip_resolver),
            bound_calculator_changed: EventEmitter::new(),
            bound_history_changed: EventEmitter::new(),
            tooltip_state_changed: EventEmitter::new(),
            dragging_y_changed: EventEmitter::new(),
            dragging_y_finalized: EventEmitter::new(),
            series_changed: EventEmitter::new(),
            disposed: EventEmitter::new(),
        })
    }

    #[must_use]
    pub fn bound_calculator(&self) -> BoundCalculator {
        self.inner.borrow().bound_calculator().clone()
    }

    #[must_use]
    pub fn bound_history(&self) -> BoundHistory {
        self.inner.borrow().bound_history_state()
    }

    #[must_use]
    pub fn dragging_y(&self) -> bool {
        self.inner.borrow().dragging_y
    }

    #[must_use]
    pub fn tooltip_state(&self) -> TooltipState {
        self.inner.borrow().tooltip
    }

    #[must_use]
    pub fn saved_tooltips_count(&self) -> usize {
        self.inner.borrow().saved_tooltips
    }

    #[must_use]
    pub fn series(&self) -> Vec<MultigraphSeries> {
        self.inner.borrow().series.clone()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    pub fn set_series(&self, series: Vec<MultigraphSeries>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.series == series {
                return;
            }
            inner.series = series.clone();
        }
        trace!(chart_id = %self.chart_id, count = series.len(), "set chart series");
        self.series_changed.emit(&series);
    }

    /// Steps back in the bounds history. Returns `false` at the oldest entry.
    pub fn previous_bounds(&self) -> bool {
        self.step_bounds(false)
    }

    /// Steps forward in the bounds history. Returns `false` at the newest entry.
    pub fn next_bounds(&self) -> bool {
        self.step_bounds(true)
    }

    fn step_bounds(&self, forward: bool) -> bool {
        let (calculator, history) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return false;
            }
            let target = if forward {
                inner.bound_index + 1
            } else {
                match inner.bound_index.checked_sub(1) {
                    Some(target) => target,
                    None => return false,
                }
            };
            if target >= inner.bound_history.len() {
                return false;
            }
            inner.bound_index = target;
            (
                inner.bound_history[target].clone(),
                inner.bound_history_state(),
            )
        };
        trace!(chart_id = %self.chart_id, bounds = calculator.label(), forward, "step bounds history");
        self.bound_calculator_changed.emit(&calculator);
        self.bound_history_changed.emit(&history);
        true
    }

    /// User pointer move over this chart.
    pub fn pointer_move(&self, mouse_x: f64, mouse_y: f64, shift_key: bool) {
        self.update_pointer(mouse_x, mouse_y, shift_key, false, None);
    }

    /// User pointer left this chart.
    pub fn pointer_leave(&self) {
        self.hide_pointer_tooltips(None);
    }

    /// Pins the tooltips currently under the pointer, or unpins all of them
    /// when nothing new is under the pointer.
    pub fn toggle_tooltip_saved(&self) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            if inner.tooltip.mouse_present && inner.tooltip.unsaved_tooltips_count > 0 {
                let pinned = inner.tooltip.unsaved_tooltips_count;
                inner.saved_tooltips += pinned;
                inner.tooltip.unsaved_tooltips_count = 0;
            } else if inner.saved_tooltips > 0 {
                inner.saved_tooltips = 0;
                self.refresh_unsaved_tooltips(&mut inner);
            } else {
                return;
            }
            TooltipChange {
                state: inner.tooltip,
                token: None,
            }
        };
        self.tooltip_state_changed.emit(&change);
    }

    pub fn clear_saved_tooltips(&self) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.saved_tooltips == 0 {
                return;
            }
            inner.saved_tooltips = 0;
            self.refresh_unsaved_tooltips(&mut inner);
            TooltipChange {
                state: inner.tooltip,
                token: None,
            }
        };
        self.tooltip_state_changed.emit(&change);
    }

    /// Emits `disposed` once, then detaches every listener. Further commands are
    /// ignored.
    pub fn dispose(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
        }
        trace!(chart_id = %self.chart_id, "dispose chart state");
        self.disposed.emit(&self.chart_id);

        self.bound_calculator_changed.clear();
        self.bound_history_changed.clear();
        self.tooltip_state_changed.clear();
        self.dragging_y_changed.clear();
        self.dragging_y_finalized.clear();
        self.series_changed.clear();
        self.disposed.clear();
    }

    pub fn on_bound_history_changed(
        &self,
        listener: impl Fn(&BoundHistory) + 'static,
    ) -> Subscription {
        self.bound_history_changed.subscribe(listener)
    }

    pub fn on_dragging_y_finalized(&self, listener: impl Fn(&DragDrop) + 'static) -> Subscription {
        self.dragging_y_finalized.subscribe(listener)
    }

    pub fn on_series_changed(
        &self,
        listener: impl Fn(&Vec<MultigraphSeries>) + 'static,
    ) -> Subscription {
        self.series_changed.subscribe(listener)
    }

    fn refresh_unsaved_tooltips(&self, inner: &mut ChartStateInner) {
        inner.tooltip.unsaved_tooltips_count = if inner.tooltip.mouse_present {
            self.tooltip_resolver.unsaved_tooltips(&TooltipQuery {
                mouse_x: inner.tooltip.mouse_x,
                mouse_y: inner.tooltip.mouse_y,
                series: &inner.series,
                saved_tooltips: inner.saved_tooltips,
                tooltip_all: false,
            })
        } else {
            0
        };
    }

    fn update_pointer(
        &self,
        mouse_x: f64,
        mouse_y: f64,
        shift_key: bool,
        tooltip_all: bool,
        token: Option<TooltipToken>,
    ) {
        if !mouse_x.is_finite() || !mouse_y.is_finite() {
            warn!(
                chart_id = %self.chart_id,
                mouse_x,
                mouse_y,
                "ignoring non-finite tooltip mouse position"
            );
            return;
        }

        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            let tooltip = &mut inner.tooltip;
            if tooltip.mouse_present && tooltip.mouse_x == mouse_x && tooltip.mouse_y == mouse_y {
                return;
            }
            tooltip.mouse_present = true;
            tooltip.mouse_x = mouse_x;
            tooltip.mouse_y = mouse_y;
            tooltip.shift_key_pressed_on_move = shift_key;

            let unsaved = self.tooltip_resolver.unsaved_tooltips(&TooltipQuery {
                mouse_x,
                mouse_y,
                series: &inner.series,
                saved_tooltips: inner.saved_tooltips,
                tooltip_all,
            });
            inner.tooltip.unsaved_tooltips_count = unsaved;
            TooltipChange {
                state: inner.tooltip,
                token,
            }
        };
        self.tooltip_state_changed.emit(&change);
    }

    fn hide_pointer_tooltips(&self, token: Option<TooltipToken>) {
        let change = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || !inner.tooltip.mouse_present {
                return;
            }
            inner.tooltip.mouse_present = false;
            inner.tooltip.unsaved_tooltips_count = 0;
            TooltipChange {
                state: inner.tooltip,
                token,
            }
        };
        self.tooltip_state_changed.emit(&change);
    }

    fn move_local_axis(&self, drop: &DragDrop, axis_index: usize) {
        let series = {
            let mut inner = self.inner.borrow_mut();
            let Some(series) = inner
                .series
                .iter_mut()
                .find(|series| series.key == drop.series_key)
            else {
                return;
            };
            if series.axis_index == Some(axis_index) {
                return;
            }
            series.axis_index = Some(axis_index);
            inner.series.clone()
        };
        trace!(
            chart_id = %self.chart_id,
            series_key = %drop.series_key,
            axis_index,
            "move series to local axis"
        );
        self.series_changed.emit(&series);
    }
}

impl SyncMember for ChartState {
    fn chart_id(&self) -> &ChartId {
        &self.chart_id
    }

    fn shift_key_pressed_on_move(&self) -> bool {
        self.inner.borrow().tooltip.shift_key_pressed_on_move
    }

    fn set_bound_calculator(&self, calculator: BoundCalculator) {
        let history = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || *inner.bound_calculator() == calculator {
                return;
            }
            let next = inner.bound_index + 1;
            inner.bound_history.truncate(next);
            inner.bound_history.push(calculator.clone());
            inner.bound_index = next;
            inner.bound_history_state()
        };
        trace!(chart_id = %self.chart_id, bounds = calculator.label(), "bound calculator changed");
        self.bound_calculator_changed.emit(&calculator);
        self.bound_history_changed.emit(&history);
    }

    fn mark_drag_start(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || inner.dragging_y {
                return;
            }
            inner.dragging_y = true;
        }
        self.dragging_y_changed.emit(&true);
    }

    fn finalize_drag(&self, drop: Option<DragDrop>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed || !inner.dragging_y {
                return;
            }
            inner.dragging_y = false;
        }
        self.dragging_y_changed.emit(&false);

        let Some(drop) = drop else {
            trace!(chart_id = %self.chart_id, "y-axis drag cancelled");
            return;
        };

        if drop.target == self.chart_id {
            if let Some(axis_index) = drop.axis_index {
                self.move_local_axis(&drop, axis_index);
            }
        }
        self.dragging_y_finalized.emit(&drop);
    }

    fn show_only_saved_tooltips(&self, token: TooltipToken) {
        self.hide_pointer_tooltips(Some(token));
    }

    fn set_tooltip_mouse_position(&self, position: TooltipMousePosition) {
        self.update_pointer(
            position.mouse_x,
            position.mouse_y,
            false,
            position.tooltip_all_next,
            position.tooltip_state_arg,
        );
    }

    fn on_bound_calculator_changed(
        &self,
        listener: Box<dyn Fn(&BoundCalculator)>,
    ) -> Subscription {
        self.bound_calculator_changed.subscribe(listener)
    }

    fn on_dragging_y_changed(&self, listener: Box<dyn Fn(&bool)>) -> Subscription {
        self.dragging_y_changed.subscribe(listener)
    }

    fn on_tooltip_state_changed(&self, listener: Box<dyn Fn(&TooltipChange)>) -> Subscription {
        self.tooltip_state_changed.subscribe(listener)
    }

    fn on_disposed(&self, listener: Box<dyn Fn(&ChartId)>) -> Subscription {
        self.disposed.subscribe(listener)
    }
}

impl fmt::Debug for ChartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ChartState")
            .field("chart_id", &self.chart_id)
            .field("bound_calculator", inner.bound_calculator())
            .field("dragging_y", &inner.dragging_y)
            .field("tooltip", &inner.tooltip)
            .field("series", &inner.series.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}
