use crate::core::{BoundCalculator, ChartId, Subscription};
use crate::interaction::{DragDrop, TooltipChange, TooltipMousePosition, TooltipToken};

/// Contract a chart state object offers to a [`SyncPool`](super::SyncPool).
///
/// Implementors must uphold the idempotence rules the pool relies on to stay
/// loop-free:
/// - `set_bound_calculator` with the current calculator does not emit.
/// - `mark_drag_start` while dragging and `finalize_drag` while not dragging
///   do not emit.
/// - a tooltip change caused by `show_only_saved_tooltips(token)` or
///   `set_tooltip_mouse_position` is emitted with that command's token.
///
/// Events must be emitted synchronously and without holding internal borrows,
/// since listeners call straight back into other members.
pub trait SyncMember {
    fn chart_id(&self) -> &ChartId;

    /// Whether shift was held during the pointer move that produced the
    /// current tooltip state.
    fn shift_key_pressed_on_move(&self) -> bool;

    fn set_bound_calculator(&self, calculator: BoundCalculator);

    fn mark_drag_start(&self);

    /// Ends a y-axis drag. `None` aborts the gesture without committing anything.
    fn finalize_drag(&self, drop: Option<DragDrop>);

    fn show_only_saved_tooltips(&self, token: TooltipToken);

    fn set_tooltip_mouse_position(&self, position: TooltipMousePosition);

    fn on_bound_calculator_changed(
        &self,
        listener: Box<dyn Fn(&BoundCalculator)>,
    ) -> Subscription;

    fn on_dragging_y_changed(&self, listener: Box<dyn Fn(&bool)>) -> Subscription;

    fn on_tooltip_state_changed(&self, listener: Box<dyn Fn(&TooltipChange)>) -> Subscription;

    /// Fires once when the member is disposed; pools use it to drop membership.
    fn on_disposed(&self, listener: Box<dyn Fn(&ChartId)>) -> Subscription;
}
