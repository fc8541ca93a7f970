use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::{BoundCalculator, ChartId, Subscription};
use crate::error::{SyncError, SyncResult};
use crate::interaction::{TooltipChange, TooltipMousePosition, TooltipSyncMode, TooltipToken};

use super::sync_diagnostics::SyncCounter;
use super::{SyncDiagnostics, SyncMember};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Which state facets a pool links. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPoolConfig {
    #[serde(default = "default_sync_bounds")]
    pub sync_bounds: bool,
    #[serde(default)]
    pub sync_tooltips: TooltipSyncMode,
    #[serde(default)]
    pub sync_drag_state: bool,
}

fn default_sync_bounds() -> bool {
    true
}

impl Default for SyncPoolConfig {
    fn default() -> Self {
        Self {
            sync_bounds: true,
            sync_tooltips: TooltipSyncMode::Always,
            sync_drag_state: false,
        }
    }
}

impl SyncPoolConfig {
    #[must_use]
    pub fn with_sync_bounds(mut self, sync_bounds: bool) -> Self {
        self.sync_bounds = sync_bounds;
        self
    }

    #[must_use]
    pub fn with_sync_tooltips(mut self, sync_tooltips: TooltipSyncMode) -> Self {
        self.sync_tooltips = sync_tooltips;
        self
    }

    #[must_use]
    pub fn with_sync_drag_state(mut self, sync_drag_state: bool) -> Self {
        self.sync_drag_state = sync_drag_state;
        self
    }

    /// Serializes config to pretty JSON for debug/config files.
    pub fn to_json_pretty(self) -> SyncResult<String> {
        serde_json::to_string_pretty(&self)
            .map_err(|e| SyncError::InvalidConfig(format!("failed to serialize pool config: {e}")))
    }

    /// Deserializes config from JSON. Missing fields take their defaults.
    pub fn from_json_str(input: &str) -> SyncResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| SyncError::InvalidConfig(format!("failed to parse pool config: {e}")))
    }
}

struct Membership {
    member: Weak<dyn SyncMember>,
    // Held only for their drop: releasing membership detaches the listeners.
    _subscriptions: SmallVec<[Subscription; 4]>,
}

type MemberTargets = SmallVec<[Rc<dyn SyncMember>; 8]>;

struct PoolShared {
    pool_id: u64,
    config: SyncPoolConfig,
    members: RefCell<IndexMap<ChartId, Membership>>,
    ignore_token: Cell<Option<TooltipToken>>,
    next_sequence: Cell<u64>,
    diagnostics: Option<SyncDiagnostics>,
}

impl PoolShared {
    fn record(&self, counter: SyncCounter) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.record(counter);
        }
    }

    fn record_n(&self, counter: SyncCounter, count: usize) {
        for _ in 0..count {
            self.record(counter);
        }
    }

    /// Forgets members that were dropped without being disposed.
    fn prune_dead(&self) {
        let dead: SmallVec<[(ChartId, Membership); 2]> = {
            let mut members = self.members.borrow_mut();
            let chart_ids: SmallVec<[ChartId; 2]> = members
                .iter()
                .filter(|(_, membership)| membership.member.strong_count() == 0)
                .map(|(chart_id, _)| chart_id.clone())
                .collect();
            chart_ids
                .into_iter()
                .filter_map(|chart_id| {
                    let membership = members.shift_remove(&chart_id)?;
                    Some((chart_id, membership))
                })
                .collect()
        };
        // Subscriptions are released outside the borrow.
        for (chart_id, membership) in dead {
            drop(membership);
            debug!(pool_id = self.pool_id, chart_id = %chart_id, "prune dropped sync pool member");
            self.record(SyncCounter::MemberRemoved);
        }
    }

    /// Live members other than `source`, or `None` when `source` is no longer
    /// registered.
    fn others(&self, source: &ChartId) -> Option<(Rc<dyn SyncMember>, MemberTargets)> {
        self.prune_dead();
        let members = self.members.borrow();
        let source_member = members.get(source)?.member.upgrade()?;
        let targets = members
            .iter()
            .filter(|(chart_id, _)| *chart_id != source)
            .filter_map(|(_, membership)| membership.member.upgrade())
            .collect();
        Some((source_member, targets))
    }

    fn mint_token(&self) -> TooltipToken {
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        let token = TooltipToken {
            pool: self.pool_id,
            sequence,
        };
        self.ignore_token.set(Some(token));
        self.record(SyncCounter::TokenMinted);
        token
    }

    fn relay_bound_calculator(&self, source: &ChartId, calculator: &BoundCalculator) {
        let Some((_, targets)) = self.others(source) else {
            return;
        };
        trace!(
            pool_id = self.pool_id,
            source = %source,
            bounds = calculator.label(),
            targets = targets.len(),
            "relay bound calculator"
        );
        self.record_n(SyncCounter::BoundRelay, targets.len());
        for target in targets {
            target.set_bound_calculator(calculator.clone());
        }
    }

    fn relay_dragging_y(&self, source: &ChartId, dragging_y: bool) {
        let Some((_, targets)) = self.others(source) else {
            return;
        };
        trace!(
            pool_id = self.pool_id,
            source = %source,
            dragging_y,
            targets = targets.len(),
            "relay y-axis drag state"
        );
        if dragging_y {
            self.record_n(SyncCounter::DragStartRelay, targets.len());
            for target in targets {
                target.mark_drag_start();
            }
        } else {
            self.record_n(SyncCounter::DragCancelRelay, targets.len());
            for target in targets {
                target.finalize_drag(None);
            }
        }
    }

    fn relay_tooltip(&self, source: &ChartId, change: &TooltipChange) {
        if change.token.is_some() && change.token == self.ignore_token.get() {
            trace!(pool_id = self.pool_id, source = %source, "suppress tooltip echo");
            self.record(SyncCounter::EchoSuppressed);
            return;
        }

        let Some((source_member, targets)) = self.others(source) else {
            return;
        };

        let state = change.state;
        let should_hide = state.unsaved_tooltips_count == 0
            || !state.mouse_present
            || (self.config.sync_tooltips == TooltipSyncMode::OnShift
                && !source_member.shift_key_pressed_on_move());

        if should_hide {
            let token = self.mint_token();
            trace!(
                pool_id = self.pool_id,
                source = %source,
                %token,
                targets = targets.len(),
                "relay tooltip hide"
            );
            self.record_n(SyncCounter::TooltipHideRelay, targets.len());
            for target in targets {
                target.show_only_saved_tooltips(token);
            }
            return;
        }

        let token = match self.ignore_token.get() {
            Some(token) => token,
            None => self.mint_token(),
        };
        trace!(
            pool_id = self.pool_id,
            source = %source,
            %token,
            mouse_x = state.mouse_x,
            mouse_y = state.mouse_y,
            targets = targets.len(),
            "relay tooltip position"
        );
        self.record_n(SyncCounter::TooltipShowRelay, targets.len());
        let position = TooltipMousePosition {
            mouse_x: state.mouse_x,
            mouse_y: state.mouse_y,
            tooltip_all_next: true,
            tooltip_state_arg: Some(token),
        };
        for target in targets {
            target.set_tooltip_mouse_position(position);
        }
    }

    fn remove(&self, chart_id: &ChartId) -> bool {
        let removed = self.members.borrow_mut().shift_remove(chart_id);
        let Some(membership) = removed else {
            return false;
        };
        drop(membership);
        debug!(pool_id = self.pool_id, chart_id = %chart_id, "remove sync pool member");
        self.record(SyncCounter::MemberRemoved);
        true
    }
}

/// Cross-wires chart state objects so bounds, tooltips and y-axis drag state
/// behave as if shared.
///
/// The pool never owns its members: it keeps weak references and the
/// subscriptions it attached. Removing a member (explicitly, or implicitly when
/// the member is disposed) detaches every listener the pool attached to it.
/// Cloning yields another handle onto the same pool.
#[derive(Clone)]
pub struct SyncPool {
    shared: Rc<PoolShared>,
}

impl SyncPool {
    #[must_use]
    pub fn new(config: SyncPoolConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a pool together with a read handle onto its relay counters.
    #[must_use]
    pub fn with_diagnostics(config: SyncPoolConfig) -> (Self, SyncDiagnostics) {
        let diagnostics = SyncDiagnostics::default();
        (Self::build(config, Some(diagnostics.clone())), diagnostics)
    }

    fn build(config: SyncPoolConfig, diagnostics: Option<SyncDiagnostics>) -> Self {
        Self {
            shared: Rc::new(PoolShared {
                pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                config,
                members: RefCell::new(IndexMap::new()),
                ignore_token: Cell::new(None),
                next_sequence: Cell::new(1),
                diagnostics,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> SyncPoolConfig {
        self.shared.config
    }

    /// Registers `member` and wires the configured facets to every other member.
    ///
    /// Returns `Ok(false)` when this very object is already registered. A
    /// different object claiming a registered id is rejected; an id whose
    /// previous holder was dropped without being disposed is taken over.
    pub fn add<M>(&self, member: &Rc<M>) -> SyncResult<bool>
    where
        M: SyncMember + 'static,
    {
        let chart_id = member.chart_id().clone();
        {
            let members = self.shared.members.borrow();
            if let Some(existing) = members.get(&chart_id) {
                match existing.member.upgrade() {
                    Some(existing) if same_object(&existing, member) => {
                        trace!(
                            pool_id = self.shared.pool_id,
                            chart_id = %chart_id,
                            "member already registered"
                        );
                        return Ok(false);
                    }
                    Some(_) => {
                        warn!(
                            pool_id = self.shared.pool_id,
                            chart_id = %chart_id,
                            "rejecting sync pool member with duplicate chart id"
                        );
                        return Err(SyncError::DuplicateChartId {
                            chart_id: chart_id.to_string(),
                        });
                    }
                    None => {}
                }
            }
        }

        let subscriptions = self.attach_listeners(member.as_ref(), &chart_id);
        let weak_member: Weak<M> = Rc::downgrade(member);
        let weak_member: Weak<dyn SyncMember> = weak_member;
        let replaced = self.shared.members.borrow_mut().insert(
            chart_id.clone(),
            Membership {
                member: weak_member,
                _subscriptions: subscriptions,
            },
        );
        drop(replaced);

        debug!(
            pool_id = self.shared.pool_id,
            chart_id = %chart_id,
            members = self.len(),
            "add sync pool member"
        );
        self.shared.record(SyncCounter::MemberAdded);
        Ok(true)
    }

    /// Drops membership of `chart_id` and detaches the pool's listeners from it.
    ///
    /// Returns whether the id was registered. The member itself is untouched.
    pub fn remove(&self, chart_id: &ChartId) -> bool {
        self.shared.remove(chart_id)
    }

    #[must_use]
    pub fn contains(&self, chart_id: &ChartId) -> bool {
        self.shared.prune_dead();
        self.shared.members.borrow().contains_key(chart_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.prune_dead();
        self.shared.members.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids of live members in registration order.
    #[must_use]
    pub fn member_ids(&self) -> Vec<ChartId> {
        self.shared.prune_dead();
        self.shared.members.borrow().keys().cloned().collect()
    }

    /// Token most recently minted for a tooltip broadcast, if any.
    #[must_use]
    pub fn ignore_token(&self) -> Option<TooltipToken> {
        self.shared.ignore_token.get()
    }

    fn attach_listeners(
        &self,
        member: &dyn SyncMember,
        chart_id: &ChartId,
    ) -> SmallVec<[Subscription; 4]> {
        let mut subscriptions = SmallVec::new();
        let config = self.shared.config;

        if config.sync_bounds {
            let pool = Rc::downgrade(&self.shared);
            let source = chart_id.clone();
            subscriptions.push(member.on_bound_calculator_changed(Box::new(
                move |calculator: &BoundCalculator| {
                    if let Some(pool) = pool.upgrade() {
                        pool.relay_bound_calculator(&source, calculator);
                    }
                },
            )));
        }

        if config.sync_drag_state {
            let pool = Rc::downgrade(&self.shared);
            let source = chart_id.clone();
            subscriptions.push(member.on_dragging_y_changed(Box::new(
                move |dragging_y: &bool| {
                    if let Some(pool) = pool.upgrade() {
                        pool.relay_dragging_y(&source, *dragging_y);
                    }
                },
            )));
        }

        if config.sync_tooltips.is_enabled() {
            let pool = Rc::downgrade(&self.shared);
            let source = chart_id.clone();
            subscriptions.push(member.on_tooltip_state_changed(Box::new(
                move |change: &TooltipChange| {
                    if let Some(pool) = pool.upgrade() {
                        pool.relay_tooltip(&source, change);
                    }
                },
            )));
        }

        let pool = Rc::downgrade(&self.shared);
        let source = chart_id.clone();
        subscriptions.push(member.on_disposed(Box::new(move |_: &ChartId| {
            if let Some(pool) = pool.upgrade() {
                pool.remove(&source);
            }
        })));

        subscriptions
    }
}

fn same_object<M: SyncMember>(registered: &Rc<dyn SyncMember>, candidate: &Rc<M>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(registered), Rc::as_ptr(candidate))
}

impl fmt::Debug for SyncPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPool")
            .field("pool_id", &self.shared.pool_id)
            .field("config", &self.shared.config)
            .field("members", &self.member_ids())
            .field("ignore_token", &self.shared.ignore_token.get())
            .finish()
    }
}
