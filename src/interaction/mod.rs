use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ChartId;
use crate::error::SyncError;

/// Public tooltip/hover state of one chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipState {
    pub mouse_x: f64,
    pub mouse_y: f64,
    pub mouse_present: bool,
    /// Tooltips currently shown because of the pointer, excluding pinned ones.
    pub unsaved_tooltips_count: usize,
    pub shift_key_pressed_on_move: bool,
}

impl Default for TooltipState {
    fn default() -> Self {
        Self {
            mouse_x: 0.0,
            mouse_y: 0.0,
            mouse_present: false,
            unsaved_tooltips_count: 0,
            shift_key_pressed_on_move: false,
        }
    }
}

/// Marker attached to pool-issued tooltip commands so their echoes can be
/// recognized.
///
/// Tokens are `(pool, sequence)` pairs drawn from monotonic counters, so two
/// distinct mints never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TooltipToken {
    pub pool: u64,
    pub sequence: u64,
}

impl fmt::Display for TooltipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pool, self.sequence)
    }
}

/// Payload of `tooltip_state_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipChange {
    pub state: TooltipState,
    /// Token carried by the command that caused this change, `None` for
    /// user-originated changes.
    pub token: Option<TooltipToken>,
}

/// Command payload for `set_tooltip_mouse_position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipMousePosition {
    pub mouse_x: f64,
    pub mouse_y: f64,
    pub tooltip_all_next: bool,
    pub tooltip_state_arg: Option<TooltipToken>,
}

/// Committed end of a y-axis drag gesture.
///
/// A cancelled gesture carries no `DragDrop` at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragDrop {
    pub series_key: String,
    pub axis_index: Option<usize>,
    /// Chart the series was dropped on.
    pub target: ChartId,
}

/// How tooltips are linked across a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TooltipSyncModeRepr", into = "TooltipSyncModeRepr")]
pub enum TooltipSyncMode {
    Off,
    #[default]
    Always,
    /// Link only gestures made while shift is held on the originating chart.
    OnShift,
}

impl TooltipSyncMode {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Host-facing shape: `false`, `true` or `"onShift"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TooltipSyncModeRepr {
    Flag(bool),
    Name(String),
}

impl TryFrom<TooltipSyncModeRepr> for TooltipSyncMode {
    type Error = SyncError;

    fn try_from(value: TooltipSyncModeRepr) -> Result<Self, Self::Error> {
        match value {
            TooltipSyncModeRepr::Flag(false) => Ok(Self::Off),
            TooltipSyncModeRepr::Flag(true) => Ok(Self::Always),
            TooltipSyncModeRepr::Name(name) => match name.as_str() {
                "off" => Ok(Self::Off),
                "always" => Ok(Self::Always),
                "onShift" | "on_shift" => Ok(Self::OnShift),
                other => Err(SyncError::InvalidConfig(format!(
                    "unknown tooltip sync mode `{other}`"
                ))),
            },
        }
    }
}

impl From<TooltipSyncMode> for TooltipSyncModeRepr {
    fn from(value: TooltipSyncMode) -> Self {
        match value {
            TooltipSyncMode::Off => Self::Flag(false),
            TooltipSyncMode::Always => Self::Flag(true),
            TooltipSyncMode::OnShift => Self::Name("onShift".to_owned()),
        }
    }
}
