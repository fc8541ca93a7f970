use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Explicit x (and optionally y) window picked from a pixel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionBounds {
    pub min_x: OrderedFloat<f64>,
    pub max_x: OrderedFloat<f64>,
    pub min_y: Option<OrderedFloat<f64>>,
    pub max_y: Option<OrderedFloat<f64>>,
}

impl SelectionBounds {
    pub fn new(min_x: f64, max_x: f64) -> SyncResult<Self> {
        validate_range("selection x", min_x, max_x)?;
        Ok(Self {
            min_x: OrderedFloat(min_x),
            max_x: OrderedFloat(max_x),
            min_y: None,
            max_y: None,
        })
    }

    pub fn with_y_range(mut self, min_y: f64, max_y: f64) -> SyncResult<Self> {
        validate_range("selection y", min_y, max_y)?;
        self.min_y = Some(OrderedFloat(min_y));
        self.max_y = Some(OrderedFloat(max_y));
        Ok(self)
    }
}

fn validate_range(name: &str, min: f64, max: f64) -> SyncResult<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(SyncError::InvalidData(format!("{name} range must be finite")));
    }
    if min >= max {
        return Err(SyncError::InvalidData(format!(
            "{name} range must satisfy min < max (got {min} >= {max})"
        )));
    }
    Ok(())
}

/// Descriptor of the strategy that picks a chart's visible bounds.
///
/// The bounds math itself lives with the renderer; this crate only compares
/// descriptors and ships them between charts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BoundCalculator {
    #[default]
    All,
    LastMinute,
    Last10Minutes,
    LastHour,
    LastDay,
    Custom { label: String },
    Selection(SelectionBounds),
}

impl BoundCalculator {
    /// Resolves a bounds-selector label.
    ///
    /// Built-in labels win, then `custom_labels`; anything else falls back to
    /// [`BoundCalculator::All`].
    #[must_use]
    pub fn from_label(label: &str, custom_labels: &[String]) -> Self {
        match label {
            "all" => Self::All,
            "lastMinute" => Self::LastMinute,
            "last10Minutes" => Self::Last10Minutes,
            "lastHour" => Self::LastHour,
            "lastDay" => Self::LastDay,
            other if custom_labels.iter().any(|custom| custom == other) => Self::Custom {
                label: other.to_owned(),
            },
            _ => Self::All,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::All => "all",
            Self::LastMinute => "lastMinute",
            Self::Last10Minutes => "last10Minutes",
            Self::LastHour => "lastHour",
            Self::LastDay => "lastDay",
            Self::Custom { label } => label,
            Self::Selection(_) => "selection",
        }
    }
}

/// Undo/redo position inside a chart's bounds history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundHistory {
    pub has_previous: bool,
    pub has_next: bool,
}
