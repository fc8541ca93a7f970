use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Counters collected by a pool created with
/// [`SyncPool::with_diagnostics`](super::SyncPool::with_diagnostics).
///
/// Relay counters count delivered commands, one per target member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDiagnosticsSnapshot {
    pub members_added: u64,
    pub members_removed: u64,
    pub bound_relays: u64,
    pub drag_start_relays: u64,
    pub drag_cancel_relays: u64,
    pub tooltip_show_relays: u64,
    pub tooltip_hide_relays: u64,
    pub tokens_minted: u64,
    pub echoes_suppressed: u64,
}

impl SyncDiagnosticsSnapshot {
    pub fn to_json_pretty(self) -> SyncResult<String> {
        serde_json::to_string_pretty(&self).map_err(|e| {
            SyncError::InvalidData(format!("failed to serialize sync diagnostics: {e}"))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncCounter {
    MemberAdded,
    MemberRemoved,
    BoundRelay,
    DragStartRelay,
    DragCancelRelay,
    TooltipShowRelay,
    TooltipHideRelay,
    TokenMinted,
    EchoSuppressed,
}

/// Read handle onto a pool's relay counters.
///
/// Cloning shares the same counters; the handle stays readable after the pool
/// is dropped.
#[derive(Debug, Clone, Default)]
pub struct SyncDiagnostics {
    counters: Rc<Cell<SyncDiagnosticsSnapshot>>,
}

impl SyncDiagnostics {
    #[must_use]
    pub fn snapshot(&self) -> SyncDiagnosticsSnapshot {
        self.counters.get()
    }

    pub fn reset(&self) {
        self.counters.set(SyncDiagnosticsSnapshot::default());
    }

    pub(crate) fn record(&self, counter: SyncCounter) {
        let mut snapshot = self.counters.get();
        let slot = match counter {
            SyncCounter::MemberAdded => &mut snapshot.members_added,
            SyncCounter::MemberRemoved => &mut snapshot.members_removed,
            SyncCounter::BoundRelay => &mut snapshot.bound_relays,
            SyncCounter::DragStartRelay => &mut snapshot.drag_start_relays,
            SyncCounter::DragCancelRelay => &mut snapshot.drag_cancel_relays,
            SyncCounter::TooltipShowRelay => &mut snapshot.tooltip_show_relays,
            SyncCounter::TooltipHideRelay => &mut snapshot.tooltip_hide_relays,
            SyncCounter::TokenMinted => &mut snapshot.tokens_minted,
            SyncCounter::EchoSuppressed => &mut snapshot.echoes_suppressed,
        };
        *slot += 1;
        self.counters.set(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncCounter, SyncDiagnostics};

    #[test]
    fn clones_share_counters() {
        let diagnostics = SyncDiagnostics::default();
        let reader = diagnostics.clone();

        diagnostics.record(SyncCounter::BoundRelay);
        diagnostics.record(SyncCounter::BoundRelay);
        diagnostics.record(SyncCounter::EchoSuppressed);

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.bound_relays, 2);
        assert_eq!(snapshot.echoes_suppressed, 1);

        reader.reset();
        assert_eq!(diagnostics.snapshot().bound_relays, 0);
    }
}
