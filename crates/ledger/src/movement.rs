use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LocationId, ProductId};

/// Kind of ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Receive,
    Reserve,
    Release,
    Ship,
    Adjust,
    Count,
}

/// Append-only journal entry recorded for every ledger posting.
///
/// Sequence numbers are contiguous and strictly increasing in commit order;
/// reporting collaborators read owned snapshots of these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub seq: u64,
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub on_hand_delta: i64,
    pub reserved_delta: i64,
    /// Operator-supplied reason for manual adjustments and counts.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    next_seq: u64,
    entries: Vec<StockMovement>,
}

impl Journal {
    pub(crate) fn append(
        &mut self,
        kind: MovementKind,
        product_id: ProductId,
        location_id: LocationId,
        on_hand_delta: i64,
        reserved_delta: i64,
        reason: Option<String>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(StockMovement {
            seq,
            kind,
            product_id,
            location_id,
            on_hand_delta,
            reserved_delta,
            reason,
            occurred_at: Utc::now(),
        });
        seq
    }

    pub(crate) fn entries(&self) -> &[StockMovement] {
        &self.entries
    }
}
