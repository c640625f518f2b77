//! Movement lifecycle and the result returned once a movement commits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LotId, MovementKey};

use crate::allocation::AllocationPlan;
use crate::ledger::{LedgerEntry, MovementType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Purchase,
    Sale,
}

/// Lifecycle of one movement request.
///
/// ```text
/// Received -> Validated -> Applied -> Committed
///     |           |           |
///     v           v           v
///  Rejected     Failed  <-----+  (rolled back)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementState {
    Received,
    Validated,
    Applied,
    Committed,
    Failed,
    Rejected,
}

impl MovementState {
    pub fn can_transition_to(self, next: MovementState) -> bool {
        use MovementState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Rejected)
                | (Validated, Applied)
                | (Validated, Failed)
                | (Applied, Committed)
                | (Applied, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MovementState::Committed | MovementState::Failed | MovementState::Rejected
        )
    }
}

impl core::fmt::Display for MovementState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            MovementState::Received => "received",
            MovementState::Validated => "validated",
            MovementState::Applied => "applied",
            MovementState::Committed => "committed",
            MovementState::Failed => "failed",
            MovementState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Tracks the state of a movement while the coordinator works on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    key: MovementKey,
    kind: MovementKind,
    state: MovementState,
}

impl Movement {
    pub fn received(key: MovementKey, kind: MovementKind) -> Self {
        Self {
            key,
            kind,
            state: MovementState::Received,
        }
    }

    pub fn key(&self) -> &MovementKey {
        &self.key
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    pub fn advance(&mut self, next: MovementState) -> DomainResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "illegal movement transition {} -> {next} for {}",
                self.state, self.key
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// Outcome of a committed movement. Replays of the same key return it as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub movement: MovementKey,
    pub kind: MovementKind,
    /// Lots created by a purchase (empty for sales).
    pub lots_created: Vec<LotId>,
    /// One plan per sale line (empty for purchases).
    pub allocations: Vec<AllocationPlan>,
    pub ledger_entries: Vec<LedgerEntry>,
    /// Document total (purchase total or sale amount).
    pub total: Decimal,
    pub committed_at: DateTime<Utc>,
}

impl CommitResult {
    pub fn quantity(&self, movement_type: MovementType) -> i64 {
        self.ledger_entries
            .iter()
            .filter(|e| e.movement_type == movement_type)
            .map(|e| e.quantity)
            .sum()
    }

    /// Cost of goods sold carried by the OUT entries.
    pub fn cost_of_goods(&self) -> Decimal {
        self.ledger_entries
            .iter()
            .filter(|e| e.movement_type == MovementType::Out)
            .map(LedgerEntry::cost)
            .sum()
    }
}
