//! Kardex: the append-only movement ledger and its valuation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LedgerEntryId, LotId, MovementKey, ProductId};

use crate::lot::StockLot;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
}

/// One immutable kardex line.
///
/// Every entry touches exactly one lot: IN entries record the lot a purchase
/// line created, OUT entries record one fragment of a sale taken from a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    /// Store-assigned append position (monotonic across the whole ledger).
    pub sequence: u64,
    pub movement_type: MovementType,
    pub product_id: ProductId,
    pub lot_id: LotId,
    pub quantity: i64,
    /// Purchase cost for IN, selling price for OUT.
    pub unit_price: Decimal,
    /// Always `quantity * unit_price`.
    pub total_price: Decimal,
    /// Cost of the lot touched. Equals `unit_price` for IN entries.
    pub unit_cost: Decimal,
    pub movement_date: DateTime<Utc>,
    pub movement: MovementKey,
}

impl LedgerEntry {
    /// Cost of goods carried by this entry (`quantity * unit_cost`).
    pub fn cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }

    /// Signed quantity: positive for IN, negative for OUT.
    pub fn signed_quantity(&self) -> i64 {
        match self.movement_type {
            MovementType::In => self.quantity,
            MovementType::Out => -self.quantity,
        }
    }
}

/// A ledger entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub movement_type: MovementType,
    pub product_id: ProductId,
    pub lot_id: LotId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub movement_date: DateTime<Utc>,
    pub movement: MovementKey,
}

impl NewLedgerEntry {
    /// IN entry mirroring a freshly created lot.
    pub fn inbound(lot: &StockLot) -> Self {
        Self {
            movement_type: MovementType::In,
            product_id: lot.product_id,
            lot_id: lot.id,
            quantity: lot.quantity,
            unit_price: lot.unit_cost,
            unit_cost: lot.unit_cost,
            movement_date: lot.purchase_date,
            movement: lot.source.clone(),
        }
    }

    /// OUT entry for `quantity` units taken from one lot at `unit_price`.
    pub fn outbound(
        product_id: ProductId,
        lot_id: LotId,
        quantity: i64,
        unit_price: Decimal,
        unit_cost: Decimal,
        movement_date: DateTime<Utc>,
        movement: MovementKey,
    ) -> Self {
        Self {
            movement_type: MovementType::Out,
            product_id,
            lot_id,
            quantity,
            unit_price,
            unit_cost,
            movement_date,
            movement,
        }
    }

    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("ledger quantity must be positive"));
        }
        if self.unit_price.is_sign_negative() || self.unit_cost.is_sign_negative() {
            return Err(DomainError::validation("ledger prices cannot be negative"));
        }
        if self.movement_type == MovementType::In && self.unit_price != self.unit_cost {
            return Err(DomainError::invariant(
                "inbound entries are priced at their lot cost",
            ));
        }
        let quantity = Decimal::from(self.quantity);
        if quantity.checked_mul(self.unit_price).is_none() || quantity.checked_mul(self.unit_cost).is_none() {
            return Err(DomainError::validation("ledger amount is out of range"));
        }
        Ok(())
    }

    pub fn into_entry(self, id: LedgerEntryId, sequence: u64) -> LedgerEntry {
        let total_price = self.total_price();
        LedgerEntry {
            id,
            sequence,
            movement_type: self.movement_type,
            product_id: self.product_id,
            lot_id: self.lot_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price,
            unit_cost: self.unit_cost,
            movement_date: self.movement_date,
            movement: self.movement,
        }
    }
}

/// Quantity and valuation of a product obtained by replaying its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunningBalance {
    pub quantity: i64,
    /// Remaining stock valued at lot cost.
    pub value: Decimal,
}

impl RunningBalance {
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> DomainResult<Self> {
        let mut balance = Self::default();
        for entry in entries {
            balance.apply(entry)?;
        }
        Ok(balance)
    }

    /// Fold one entry in. Leaves the balance untouched when it would leave
    /// the representable range.
    pub fn apply(&mut self, entry: &LedgerEntry) -> DomainResult<()> {
        let overflow = || DomainError::invariant(format!("balance of product {} overflows", entry.product_id));

        let quantity = self
            .quantity
            .checked_add(entry.signed_quantity())
            .ok_or_else(overflow)?;
        let value = match entry.movement_type {
            MovementType::In => self.value.checked_add(entry.total_price),
            MovementType::Out => Decimal::from(entry.quantity)
                .checked_mul(entry.unit_cost)
                .and_then(|cost| self.value.checked_sub(cost)),
        }
        .ok_or_else(overflow)?;

        self.quantity = quantity;
        self.value = value;
        Ok(())
    }

    /// Weighted-average unit cost of what is left (zero when nothing is left).
    pub fn average_cost(&self) -> Decimal {
        if self.quantity == 0 {
            Decimal::ZERO
        } else {
            self.value / Decimal::from(self.quantity)
        }
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end < start {
            return Err(DomainError::validation("date range end precedes its start"));
        }
        Ok(Self { start, end })
    }

    /// Range covering every representable instant.
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Gross margin of the OUT entries inside `range`:
/// `sum(total_price - quantity * unit_cost)`.
pub fn earnings<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    range: &DateRange,
) -> DomainResult<Decimal> {
    entries
        .into_iter()
        .filter(|e| e.movement_type == MovementType::Out && range.contains(e.movement_date))
        .try_fold(Decimal::ZERO, |acc, e| {
            Decimal::from(e.quantity)
                .checked_mul(e.unit_cost)
                .and_then(|cost| e.total_price.checked_sub(cost))
                .and_then(|margin| acc.checked_add(margin))
                .ok_or_else(|| DomainError::invariant("earnings overflow"))
        })
}
