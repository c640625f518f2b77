use core::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LotId, MovementKey, ProductId, ProviderId};

/// A physical batch of stock for one product.
///
/// A lot whose quantity reached zero is exhausted but kept for audit; it is
/// never deleted once its movement committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLot {
    pub id: LotId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub provider_id: ProviderId,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
    /// Store-assigned creation order; last allocation tie-break.
    pub sequence: u64,
    /// Movement (purchase) that created the lot.
    pub source: MovementKey,
}

impl StockLot {
    pub fn is_exhausted(&self) -> bool {
        self.quantity == 0
    }

    /// True when the lot expires strictly before `date`.
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < date)
    }

    /// Remove `amount` units. Never lets the quantity drop below zero.
    pub fn decrement(&mut self, amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Err(DomainError::validation("decrement amount must be positive"));
        }
        if amount > self.quantity {
            return Err(DomainError::insufficient_stock(
                self.product_id,
                amount,
                self.quantity,
            ));
        }
        self.quantity -= amount;
        Ok(())
    }

    /// Put back `amount` units taken by an uncommitted movement.
    pub fn restore(&mut self, amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Err(DomainError::validation("restore amount must be positive"));
        }
        self.quantity = self
            .quantity
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("lot quantity overflow"))?;
        Ok(())
    }

    /// Value of the remaining units at purchase cost.
    pub fn value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_cost
    }
}

/// A lot that has not been stored yet (no id, no sequence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLot {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub provider_id: ProviderId,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: Option<NaiveDate>,
    pub source: MovementKey,
}

impl NewLot {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("lot quantity must be positive"));
        }
        if self.unit_cost.is_sign_negative() {
            return Err(DomainError::validation("lot unit cost cannot be negative"));
        }
        if Decimal::from(self.quantity).checked_mul(self.unit_cost).is_none() {
            return Err(DomainError::validation("lot value is out of range"));
        }
        Ok(())
    }

    pub fn into_lot(self, id: LotId, sequence: u64) -> StockLot {
        StockLot {
            id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            provider_id: self.provider_id,
            purchase_date: self.purchase_date,
            expiry_date: self.expiry_date,
            sequence,
            source: self.source,
        }
    }
}

/// Allocation order: earliest expiry first (lots without expiry last), then
/// oldest purchase date, then creation sequence.
pub fn allocation_order(a: &StockLot, b: &StockLot) -> Ordering {
    let expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    expiry
        .then_with(|| a.purchase_date.cmp(&b.purchase_date))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

pub fn sort_for_allocation(lots: &mut [StockLot]) {
    lots.sort_by(allocation_order);
}

/// Remaining units across `lots`; fails instead of wrapping past `i64::MAX`.
pub fn total_quantity<'a>(lots: impl IntoIterator<Item = &'a StockLot>) -> DomainResult<i64> {
    lots.into_iter().try_fold(0i64, |acc, lot| {
        acc.checked_add(lot.quantity)
            .ok_or_else(|| DomainError::invariant(format!("stock of product {} overflows", lot.product_id)))
    })
}
