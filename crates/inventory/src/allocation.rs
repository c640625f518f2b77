//! Allocation engine: decides which lots a sale draws from.
//!
//! Allocation is pure. It reads a snapshot of lots and produces a plan; the
//! caller applies the plan to the lot store inside its critical section.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LotId, ProductId};

use crate::lot::{StockLot, allocation_order, total_quantity};

/// Knobs for lot eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Lots expiring strictly before this date are not eligible.
    pub skip_expired_before: Option<NaiveDate>,
}

/// One fragment of a plan: `quantity` units taken from `lot_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub lot_id: LotId,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

/// Ordered list of lot fragments satisfying one requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub product_id: ProductId,
    pub requested: i64,
    pub lines: Vec<AllocationLine>,
}

impl AllocationPlan {
    pub fn total_taken(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Cost of goods for the plan at lot cost.
    pub fn cost(&self) -> Decimal {
        self.lines
            .iter()
            .map(|l| Decimal::from(l.quantity) * l.unit_cost)
            .sum()
    }

    /// Deduct the plan from a lot snapshot (used to chain several plans for
    /// the same product).
    pub fn deduct_from(&self, lots: &mut [StockLot]) -> DomainResult<()> {
        for line in &self.lines {
            let lot = lots
                .iter_mut()
                .find(|l| l.id == line.lot_id)
                .ok_or_else(|| DomainError::not_found(format!("lot {}", line.lot_id)))?;
            lot.decrement(line.quantity)?;
        }
        Ok(())
    }
}

fn is_eligible(lot: &StockLot, policy: &AllocationPolicy) -> bool {
    if lot.quantity <= 0 {
        return false;
    }
    match policy.skip_expired_before {
        Some(date) => !lot.is_expired_on(date),
        None => true,
    }
}

/// Plan `requested` units of `product_id` from `lots`.
///
/// Lots are consumed greedily in allocation order (earliest expiry, then
/// purchase date, then creation sequence). Fails with `InsufficientStock`
/// and returns no plan when the eligible lots cannot cover the request.
pub fn allocate(
    product_id: ProductId,
    requested: i64,
    lots: &[StockLot],
    policy: &AllocationPolicy,
) -> DomainResult<AllocationPlan> {
    if requested <= 0 {
        return Err(DomainError::validation("requested quantity must be positive"));
    }

    let mut eligible: Vec<&StockLot> = Vec::with_capacity(lots.len());
    for lot in lots {
        if lot.product_id != product_id {
            return Err(DomainError::invariant(format!(
                "lot {} belongs to product {}, not {product_id}",
                lot.id, lot.product_id
            )));
        }
        if is_eligible(lot, policy) {
            eligible.push(lot);
        }
    }

    let available = total_quantity(eligible.iter().copied())?;
    if available < requested {
        return Err(DomainError::insufficient_stock(product_id, requested, available));
    }

    eligible.sort_by(|a, b| allocation_order(a, b));

    let mut remaining = requested;
    let mut lines = Vec::new();
    for lot in eligible {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(lot.quantity);
        lines.push(AllocationLine {
            lot_id: lot.id,
            quantity: take,
            unit_cost: lot.unit_cost,
        });
        remaining -= take;
    }

    Ok(AllocationPlan {
        product_id,
        requested,
        lines,
    })
}

/// Plan several requests at once, in request order.
///
/// Requests for the same product draw from the same lots one after the
/// other. Availability is checked per product up front, so a shortage is
/// reported with the product's total demand and nothing is planned.
pub fn allocate_many(
    requests: &[(ProductId, i64)],
    lots_by_product: &BTreeMap<ProductId, Vec<StockLot>>,
    policy: &AllocationPolicy,
) -> DomainResult<Vec<AllocationPlan>> {
    let mut demand: BTreeMap<ProductId, i64> = BTreeMap::new();
    for (product_id, qty) in requests {
        if *qty <= 0 {
            return Err(DomainError::validation("requested quantity must be positive"));
        }
        let total = demand.entry(*product_id).or_default();
        *total = total.checked_add(*qty).ok_or_else(|| {
            DomainError::validation(format!("requested quantity of product {product_id} is out of range"))
        })?;
    }

    for (product_id, total) in &demand {
        let available = match lots_by_product.get(product_id) {
            Some(lots) => total_quantity(lots.iter().filter(|l| is_eligible(l, policy)))?,
            None => 0,
        };
        if available < *total {
            return Err(DomainError::insufficient_stock(*product_id, *total, available));
        }
    }

    let mut working = lots_by_product.clone();
    let mut plans = Vec::with_capacity(requests.len());
    for (product_id, qty) in requests {
        let lots = working.entry(*product_id).or_default();
        let plan = allocate(*product_id, *qty, lots, policy)?;
        plan.deduct_from(lots)?;
        plans.push(plan);
    }

    Ok(plans)
}
