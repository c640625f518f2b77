use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, MovementKey, ProductId, SaleId};

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Credit,
}

/// Sale line: product, quantity, unit selling price and line discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// `quantity * unit_price`, before discount.
    pub subtotal: Decimal,
    pub discount: Decimal,
}

impl SaleLine {
    /// Amount charged for the line.
    pub fn net(&self) -> Decimal {
        self.subtotal.saturating_sub(self.discount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer_name: String,
    pub payment_method: PaymentMethod,
    pub lines: Vec<SaleLine>,
    /// Sum of line nets.
    pub total_amount: Decimal,
    pub sold_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(
        id: SaleId,
        customer_name: impl Into<String>,
        payment_method: PaymentMethod,
        sold_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_name: customer_name.into(),
            payment_method,
            lines: Vec::new(),
            total_amount: Decimal::ZERO,
            sold_at,
        }
    }

    /// Append a line; subtotal and `total_amount` are derived. Out-of-range
    /// amounts saturate and are caught by [`Sale::validate`].
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        unit_price: Decimal,
        discount: Decimal,
    ) -> &mut Self {
        let line = SaleLine {
            line_no: (self.lines.len() as u32) + 1,
            product_id,
            quantity,
            unit_price,
            subtotal: Decimal::from(quantity).saturating_mul(unit_price),
            discount,
        };
        self.total_amount = self.total_amount.saturating_add(line.net());
        self.lines.push(line);
        self
    }

    pub fn movement_key(&self) -> MovementKey {
        MovementKey::from(self.id)
    }

    /// Requested quantity per product, summed across lines.
    pub fn quantities_by_product(&self) -> DomainResult<BTreeMap<ProductId, i64>> {
        let mut out = BTreeMap::new();
        for line in &self.lines {
            let total: &mut i64 = out.entry(line.product_id).or_insert(0);
            *total = total.checked_add(line.quantity).ok_or_else(|| {
                DomainError::validation(format!(
                    "line {}: requested quantity of product {} is out of range",
                    line.line_no, line.product_id
                ))
            })?;
        }
        Ok(out)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name is required"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("sale must have lines"));
        }

        for line in &self.lines {
            let n = line.line_no;
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "line {n}: quantity must be positive"
                )));
            }
            if line.unit_price.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "line {n}: unit price cannot be negative"
                )));
            }
            let Some(subtotal) = Decimal::from(line.quantity).checked_mul(line.unit_price) else {
                return Err(DomainError::validation(format!(
                    "line {n}: amount is out of range"
                )));
            };
            if line.subtotal != subtotal {
                return Err(DomainError::validation(format!(
                    "line {n}: subtotal must equal quantity times unit price"
                )));
            }
            if line.discount.is_sign_negative() || line.discount > line.subtotal {
                return Err(DomainError::validation(format!(
                    "line {n}: discount must be between zero and the subtotal"
                )));
            }
        }

        let expected = self
            .lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.net()))
            .ok_or_else(|| DomainError::validation("sale total is out of range"))?;
        if self.total_amount != expected {
            return Err(DomainError::validation(format!(
                "sale total {} does not match line totals {expected}",
                self.total_amount
            )));
        }

        self.quantities_by_product()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn sale() -> Sale {
        Sale::new(SaleId::new(), "Ana", PaymentMethod::Cash, Utc::now())
    }

    #[test]
    fn lines_derive_subtotal_and_total() {
        let mut s = sale();
        s.add_line(ProductId::new(), 3, dec!(10), dec!(5))
            .add_line(ProductId::new(), 1, dec!(2.5), dec!(0));
        assert_eq!(s.lines[0].subtotal, dec!(30));
        assert_eq!(s.total_amount, dec!(27.5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn blank_customer_is_rejected() {
        let mut s = Sale::new(SaleId::new(), "  ", PaymentMethod::Card, Utc::now());
        s.add_line(ProductId::new(), 1, dec!(1), dec!(0));
        assert!(matches!(s.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn sale_without_lines_is_rejected() {
        assert!(sale().validate().is_err());
    }

    #[test]
    fn discount_above_subtotal_is_rejected() {
        let mut s = sale();
        s.add_line(ProductId::new(), 2, dec!(1), dec!(3));
        assert!(s.validate().is_err());
    }

    #[test]
    fn tampered_subtotal_is_rejected() {
        let mut s = sale();
        s.add_line(ProductId::new(), 2, dec!(4), dec!(0));
        s.lines[0].subtotal = dec!(9);
        s.total_amount = dec!(9);
        assert!(s.validate().is_err());
    }

    #[test]
    fn quantities_are_summed_per_product() {
        let p = ProductId::new();
        let q = ProductId::new();
        let mut s = sale();
        s.add_line(p, 2, dec!(1), dec!(0))
            .add_line(q, 1, dec!(1), dec!(0))
            .add_line(p, 5, dec!(1), dec!(0));
        let by_product = s.quantities_by_product().unwrap();
        assert_eq!(by_product.get(&p), Some(&7));
        assert_eq!(by_product.get(&q), Some(&1));
    }

    #[test]
    fn demand_beyond_i64_is_rejected() {
        let p = ProductId::new();
        let half = i64::MAX / 2 + 1;
        let mut s = sale();
        s.add_line(p, half, dec!(0), dec!(0)).add_line(p, half, dec!(0), dec!(0));

        assert!(matches!(s.validate(), Err(DomainError::Validation(msg)) if msg.contains("out of range")));
        assert!(s.quantities_by_product().is_err());
    }

    #[test]
    fn amounts_beyond_decimal_range_are_rejected() {
        let mut s = sale();
        s.add_line(ProductId::new(), i64::MAX, Decimal::from(100_000_000_000i64), dec!(0));
        assert!(matches!(s.validate(), Err(DomainError::Validation(msg)) if msg.contains("out of range")));
    }

    proptest! {
        #[test]
        fn built_sales_always_validate(
            lines in prop::collection::vec((1i64..50, 0u32..10_000, 0u32..100), 1..8)
        ) {
            let mut s = sale();
            for (qty, cents, pct) in lines {
                let price = Decimal::new(cents as i64, 2);
                let subtotal = Decimal::from(qty) * price;
                let discount = subtotal * Decimal::from(pct) / Decimal::from(100);
                s.add_line(ProductId::new(), qty, price, discount);
            }
            prop_assert!(s.validate().is_ok());
        }
    }
}
