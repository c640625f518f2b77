use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, MovementKey, ProductId, ProviderId, PurchaseId};

/// Purchase line: one product received at one unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub expiry_date: Option<NaiveDate>,
}

impl PurchaseLine {
    /// `quantity * unit_price`, or `None` outside the decimal range.
    pub fn extension(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }
}

/// Purchase document: goods received from one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub provider_id: ProviderId,
    pub lines: Vec<PurchaseLine>,
    /// Sum of line extensions.
    pub total: Decimal,
    pub cancelled: bool,
    pub purchased_at: DateTime<Utc>,
}

impl Purchase {
    /// Empty purchase; add lines with [`Purchase::add_line`].
    pub fn new(id: PurchaseId, provider_id: ProviderId, purchased_at: DateTime<Utc>) -> Self {
        Self {
            id,
            provider_id,
            lines: Vec::new(),
            total: Decimal::ZERO,
            cancelled: false,
            purchased_at,
        }
    }

    /// Append a line and keep `total` in step. Out-of-range amounts saturate
    /// and are caught by [`Purchase::validate`].
    pub fn add_line(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        unit_price: Decimal,
        expiry_date: Option<NaiveDate>,
    ) -> &mut Self {
        let line = PurchaseLine {
            line_no: (self.lines.len() as u32) + 1,
            product_id,
            quantity,
            unit_price,
            expiry_date,
        };
        let extension = Decimal::from(quantity).saturating_mul(unit_price);
        self.total = self.total.saturating_add(extension);
        self.lines.push(line);
        self
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn movement_key(&self) -> MovementKey {
        MovementKey::from(self.id)
    }

    pub fn computed_total(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.extension()?))
    }

    /// Shape checks done before any store access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.cancelled {
            return Err(DomainError::validation("cancelled purchases cannot be recorded"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("purchase must have lines"));
        }

        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "line {}: quantity must be positive",
                    line.line_no
                )));
            }
            if line.unit_price.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "line {}: unit price cannot be negative",
                    line.line_no
                )));
            }
            if line.extension().is_none() {
                return Err(DomainError::validation(format!(
                    "line {}: amount is out of range",
                    line.line_no
                )));
            }
            if let Some(expiry) = line.expiry_date {
                if expiry < self.purchased_at.date_naive() {
                    return Err(DomainError::validation(format!(
                        "line {}: goods already expired on arrival",
                        line.line_no
                    )));
                }
            }
        }

        let expected = self
            .computed_total()
            .ok_or_else(|| DomainError::validation("purchase total is out of range"))?;
        if self.total != expected {
            return Err(DomainError::validation(format!(
                "purchase total {} does not match line extensions {expected}",
                self.total
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn purchased_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    fn purchase() -> Purchase {
        let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), purchased_at());
        p.add_line(ProductId::new(), 10, dec!(1.25), None)
            .add_line(ProductId::new(), 4, dec!(3), NaiveDate::from_ymd_opt(2024, 6, 1));
        p
    }

    #[test]
    fn add_line_numbers_lines_and_tracks_total() {
        let p = purchase();
        assert_eq!(p.lines[0].line_no, 1);
        assert_eq!(p.lines[1].line_no, 2);
        assert_eq!(p.total, dec!(24.5));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn cancelled_purchase_is_rejected() {
        let mut p = purchase();
        p.cancel();
        assert!(matches!(p.validate(), Err(DomainError::Validation(msg)) if msg.contains("cancelled")));
    }

    #[test]
    fn empty_purchase_is_rejected() {
        let p = Purchase::new(PurchaseId::new(), ProviderId::new(), purchased_at());
        assert!(p.validate().is_err());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut p = purchase();
        p.lines[0].quantity = 0;
        p.total = p.computed_total().unwrap();
        assert!(matches!(p.validate(), Err(DomainError::Validation(msg)) if msg.starts_with("line 1")));
    }

    #[test]
    fn mismatched_total_is_rejected() {
        let mut p = purchase();
        p.total = dec!(1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn goods_expired_on_arrival_are_rejected() {
        let mut p = purchase();
        p.lines[1].expiry_date = NaiveDate::from_ymd_opt(2024, 1, 9);
        assert!(p.validate().is_err());
    }

    #[test]
    fn amounts_beyond_decimal_range_are_rejected() {
        let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), purchased_at());
        p.add_line(ProductId::new(), i64::MAX, Decimal::from(100_000_000_000i64), None);
        assert!(matches!(p.validate(), Err(DomainError::Validation(msg)) if msg.contains("out of range")));

        // Each line fits, their sum does not.
        let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), purchased_at());
        p.add_line(ProductId::new(), i64::MAX, Decimal::from(5_000_000_000i64), None)
            .add_line(ProductId::new(), i64::MAX, Decimal::from(5_000_000_000i64), None);
        assert!(matches!(p.validate(), Err(DomainError::Validation(msg)) if msg.contains("out of range")));
    }

    #[test]
    fn movement_key_follows_document_id() {
        let p = purchase();
        assert_eq!(p.movement_key(), MovementKey::from(p.id));
    }

    proptest! {
        /// A purchase built line by line always carries the sum of its
        /// extensions and passes validation.
        #[test]
        fn built_purchases_always_validate(
            lines in prop::collection::vec((1i64..500, 0i64..100_000), 1..10)
        ) {
            let mut p = Purchase::new(PurchaseId::new(), ProviderId::new(), purchased_at());
            for (qty, cents) in &lines {
                p.add_line(ProductId::new(), *qty, Decimal::new(*cents, 2), None);
            }
            let expected: Decimal = lines
                .iter()
                .map(|(qty, cents)| Decimal::from(*qty) * Decimal::new(*cents, 2))
                .sum();
            prop_assert_eq!(p.total, expected);
            prop_assert!(p.validate().is_ok());
        }
    }
}
