//! Coupon eligibility and discount rules.
//!
//! A coupon is a percentage discount on the products it applies to, capped
//! at `up_to_amount`, usable once per customer while active and in date.
//! The same evaluation backs the coupon preview endpoint and checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::{ProductId, round_money};

/// One priced line of a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::line_total).sum()
}

/// The parts of a stored coupon that decide whether and how much it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponTerms {
    /// Percentage off, in `(0, 100]`.
    pub discount_percent: Decimal,
    /// Order subtotal required before the coupon applies.
    pub minimum_amount: Decimal,
    /// Largest discount the coupon may give.
    pub up_to_amount: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    /// Products the coupon is restricted to. Empty means every product.
    pub product_ids: Vec<ProductId>,
}

/// Invalid coupon definition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponTermsError {
    #[error("discount must be greater than 0 and at most 100 percent")]
    DiscountOutOfRange,
    #[error("minimum amount cannot be negative")]
    NegativeMinimum,
    #[error("up-to amount must be greater than 0")]
    NonPositiveCap,
    #[error("start date must not be after end date")]
    DatesReversed,
}

/// Why a coupon cannot be applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon has already been used")]
    AlreadyUsed,
    #[error("order total must be at least {minimum} to use this coupon")]
    BelowMinimum { minimum: Decimal },
    #[error("coupon does not apply to any product in this order")]
    NotApplicable,
}

/// Result of applying a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CouponDiscount {
    /// Subtotal of the lines the coupon covers.
    pub eligible_subtotal: Decimal,
    /// Amount taken off the order.
    pub discount: Decimal,
}

impl CouponTerms {
    /// Check a coupon definition before it is stored.
    ///
    /// # Errors
    ///
    /// Returns the first rule the terms break.
    pub fn validate(&self) -> Result<(), CouponTermsError> {
        if self.discount_percent <= Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err(CouponTermsError::DiscountOutOfRange);
        }
        if self.minimum_amount.is_sign_negative() {
            return Err(CouponTermsError::NegativeMinimum);
        }
        if self.up_to_amount <= Decimal::ZERO {
            return Err(CouponTermsError::NonPositiveCap);
        }
        if self.starts_at > self.ends_at {
            return Err(CouponTermsError::DatesReversed);
        }
        Ok(())
    }

    fn covers(&self, product_id: ProductId) -> bool {
        self.product_ids.is_empty() || self.product_ids.contains(&product_id)
    }

    /// Evaluate the coupon against priced lines.
    ///
    /// Checks run in a fixed order so the customer sees the most relevant
    /// reason: activity, date window, prior use, minimum amount, scope.
    ///
    /// # Errors
    ///
    /// Returns the `CouponRejection` for the first failing check.
    pub fn evaluate(
        &self,
        lines: &[OrderLine],
        already_used: bool,
        now: DateTime<Utc>,
    ) -> Result<CouponDiscount, CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.starts_at {
            return Err(CouponRejection::NotStarted);
        }
        if now > self.ends_at {
            return Err(CouponRejection::Expired);
        }
        if already_used {
            return Err(CouponRejection::AlreadyUsed);
        }
        if subtotal(lines) < self.minimum_amount {
            return Err(CouponRejection::BelowMinimum {
                minimum: self.minimum_amount,
            });
        }

        let eligible_subtotal: Decimal = lines
            .iter()
            .filter(|line| self.covers(line.product_id))
            .map(OrderLine::line_total)
            .sum();
        if eligible_subtotal <= Decimal::ZERO {
            return Err(CouponRejection::NotApplicable);
        }

        let raw = eligible_subtotal * self.discount_percent / Decimal::ONE_HUNDRED;
        let discount = round_money(raw.min(self.up_to_amount).min(eligible_subtotal));

        Ok(CouponDiscount {
            eligible_subtotal,
            discount,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn terms(now: DateTime<Utc>) -> CouponTerms {
        CouponTerms {
            discount_percent: dec("10"),
            minimum_amount: dec("500"),
            up_to_amount: dec("150"),
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
            product_ids: Vec::new(),
        }
    }

    fn line(product: i32, quantity: i32, price: &str) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product),
            quantity,
            unit_price: dec(price),
        }
    }

    #[test]
    fn test_percentage_discount() {
        let now = Utc::now();
        let lines = [line(1, 2, "300"), line(2, 1, "99.50")];
        let result = terms(now).evaluate(&lines, false, now).unwrap();
        assert_eq!(result.eligible_subtotal, dec("699.50"));
        assert_eq!(result.discount, dec("69.95"));
    }

    #[test]
    fn test_discount_capped_at_up_to_amount() {
        let now = Utc::now();
        let lines = [line(1, 5, "1000")];
        let result = terms(now).evaluate(&lines, false, now).unwrap();
        assert_eq!(result.discount, dec("150"));
    }

    #[test]
    fn test_scope_limits_eligible_lines() {
        let now = Utc::now();
        let mut scoped = terms(now);
        scoped.product_ids = vec![ProductId::new(2)];
        let lines = [line(1, 1, "800"), line(2, 1, "200")];

        let result = scoped.evaluate(&lines, false, now).unwrap();
        assert_eq!(result.eligible_subtotal, dec("200"));
        assert_eq!(result.discount, dec("20"));

        scoped.product_ids = vec![ProductId::new(9)];
        assert_eq!(
            scoped.evaluate(&lines, false, now),
            Err(CouponRejection::NotApplicable)
        );
    }

    #[test]
    fn test_rejections_in_order() {
        let now = Utc::now();
        let lines = [line(1, 1, "600")];

        let mut inactive = terms(now);
        inactive.is_active = false;
        assert_eq!(
            inactive.evaluate(&lines, true, now),
            Err(CouponRejection::Inactive)
        );

        let upcoming = CouponTerms {
            starts_at: now + Duration::hours(1),
            ends_at: now + Duration::days(2),
            ..terms(now)
        };
        assert_eq!(
            upcoming.evaluate(&lines, false, now),
            Err(CouponRejection::NotStarted)
        );

        let expired = CouponTerms {
            ends_at: now - Duration::seconds(1),
            ..terms(now)
        };
        assert_eq!(
            expired.evaluate(&lines, false, now),
            Err(CouponRejection::Expired)
        );

        assert_eq!(
            terms(now).evaluate(&lines, true, now),
            Err(CouponRejection::AlreadyUsed)
        );

        assert_eq!(
            terms(now).evaluate(&[line(1, 1, "499.99")], false, now),
            Err(CouponRejection::BelowMinimum {
                minimum: dec("500")
            })
        );
    }

    #[test]
    fn test_validate_terms() {
        let now = Utc::now();
        assert!(terms(now).validate().is_ok());

        let over = CouponTerms {
            discount_percent: dec("100.01"),
            ..terms(now)
        };
        assert_eq!(over.validate(), Err(CouponTermsError::DiscountOutOfRange));

        let reversed = CouponTerms {
            starts_at: now + Duration::days(3),
            ..terms(now)
        };
        assert_eq!(reversed.validate(), Err(CouponTermsError::DatesReversed));

        let no_cap = CouponTerms {
            up_to_amount: Decimal::ZERO,
            ..terms(now)
        };
        assert_eq!(no_cap.validate(), Err(CouponTermsError::NonPositiveCap));
    }

    #[test]
    fn test_subtotal() {
        assert_eq!(subtotal(&[]), Decimal::ZERO);
        assert_eq!(
            subtotal(&[line(1, 3, "19.99"), line(2, 1, "0.03")]),
            dec("60.00")
        );
    }
}
