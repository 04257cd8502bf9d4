//! Money helpers.
//!
//! Amounts are `Decimal` in major units (rupees) everywhere except at the
//! payment gateway boundary, which wants integer minor units (paise).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a major-unit amount into minor units.
///
/// Returns `None` for negative amounts or values that do not fit in `i64`.
///
/// ```
/// use bazaar_core::to_minor_units;
/// use rust_decimal::Decimal;
///
/// assert_eq!(to_minor_units(Decimal::new(49_950, 2)), Some(49_950));
/// ```
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (round_money(amount) * Decimal::ONE_HUNDRED).to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1_001, 2));
        assert_eq!(round_money(Decimal::new(10_004, 3)), Decimal::new(1_000, 2));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(1, 0)), Some(100));
        assert_eq!(to_minor_units(Decimal::new(1999, 2)), Some(1999));
        assert_eq!(to_minor_units(Decimal::new(12_345, 3)), Some(1235));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
        assert_eq!(to_minor_units(Decimal::new(-1, 0)), None);
    }
}
