use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::PayError;

/// Rounds a major-unit amount to 2 decimal places, half-up.
pub fn round_half_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts a major-unit amount to the gateway's minor-unit integer
/// representation (cents). Truncates any sub-cent remainder; callers are
/// expected to pass amounts already rounded to 2 decimals.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PayError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.trunc())
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| PayError::Validation(format!("Amount not representable in cents: {amount}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_up_at_midpoint() {
        assert_eq!(round_half_up(dec!(8.005)), dec!(8.01));
        assert_eq!(round_half_up(dec!(8.004)), dec!(8.00));
        assert_eq!(round_half_up(dec!(10.00)), dec!(10.00));
    }

    #[test]
    fn driver_share_examples() {
        // 10.005 * 0.80 = 8.004 -> 8.00
        assert_eq!(round_half_up(dec!(10.005) * dec!(0.80)), dec!(8.00));
        // 12.50 * 0.80 = 10.00
        assert_eq!(round_half_up(dec!(12.50) * dec!(0.80)), dec!(10.00));
    }

    #[test]
    fn minor_units_truncate() {
        assert_eq!(to_minor_units(dec!(25.00)).unwrap(), 2500);
        assert_eq!(to_minor_units(dec!(0.999)).unwrap(), 99);
        assert_eq!(to_minor_units(dec!(0.50)).unwrap(), 50);
        assert_eq!(to_minor_units(dec!(0.004)).unwrap(), 0);
    }

    #[test]
    fn minor_units_overflow_is_an_error() {
        assert!(to_minor_units(Decimal::MAX).is_err());
    }
}
