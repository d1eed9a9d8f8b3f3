//! Rounding policy and boundary validation for quantities, costs and money.
//!
//! Quantities and unit costs carry 4 decimal places (fractional units such as
//! weighed goods), monetary totals carry 2. Rounding is applied once, at the
//! end of a computation — never on intermediates, so repeated small movements
//! do not accumulate rounding drift.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Decimal places kept on on-hand quantities.
pub const QUANTITY_DP: u32 = 4;

/// Decimal places kept on unit costs (including the weighted average).
pub const COST_DP: u32 = 4;

/// Decimal places kept on monetary totals.
pub const MONEY_DP: u32 = 2;

pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp(QUANTITY_DP)
}

pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp(COST_DP)
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp(MONEY_DP)
}

/// Reject negative values at the domain boundary.
pub fn non_negative(value: Decimal, what: &str) -> DomainResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::invalid_input(format!(
            "{what} must not be negative (got {value})"
        )));
    }
    Ok(value)
}

/// Reject zero or negative values at the domain boundary.
pub fn positive(value: Decimal, what: &str) -> DomainResult<Decimal> {
    if value <= Decimal::ZERO {
        return Err(DomainError::invalid_input(format!(
            "{what} must be positive (got {value})"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantity_rounds_to_four_places() {
        assert_eq!(round_quantity(dec!(1.23456)), dec!(1.2346));
        assert_eq!(round_quantity(dec!(1.2)), dec!(1.2));
    }

    #[test]
    fn money_rounds_to_two_places() {
        // round_dp uses banker's rounding at the midpoint.
        assert_eq!(round_money(dec!(10.005)), dec!(10.00));
        assert_eq!(round_money(dec!(10.015)), dec!(10.02));
        assert_eq!(round_money(dec!(10.016)), dec!(10.02));
    }

    #[test]
    fn non_negative_rejects_negative() {
        assert!(non_negative(dec!(-0.0001), "quantity").is_err());
        assert!(non_negative(Decimal::ZERO, "quantity").is_ok());
    }

    #[test]
    fn positive_rejects_zero() {
        assert!(positive(Decimal::ZERO, "magnitude").is_err());
        assert!(positive(dec!(0.0001), "magnitude").is_ok());
    }
}
