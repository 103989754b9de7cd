//! Money Validation Module
//!
//! Balances and amounts are `rust_decimal::Decimal` values with exactly two
//! fractional digits, matching the `NUMERIC(18,2)` columns in the store.
//! Every amount entering the engine goes through [`validate_amount`].

use rust_decimal::Decimal;

use crate::error::WalletError;

/// Fractional digits carried by every balance and amount.
pub const MONEY_SCALE: u32 = 2;

/// Exclusive upper bound of `NUMERIC(18,2)`: 10^18 units of 0.01.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 2);

/// Validate a client amount and normalize it to two fractional digits.
///
/// # Errors
/// * `InvalidAmount` - zero, negative, more than two fractional digits,
///   or beyond the column range
pub fn validate_amount(amount: Decimal) -> Result<Decimal, WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount);
    }

    // "60.100" is fine, "60.001" is not
    let mut normalized = amount.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err(WalletError::InvalidAmount);
    }
    if normalized >= MAX_AMOUNT {
        return Err(WalletError::InvalidAmount);
    }

    normalized.rescale(MONEY_SCALE);
    Ok(normalized)
}

/// Zero with the canonical money scale (`0.00`).
pub fn zero() -> Decimal {
    Decimal::new(0, MONEY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[rstest]
    #[case("60", "60.00")]
    #[case("0.01", "0.01")]
    #[case("60.100", "60.10")]
    #[case("1234.5", "1234.50")]
    fn accepts_two_digit_amounts(#[case] input: &str, #[case] expected: &str) {
        let amount = validate_amount(dec(input)).unwrap();
        assert_eq!(amount.to_string(), expected);
        assert_eq!(amount.scale(), MONEY_SCALE);
    }

    #[rstest]
    #[case("0")]
    #[case("0.00")]
    #[case("-5")]
    #[case("0.001")]
    #[case("10.555")]
    #[case("10000000000000000")]
    fn rejects_invalid_amounts(#[case] input: &str) {
        assert!(matches!(
            validate_amount(dec(input)),
            Err(WalletError::InvalidAmount)
        ));
    }

    #[test]
    fn max_amount_matches_numeric_18_2() {
        assert_eq!(MAX_AMOUNT, dec("10000000000000000.00"));
    }

    #[test]
    fn zero_has_money_scale() {
        assert_eq!(zero().to_string(), "0.00");
    }
}
