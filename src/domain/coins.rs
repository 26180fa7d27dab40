use crate::error::{DisbursementError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of nano units in one display unit.
pub const NANO_PER_UNIT: u128 = 1_000_000_000;

/// A non-negative amount of value, counted in nano units.
///
/// All arithmetic is checked. Accounting code must never wrap or saturate
/// silently, so every operation that can overflow returns a `Result`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coins(u128);

impl Coins {
    pub const ZERO: Self = Self(0);

    pub const fn from_nano(nano: u128) -> Self {
        Self(nano)
    }

    pub const fn nano(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts a decimal display amount (e.g. `0.1`) into nano units.
    ///
    /// Negative amounts and amounts finer than one nano unit are rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DisbursementError::ValidationError(format!(
                "amount must not be negative: {value}"
            )));
        }
        let scaled = value
            .checked_mul(Decimal::from(NANO_PER_UNIT as u64))
            .ok_or(DisbursementError::ArithmeticOverflow("nano conversion"))?;
        if !scaled.fract().is_zero() {
            return Err(DisbursementError::ValidationError(format!(
                "amount has more than 9 decimal places: {value}"
            )));
        }
        let nano = scaled.to_u128().ok_or_else(|| {
            DisbursementError::ValidationError(format!("amount out of range: {value}"))
        })?;
        Ok(Self(nano))
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(DisbursementError::ArithmeticOverflow("coin addition"))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(DisbursementError::ArithmeticOverflow("coin subtraction"))
    }

    pub fn checked_mul(self, factor: u128) -> Result<Self> {
        self.0
            .checked_mul(factor)
            .map(Self)
            .ok_or(DisbursementError::ArithmeticOverflow("coin multiplication"))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Sums an iterator of amounts, failing on overflow.
    pub fn checked_sum<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = Coins>,
    {
        iter.into_iter()
            .try_fold(Coins::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl TryFrom<Decimal> for Coins {
    type Error = DisbursementError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::from_decimal(value)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / NANO_PER_UNIT;
        let fraction = self.0 % NANO_PER_UNIT;
        if fraction == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{fraction:09}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_decimal() {
        assert_eq!(
            Coins::from_decimal(dec!(0.1)).unwrap(),
            Coins::from_nano(100_000_000)
        );
        assert_eq!(
            Coins::from_decimal(dec!(32385)).unwrap().nano(),
            32_385 * NANO_PER_UNIT
        );
        assert_eq!(Coins::from_decimal(dec!(0)).unwrap(), Coins::ZERO);
    }

    #[test]
    fn test_from_decimal_rejects_invalid() {
        assert!(matches!(
            Coins::from_decimal(dec!(-1.0)),
            Err(DisbursementError::ValidationError(_))
        ));
        assert!(matches!(
            Coins::from_decimal(dec!(0.0000000001)),
            Err(DisbursementError::ValidationError(_))
        ));
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Coins::from_nano(10);
        let b = Coins::from_nano(4);
        assert_eq!(a.checked_add(b).unwrap(), Coins::from_nano(14));
        assert_eq!(a.checked_sub(b).unwrap(), Coins::from_nano(6));
        assert!(matches!(
            b.checked_sub(a),
            Err(DisbursementError::ArithmeticOverflow(_))
        ));
        assert!(Coins::from_nano(u128::MAX).checked_add(b).is_err());
        assert_eq!(a.saturating_sub(Coins::from_nano(20)), Coins::ZERO);
    }

    #[test]
    fn test_checked_sum() {
        let amounts = [Coins::from_nano(1), Coins::from_nano(2), Coins::from_nano(3)];
        assert_eq!(Coins::checked_sum(amounts).unwrap(), Coins::from_nano(6));
        assert!(Coins::checked_sum([Coins::from_nano(u128::MAX), Coins::from_nano(1)]).is_err());
    }

    #[test]
    fn test_display_trims_zeros() {
        assert_eq!(Coins::from_decimal(dec!(1.1)).unwrap().to_string(), "1.1");
        assert_eq!(Coins::from_decimal(dec!(25.5)).unwrap().to_string(), "25.5");
        assert_eq!(Coins::from_nano(3 * NANO_PER_UNIT).to_string(), "3");
        assert_eq!(Coins::from_nano(1).to_string(), "0.000000001");
    }
}
