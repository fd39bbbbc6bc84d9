//! COP/USD conversion with a single exchange rate per computation.
//!
//! `convert` is exact (no rounding) so converted values can be summed;
//! rounding to the currency's smallest unit happens once, on the final
//! figure, through `round_to_unit` or `convert_rounded`.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::EngineConfig;
use crate::error::BizFinError;
use crate::types::{Amount, Currency, Money};
use crate::BizFinResult;

/// Rounds half-up to the smallest unit of `currency`.
pub fn round_to_unit(amount: Money, currency: Currency) -> Money {
    amount.round_dp_with_strategy(
        currency.minor_unit_scale(),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Truncates toward zero at the smallest unit of `currency`.
pub fn truncate_to_unit(amount: Money, currency: Currency) -> Money {
    amount.round_dp_with_strategy(currency.minor_unit_scale(), RoundingStrategy::ToZero)
}

/// Converter bound to one COP-per-USD rate for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyConverter {
    cop_per_usd: Decimal,
}

impl CurrencyConverter {
    pub fn new(cop_per_usd: Decimal) -> BizFinResult<Self> {
        if cop_per_usd <= Decimal::ZERO {
            return Err(BizFinError::InvalidInput {
                field: "cop_per_usd".into(),
                reason: "Exchange rate must be positive".into(),
            });
        }
        Ok(Self { cop_per_usd })
    }

    pub fn from_config(config: &EngineConfig) -> BizFinResult<Self> {
        Self::new(config.cop_per_usd)
    }

    pub fn rate(&self) -> Decimal {
        self.cop_per_usd
    }

    /// Exact conversion. Identity when `from == to`. Fails instead of
    /// overflowing the decimal range.
    pub fn convert(&self, amount: Money, from: Currency, to: Currency) -> BizFinResult<Money> {
        let converted = match (from, to) {
            (Currency::COP, Currency::COP) | (Currency::USD, Currency::USD) => Some(amount),
            (Currency::USD, Currency::COP) => amount.checked_mul(self.cop_per_usd),
            (Currency::COP, Currency::USD) => amount.checked_div(self.cop_per_usd),
        };
        converted.ok_or_else(|| BizFinError::InvalidInput {
            field: "amount".into(),
            reason: format!("{amount} {from} is out of range when converted to {to}"),
        })
    }

    /// Conversion rounded to the target currency's smallest unit.
    pub fn convert_rounded(&self, amount: Money, from: Currency, to: Currency) -> BizFinResult<Money> {
        if from == to {
            return Ok(amount);
        }
        Ok(round_to_unit(self.convert(amount, from, to)?, to))
    }

    pub fn convert_amount(&self, amount: Amount, to: Currency) -> BizFinResult<Amount> {
        Ok(Amount::new(self.convert(amount.value, amount.currency, to)?, to))
    }

    /// Converts every amount into `to`, sums exactly, rounds once.
    pub fn sum_in<I>(&self, amounts: I, to: Currency) -> BizFinResult<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        let mut total = Amount::zero(to);
        for amount in amounts {
            total = total.checked_add(self.convert_amount(amount, to)?)?;
        }
        Ok(Amount::new(round_to_unit(total.value, to), to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new(dec!(4000)).unwrap()
    }

    #[test]
    fn test_identity_is_exact() {
        let c = converter();
        assert_eq!(c.convert(dec!(123.456), Currency::USD, Currency::USD).unwrap(), dec!(123.456));
        assert_eq!(
            c.convert_rounded(dec!(0.001), Currency::COP, Currency::COP).unwrap(),
            dec!(0.001)
        );
    }

    #[test]
    fn test_usd_to_cop() {
        let c = converter();
        assert_eq!(c.convert(dec!(25.50), Currency::USD, Currency::COP).unwrap(), dec!(102000));
    }

    #[test]
    fn test_cop_to_usd_rounded_half_up() {
        let c = converter();
        // 10_020 / 4000 = 2.505 -> 2.51
        assert_eq!(
            c.convert_rounded(dec!(10020), Currency::COP, Currency::USD).unwrap(),
            dec!(2.51)
        );
        // 10_019 / 4000 = 2.50475 -> 2.50
        assert_eq!(
            c.convert_rounded(dec!(10019), Currency::COP, Currency::USD).unwrap(),
            dec!(2.50)
        );
    }

    #[test]
    fn test_round_to_unit_cop_is_integer() {
        assert_eq!(round_to_unit(dec!(1500.5), Currency::COP), dec!(1501));
        assert_eq!(round_to_unit(dec!(1500.49), Currency::COP), dec!(1500));
    }

    #[test]
    fn test_truncate_to_unit() {
        assert_eq!(truncate_to_unit(dec!(33.339), Currency::USD), dec!(33.33));
        assert_eq!(truncate_to_unit(dec!(333333.99), Currency::COP), dec!(333333));
    }

    #[test]
    fn test_sum_in_rounds_once() {
        let c = converter();
        // Three amounts of 0.004 USD are 16 COP each; rounding each to 0.00 USD
        // first would lose them entirely.
        let amounts = vec![
            Amount::new(dec!(16), Currency::COP),
            Amount::new(dec!(16), Currency::COP),
            Amount::new(dec!(16), Currency::COP),
        ];
        let total = c.sum_in(amounts, Currency::USD).unwrap();
        assert_eq!(total.value, dec!(0.01));
        assert_eq!(total.currency, Currency::USD);
    }

    #[test]
    fn test_out_of_range_conversion_is_an_error() {
        let c = converter();
        let err = c.convert(Decimal::MAX, Currency::USD, Currency::COP).unwrap_err();
        assert!(matches!(err, BizFinError::InvalidInput { ref field, .. } if field == "amount"));
        // a rate below one makes the division grow
        let cheap = CurrencyConverter::new(dec!(0.0001)).unwrap();
        assert!(cheap.convert(Decimal::MAX, Currency::COP, Currency::USD).is_err());
        assert!(c.convert_amount(Amount::new(Decimal::MAX, Currency::USD), Currency::COP).is_err());
    }

    #[test]
    fn test_non_positive_rate_rejected() {
        assert!(CurrencyConverter::new(Decimal::ZERO).is_err());
        assert!(CurrencyConverter::new(dec!(-1)).is_err());
    }

    proptest! {
        #[test]
        fn prop_cop_usd_round_trip_within_one_unit(pesos in 0i64..1_000_000_000_000i64, rate_cents in 100_000i64..800_000i64) {
            let c = CurrencyConverter::new(Decimal::new(rate_cents, 2)).unwrap();
            let x = Decimal::from(pesos);
            let usd = c.convert(x, Currency::COP, Currency::USD).unwrap();
            let back = round_to_unit(c.convert(usd, Currency::USD, Currency::COP).unwrap(), Currency::COP);
            prop_assert!((back - x).abs() <= Decimal::ONE);
        }
    }
}
