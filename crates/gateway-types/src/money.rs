use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Number of fractional digits the billing mint uses by default (e.g. USDC-style 6 decimals).
pub const DEFAULT_MINT_DECIMALS: u32 = 6;

/// Rounds a price to 6 fractional digits, the precision the 402 challenge
/// body and pricing policy are specified against.
pub fn round_price(amount: Decimal) -> Decimal {
    amount.round_dp(DEFAULT_MINT_DECIMALS)
}

/// Converts a human-readable decimal amount into integer base units for the
/// configured number of mint decimals (e.g. `1.5` at 6 decimals -> `1_500_000`).
pub fn to_base_units(amount: Decimal, decimals: u32) -> Option<i128> {
    let scaled = amount * Decimal::from(10i64.pow(decimals));
    scaled.round().to_i128()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn rounds_to_six_places() {
        let input = Decimal::from_str("0.0015001").unwrap();
        let expected = Decimal::from_str("0.0015").unwrap();
        assert_eq!(round_price(input), expected);
    }

    #[test]
    fn converts_whole_number_to_base_units() {
        assert_eq!(to_base_units(Decimal::from(1), 6), Some(1_000_000));
    }

    #[test]
    fn converts_fractional_amount_to_base_units() {
        let input = Decimal::from_str("0.001").unwrap();
        assert_eq!(to_base_units(input, 6), Some(1_000));
    }
}
