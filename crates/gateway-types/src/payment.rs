use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;

/// Body of a `402 Payment Required` response, per the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    pub error: String,
    pub message: String,
    pub accepts: Vec<PaymentAccept>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccept {
    pub asset: String,
    pub chain: String,
    pub amount: String,
    pub payment_address: Address,
    pub payment_id: Uuid,
    pub scheme: String,
    pub method: String,
}

impl PaymentRequiredBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>, accept: PaymentAccept) -> Self {
        PaymentRequiredBody {
            error: error.into(),
            message: message.into(),
            accepts: vec![accept],
        }
    }
}

/// Decoded `X-Payment` request header value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub tx_signature: String,
    pub payment_id: Uuid,
}

/// Decoded/encoded `X-Payment-Response` response header value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub tx_signature: String,
    pub payment_id: Uuid,
    pub settled: bool,
}

/// Amount, formatted with exactly 6 fractional digits as the wire contract requires.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.6}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn formats_amount_with_six_fractional_digits() {
        let amount = Decimal::from_str("0.0015").unwrap();
        assert_eq!(format_amount(amount), "0.001500");
    }
}
