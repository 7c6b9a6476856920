//! Token amounts are carried as strings in genesis exports so that no
//! precision is lost on the wire. They are parsed into fixed point decimals
//! rather than floats.

use rust_decimal::Decimal;
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid amount `{input}`")]
pub struct ParseAmountError {
    input: String,
    #[source]
    source: rust_decimal::Error,
}

/// Parse an amount such as `"1000000000000000000000.000000000000000000"`.
///
/// Trailing fractional zeros are dropped first, so that shares rendered with
/// 18 decimals do not eat into the 28 significant digits a [`Decimal`] can
/// hold. Digits beyond those are rounded. Exponent notation (`4.38767e+24`)
/// is accepted as well.
pub fn parse_amount(input: &str) -> Result<Decimal, ParseAmountError> {
    let trimmed = input.trim();
    let parsed = if trimmed.contains(['e', 'E']) {
        Decimal::from_scientific(trimmed)
    } else if trimmed.contains('.') {
        Decimal::from_str(trimmed.trim_end_matches('0').trim_end_matches('.'))
    } else {
        Decimal::from_str(trimmed)
    };
    parsed.map_err(|source| ParseAmountError {
        input: input.to_string(),
        source,
    })
}

pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = String::deserialize(deserializer)?;
    parse_amount(&amount).map_err(D::Error::custom)
}

pub fn serialize_amount<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&amount.normalize())
}
