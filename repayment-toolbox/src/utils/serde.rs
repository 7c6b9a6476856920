//! Serde helpers for amounts that must not go through a float.

/// A [`Decimal`](rust_decimal::Decimal) written as an exact JSON number
/// literal. Reading accepts integers, decimals and exponent notation, which
/// is how float totals look in artifacts produced by other tools.
pub mod decimal_number {
    use genesis_lib::amount::parse_amount;
    use rust_decimal::Decimal;
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Number;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let number: Number =
            serde_json::from_str(&value.normalize().to_string()).map_err(S::Error::custom)?;
        number.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = Number::deserialize(deserializer)?;
        parse_amount(&number.to_string()).map_err(D::Error::custom)
    }
}

/// Values rendered through their `Display` impl as JSON strings, like the
/// integer amounts and heights of Cosmos SDK transactions.
pub mod display_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Amount {
        #[serde(with = "super::decimal_number")]
        value: Decimal,
    }

    #[test]
    fn decimals_are_written_as_exact_numbers() {
        let amount = Amount {
            value: dec!(4387670724281231000000001.5000),
        };
        assert_eq!(
            serde_json::to_string(&amount).unwrap(),
            r#"{"value":4387670724281231000000001.5}"#
        );
    }

    #[test]
    fn float_totals_are_accepted() {
        let amount: Amount = serde_json::from_str(r#"{"value": 4.387670724281231e+24}"#).unwrap();
        assert_eq!(amount.value, dec!(4387670724281231000000000));

        let amount: Amount = serde_json::from_str(r#"{"value": 0}"#).unwrap();
        assert_eq!(amount.value, Decimal::ZERO);
    }

    #[test]
    fn strings_are_not_numbers() {
        assert!(serde_json::from_str::<Amount>(r#"{"value": "12"}"#).is_err());
    }
}
