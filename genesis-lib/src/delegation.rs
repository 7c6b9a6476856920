use crate::amount::{deserialize_amount, serialize_amount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type DelegatorAddress = String;
pub type ValidatorAddress = String;

/// One entry of `app_state.staking.delegations`.
///
/// Exports carry more fields than these (e.g. starting info); they are ignored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DelegationRecord {
    pub delegator_address: DelegatorAddress,
    pub validator_address: ValidatorAddress,
    #[serde(
        deserialize_with = "deserialize_amount",
        serialize_with = "serialize_amount"
    )]
    pub shares: Decimal,
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    // Small address pools so that generated exports contain several
    // delegations per validator and the occasional repeated delegator.
    const VALIDATORS: [&str; 3] = [
        "cantovaloper1aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        "cantovaloper1bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "cantovaloper1cccccccccccccccccccccccccccccccccccccc",
    ];

    impl Arbitrary for DelegationRecord {
        type Parameters = ();
        type Strategy = BoxedStrategy<DelegationRecord>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (
                0..64u32,
                0..VALIDATORS.len(),
                0..1_000_000_000_000_000_000_000u128,
            )
                .prop_map(|(delegator, validator, shares)| DelegationRecord {
                    delegator_address: format!("canto1delegator{:04}", delegator),
                    validator_address: VALIDATORS[validator].to_string(),
                    shares: Decimal::from_i128_with_scale(shares as i128, 0),
                })
                .boxed()
        }
    }

    pub fn validator_address() -> impl Strategy<Value = ValidatorAddress> {
        prop::sample::select(VALIDATORS.to_vec()).prop_map(str::to_string)
    }
}

#[cfg(any(test, feature = "proptest"))]
pub use arbitrary::validator_address;
