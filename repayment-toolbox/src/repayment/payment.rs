use super::stake::{StakedValidators, ValidatorAggregate};
use genesis_lib::delegation::{DelegatorAddress, ValidatorAddress};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

/// Owed amount per delegator, in base units (e.g. acanto)
pub type Payment = Decimal;
pub type PaymentMap = BTreeMap<DelegatorAddress, Payment>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validator {0} not found in the staked values")]
    UnknownValidator(ValidatorAddress),

    #[error("payment owed to {0} overflowed its maximum value")]
    Overflow(DelegatorAddress),

    #[error("total of the payments overflowed its maximum value")]
    TotalOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentCalculator {
    ratio: Decimal,
    base_unit_factor: Decimal,
}

impl PaymentCalculator {
    /// `ratio` is the share of the stake being repaid (0.0075 for 0.75%),
    /// `base_unit_factor` the number of base units in one display unit.
    pub fn new(ratio: Decimal, base_unit_factor: Decimal) -> Self {
        Self {
            ratio,
            base_unit_factor,
        }
    }

    pub fn ratio(&self) -> Decimal {
        self.ratio
    }

    pub fn calculate(&self, aggregate: &ValidatorAggregate) -> Result<PaymentMap, Error> {
        aggregate
            .delegators
            .iter()
            .map(|(address, stake)| {
                stake
                    .amount
                    .checked_mul(self.ratio)
                    .map(|owed| (address.clone(), owed))
                    .ok_or_else(|| Error::Overflow(address.clone()))
            })
            .collect()
    }

    pub fn calculate_for_validator(
        &self,
        validators: &StakedValidators,
        validator: &str,
    ) -> Result<PaymentMap, Error> {
        let aggregate = validators
            .get(validator)
            .ok_or_else(|| Error::UnknownValidator(validator.to_string()))?;
        self.calculate(aggregate)
    }

    /// What the payments should add up to, straight from the validator total.
    pub fn expected_total(&self, aggregate: &ValidatorAggregate) -> Option<Payment> {
        aggregate.total_stake().checked_mul(self.ratio)
    }

    pub fn total(&self, payments: &PaymentMap) -> Result<Payment, Error> {
        payments
            .values()
            .try_fold(Payment::ZERO, |acc, owed| acc.checked_add(*owed))
            .ok_or(Error::TotalOverflow)
    }

    /// Total of the payments in display units, for humans only.
    pub fn display_total(&self, payments: &PaymentMap) -> Result<Decimal, Error> {
        self.total(payments)?
            .checked_div(self.base_unit_factor)
            .ok_or(Error::TotalOverflow)
    }
}
