use crate::utils::fs::{write_atomically, WriteError};
use genesis_lib::delegation::{DelegatorAddress, ValidatorAddress};
use genesis_lib::{DelegationRecord, GenesisReader, Section};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub type Stake = Decimal;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Genesis(#[from] genesis_lib::Error),

    #[error("delegator {delegator} appears more than once for validator {validator}")]
    DuplicateDelegator {
        validator: ValidatorAddress,
        delegator: DelegatorAddress,
    },

    #[error("total stake of validator {0} overflowed")]
    Overflow(ValidatorAddress),

    #[error("stake summed over all validators overflowed")]
    TotalOverflow,

    #[error("could not read cached staked values from {}", path.display())]
    CacheRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cached staked values in {} are corrupted, remove the file to recompute them", path.display())]
    CacheCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    CacheWrite(#[from] WriteError),
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    #[serde(with = "crate::utils::serde::decimal_number")]
    pub total_stake: Stake,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DelegatorStake {
    #[serde(with = "crate::utils::serde::decimal_number")]
    pub amount: Stake,
}

/// Stake delegated to a single validator, as persisted in the cache file:
///
/// ```json
/// {
///     "stats": { "total_stake": 200.0 },
///     "delegators": {
///         "delegator1": { "amount": 100.0 },
///         "delegator2": { "amount": 100.0 }
///     }
/// }
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorAggregate {
    pub stats: ValidatorStats,
    pub delegators: BTreeMap<DelegatorAddress, DelegatorStake>,
}

impl ValidatorAggregate {
    pub fn total_stake(&self) -> Stake {
        self.stats.total_stake
    }

    /// Sum of the individual delegations, which should always match
    /// [`ValidatorAggregate::total_stake`].
    pub fn delegated_stake(&self) -> Option<Stake> {
        self.delegators
            .values()
            .try_fold(Stake::ZERO, |acc, d| acc.checked_add(d.amount))
    }
}

pub type StakedValidators = BTreeMap<ValidatorAddress, ValidatorAggregate>;

/// What to do when the same delegator shows up twice for the target validator.
/// Exports are not expected to contain such duplicates.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the last record seen
    #[default]
    Overwrite,
    /// Add the shares of every record together
    Sum,
    /// Abort the aggregation
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "sum" => Ok(Self::Sum),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown duplicate policy `{}`, expected one of overwrite, sum, reject",
                other
            )),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    #[serde(with = "crate::utils::serde::decimal_number")]
    pub total_staked: Stake,
    pub number_of_validators: usize,
    /// Only known when the export has been streamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_delegators: Option<usize>,
    pub from_cache: bool,
}

impl AggregationReport {
    fn from_cache(validators: &StakedValidators) -> Result<Self, Error> {
        Ok(Self {
            total_staked: total_staked(validators)?,
            number_of_validators: validators.len(),
            number_of_delegators: None,
            from_cache: true,
        })
    }
}

fn total_staked(validators: &StakedValidators) -> Result<Stake, Error> {
    validators
        .values()
        .try_fold(Stake::ZERO, |acc, aggregate| {
            acc.checked_add(aggregate.total_stake())
        })
        .ok_or(Error::TotalOverflow)
}

/// Accumulates the delegations made to a single validator.
pub struct StakeAggregator {
    target: ValidatorAddress,
    policy: DuplicatePolicy,
    validators: StakedValidators,
    delegators: HashSet<DelegatorAddress>,
}

impl StakeAggregator {
    pub fn new(target: impl Into<ValidatorAddress>, policy: DuplicatePolicy) -> Self {
        Self {
            target: target.into(),
            policy,
            validators: StakedValidators::new(),
            delegators: HashSet::new(),
        }
    }

    pub fn accept(&mut self, record: DelegationRecord) -> Result<(), Error> {
        let DelegationRecord {
            delegator_address,
            validator_address,
            shares,
        } = record;

        if validator_address != self.target {
            return Ok(());
        }

        let aggregate = self
            .validators
            .entry(validator_address.clone())
            .or_default();
        let previous = aggregate
            .delegators
            .get(&delegator_address)
            .map(|stake| stake.amount);

        let amount = match (previous, self.policy) {
            (None, _) => shares,
            (Some(_), DuplicatePolicy::Reject) => {
                return Err(Error::DuplicateDelegator {
                    validator: validator_address,
                    delegator: delegator_address,
                })
            }
            (Some(_), DuplicatePolicy::Overwrite) => {
                tracing::warn!(delegator = %delegator_address, "duplicate delegation, keeping the last one");
                shares
            }
            (Some(previous), DuplicatePolicy::Sum) => {
                tracing::warn!(delegator = %delegator_address, "duplicate delegation, adding shares");
                previous
                    .checked_add(shares)
                    .ok_or_else(|| Error::Overflow(validator_address.clone()))?
            }
        };

        // replaced amounts are taken out of the total so that it always
        // matches the sum of the delegations
        aggregate.stats.total_stake = aggregate
            .stats
            .total_stake
            .checked_sub(previous.unwrap_or_default())
            .and_then(|total| total.checked_add(amount))
            .ok_or(Error::Overflow(validator_address))?;
        aggregate
            .delegators
            .insert(delegator_address.clone(), DelegatorStake { amount });
        self.delegators.insert(delegator_address);
        Ok(())
    }

    pub fn finish(self) -> Result<(StakedValidators, AggregationReport), Error> {
        let report = AggregationReport {
            total_staked: total_staked(&self.validators)?,
            number_of_validators: self.validators.len(),
            number_of_delegators: Some(self.delegators.len()),
            from_cache: false,
        };
        Ok((self.validators, report))
    }
}

/// Stream the delegations of a genesis export and aggregate the ones made to
/// `target`.
pub fn aggregate_delegations<R: Read>(
    genesis: GenesisReader<R>,
    target: &str,
    policy: DuplicatePolicy,
) -> Result<(StakedValidators, AggregationReport), Error> {
    let mut aggregator = StakeAggregator::new(target, policy);
    let mut rejected = None;

    genesis.stream_section(Section::StakedAmounts, |_, record: DelegationRecord| {
        match aggregator.accept(record) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                rejected = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;

    match rejected {
        Some(e) => Err(e),
        None => aggregator.finish(),
    }
}

/// Staked values computed from a genesis export, persisted so that later
/// runs do not depend on the export any more.
///
/// The presence of the file is the only validity check: a cache produced from
/// a different export is trusted all the same.
pub struct StakeCache {
    path: PathBuf,
}

impl StakeCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<StakedValidators, Error> {
        let file = File::open(&self.path).map_err(|source| Error::CacheRead {
            path: self.path.clone(),
            source,
        })?;
        let validators: StakedValidators = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| Error::CacheCorruption {
                path: self.path.clone(),
                source,
            })?;

        for (validator, aggregate) in &validators {
            if aggregate.delegated_stake() != Some(aggregate.total_stake()) {
                tracing::warn!(
                    %validator,
                    total_stake = %aggregate.total_stake(),
                    "cached total stake does not match the sum of its delegations"
                );
            }
        }
        Ok(validators)
    }

    pub fn store(&self, validators: &StakedValidators) -> Result<(), Error> {
        write_atomically(&self.path, |writer| {
            serde_json::to_writer(writer, validators).map_err(io::Error::from)
        })?;
        Ok(())
    }

    /// Load the cached staked values if present, otherwise compute them from
    /// the genesis export and cache them. On a cache hit the export is not
    /// opened at all, it might not even exist any more.
    pub fn load_or_aggregate(
        &self,
        genesis_path: &Path,
        target: &str,
        policy: DuplicatePolicy,
    ) -> Result<(StakedValidators, AggregationReport), Error> {
        if self.exists() {
            tracing::info!(path = %self.path.display(), "using cached file for staked values");
            let validators = self.load()?;
            let report = AggregationReport::from_cache(&validators)?;
            return Ok((validators, report));
        }
        self.refresh(genesis_path, target, policy)
    }

    /// Recompute the staked values from the genesis export, replacing any
    /// cached ones.
    pub fn refresh(
        &self,
        genesis_path: &Path,
        target: &str,
        policy: DuplicatePolicy,
    ) -> Result<(StakedValidators, AggregationReport), Error> {
        tracing::info!(path = %self.path.display(), "saving staked amounts");
        let genesis = GenesisReader::open(genesis_path)?;
        let (validators, report) = aggregate_delegations(genesis, target, policy)?;
        self.store(&validators)?;
        tracing::info!(
            validators = report.number_of_validators,
            delegators = report.number_of_delegators.unwrap_or_default(),
            path = %self.path.display(),
            "saved staked values"
        );
        Ok((validators, report))
    }
}
