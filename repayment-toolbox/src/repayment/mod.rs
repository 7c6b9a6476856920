pub mod message;
pub mod payment;
pub mod stake;

pub use message::{MessageBuilder, TransactionEnvelope};
pub use payment::{PaymentCalculator, PaymentMap};
pub use stake::{
    AggregationReport, DuplicatePolicy, StakeAggregator, StakeCache, StakedValidators,
    ValidatorAggregate,
};

use crate::utils::are_close;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Stake(#[from] stake::Error),

    #[error(transparent)]
    Payment(#[from] payment::Error),

    #[error(transparent)]
    Message(#[from] message::Error),

    #[error("could not read configuration file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Everything that identifies a repayment run. The defaults are the ones of
/// the Chandra Station repayment on Canto.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepaymentConfig {
    /// Operator address of the validator whose delegators are repaid
    pub validator_address: String,
    /// Address the transfers are paid from, i.e. the key signing the transaction
    pub payment_address: String,
    /// Share of the stake repaid to each delegator
    #[serde(with = "crate::utils::serde::decimal_number")]
    pub repayment_ratio: Decimal,
    /// Base units in one token, 10^6 on most Cosmos chains
    #[serde(with = "crate::utils::serde::decimal_number")]
    pub base_unit_factor: Decimal,
    pub denom: String,
    pub memo: String,
    pub genesis_path: PathBuf,
    pub cache_path: PathBuf,
    pub output_path: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RepaymentConfig {
    fn default() -> Self {
        Self {
            validator_address: "cantovaloper19e84kdf5z09u2v4gpv0m7r6dcu0p8llkf30qtv".to_string(),
            payment_address: "canto12u7rpvj0hm4wq0n7gx356qxy8nw6mzmmpy9wyc".to_string(),
            repayment_ratio: dec!(0.0075),
            base_unit_factor: dec!(1000000000000000000),
            denom: "acanto".to_string(),
            memo: message::DEFAULT_MEMO.to_string(),
            genesis_path: PathBuf::from("exports/chain.json"),
            cache_path: PathBuf::from("staked/chain.json"),
            output_path: PathBuf::from("repayment_tx.json"),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl RepaymentConfig {
    /// Load a configuration from a json file. Missing fields keep their
    /// default value.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.validator_address.is_empty() {
            return Err(Error::InvalidConfig("validator address is empty".into()));
        }
        if self.payment_address.is_empty() {
            return Err(Error::InvalidConfig("payment address is empty".into()));
        }
        if self.denom.is_empty() {
            return Err(Error::InvalidConfig("denom is empty".into()));
        }
        if self.repayment_ratio.is_sign_negative() {
            return Err(Error::InvalidConfig(format!(
                "repayment ratio {} is negative",
                self.repayment_ratio
            )));
        }
        if self.base_unit_factor <= Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "base unit factor {} must be positive",
                self.base_unit_factor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepaymentSummary {
    pub stake: AggregationReport,
    pub delegators: usize,
    /// Sum of the owed amounts before truncation, in base units
    pub total_owed: Decimal,
    /// Same as `total_owed`, in display units
    pub total_owed_display: Decimal,
    /// Sum of the amounts actually transferred, in base units
    pub total_transferred: u128,
}

/// Compute the repayment of every delegator of the configured validator and
/// write the unsigned transaction paying them.
///
/// With `refresh_cache` the staked values are recomputed from the genesis
/// export even if a cached version exists.
pub fn run(config: &RepaymentConfig, refresh_cache: bool) -> Result<RepaymentSummary, Error> {
    config.validate()?;

    let cache = StakeCache::new(&config.cache_path);
    let (validators, report) = if refresh_cache {
        cache.refresh(
            &config.genesis_path,
            &config.validator_address,
            config.duplicate_policy,
        )?
    } else {
        cache.load_or_aggregate(
            &config.genesis_path,
            &config.validator_address,
            config.duplicate_policy,
        )?
    };
    tracing::info!(
        total_staked = %report.total_staked,
        validators = report.number_of_validators,
        from_cache = report.from_cache,
        "staked values ready"
    );

    let calculator = PaymentCalculator::new(config.repayment_ratio, config.base_unit_factor);
    let payments = calculator.calculate_for_validator(&validators, &config.validator_address)?;
    let total_owed = calculator.total(&payments)?;

    if let Some(expected) = validators
        .get(&config.validator_address)
        .and_then(|aggregate| calculator.expected_total(aggregate))
    {
        if !are_close(expected, total_owed) {
            tracing::warn!(%expected, actual = %total_owed, "payments do not add up to the expected total");
        }
    }

    let envelope = MessageBuilder::new(&config.payment_address, &config.denom)
        .with_memo(&config.memo)
        .build(&payments)?;
    envelope.write_to(&config.output_path)?;

    let summary = RepaymentSummary {
        stake: report,
        delegators: payments.len(),
        total_owed,
        total_owed_display: calculator.display_total(&payments)?,
        total_transferred: envelope.total_amount(),
    };
    tracing::info!(
        delegators = summary.delegators,
        total = %summary.total_owed_display.round_dp(2),
        denom = %config.denom,
        path = %config.output_path.display(),
        "saved repayment transaction, just sign & broadcast"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_lib::testing::genesis_export;
    use genesis_lib::DelegationRecord;
    use std::fs;

    fn config_in(dir: &Path) -> RepaymentConfig {
        RepaymentConfig {
            validator_address: "V".to_string(),
            payment_address: "canto1payer".to_string(),
            genesis_path: dir.join("exports").join("chain.json"),
            cache_path: dir.join("staked").join("chain.json"),
            output_path: dir.join("repayment_tx.json"),
            ..RepaymentConfig::default()
        }
    }

    fn write_export(config: &RepaymentConfig, delegations: &[DelegationRecord]) {
        fs::create_dir_all(config.genesis_path.parent().unwrap()).unwrap();
        fs::write(&config.genesis_path, genesis_export(delegations)).unwrap();
    }

    #[test]
    fn test_end_to_end_single_delegator() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_export(
            &config,
            &[DelegationRecord {
                delegator_address: "A".to_string(),
                validator_address: "V".to_string(),
                shares: dec!(1000000000000000000000),
            }],
        );

        let summary = run(&config, false).unwrap();
        assert_eq!(summary.delegators, 1);
        assert_eq!(summary.total_owed, dec!(7500000000000000000));
        assert_eq!(summary.total_owed_display, dec!(7.5));
        assert_eq!(summary.total_transferred, 7_500_000_000_000_000_000);
        assert!(!summary.stake.from_cache);

        let envelope: TransactionEnvelope =
            serde_json::from_str(&fs::read_to_string(&config.output_path).unwrap()).unwrap();
        let msg = &envelope.messages()[0];
        assert_eq!(envelope.messages().len(), 1);
        assert_eq!(msg.to_address, "A");
        assert_eq!(msg.from_address, "canto1payer");
        assert_eq!(msg.amount[0].denom, "acanto");
        assert_eq!(msg.amount[0].amount, 7_500_000_000_000_000_000);
        assert_eq!(envelope.body.memo, message::DEFAULT_MEMO);
        assert!(envelope.auth_info.fee.amount.is_empty());
        assert!(envelope.signatures.is_empty());

        // second run goes through the cache even without the export
        fs::remove_file(&config.genesis_path).unwrap();
        let summary = run(&config, false).unwrap();
        assert!(summary.stake.from_cache);
        assert_eq!(summary.total_transferred, 7_500_000_000_000_000_000);
    }

    #[test]
    fn test_refresh_needs_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let result = run(&config, true);
        assert!(matches!(
            result,
            Err(Error::Stake(stake::Error::Genesis(genesis_lib::Error::Open { .. })))
        ));
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_target_without_delegations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_export(
            &config,
            &[DelegationRecord {
                delegator_address: "A".to_string(),
                validator_address: "W".to_string(),
                shares: dec!(1),
            }],
        );
        let result = run(&config, false);
        assert!(matches!(
            result,
            Err(Error::Payment(payment::Error::UnknownValidator(_)))
        ));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "validator_address": "osmovaloper1xyz",
                "repayment_ratio": 0.05,
                "base_unit_factor": 1000000,
                "denom": "uosmo",
                "duplicate_policy": "reject"
            }"#,
        )
        .unwrap();

        let config = RepaymentConfig::load(&path).unwrap();
        assert_eq!(config.validator_address, "osmovaloper1xyz");
        assert_eq!(config.repayment_ratio, dec!(0.05));
        assert_eq!(config.base_unit_factor, dec!(1000000));
        assert_eq!(config.denom, "uosmo");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(
            config.payment_address,
            RepaymentConfig::default().payment_address
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_config_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"validator": "typo"}"#).unwrap();
        assert!(matches!(
            RepaymentConfig::load(&path),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let config = RepaymentConfig {
            repayment_ratio: dec!(-0.01),
            ..RepaymentConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = RepaymentConfig {
            base_unit_factor: Decimal::ZERO,
            ..RepaymentConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
