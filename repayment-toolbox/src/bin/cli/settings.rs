use repayment_toolbox::repayment::{self, DuplicatePolicy, RepaymentConfig};
use rust_decimal::Decimal;
use std::path::PathBuf;
use structopt::StructOpt;

/// Repayment configuration: an optional json file, then command line
/// overrides. Anything left unset keeps the reference deployment value.
#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Settings {
    /// Path to a json encoded `RepaymentConfig`
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Operator address of the validator whose delegators are repaid
    #[structopt(long)]
    validator_address: Option<String>,

    /// Address paying the delegators (the --from key used to sign)
    #[structopt(long)]
    payment_address: Option<String>,

    /// Share of the staked amount repaid, e.g. 0.0075 for 0.75%
    #[structopt(long)]
    repayment_ratio: Option<Decimal>,

    /// Number of base units in one token (10^18 for acanto, 10^6 for most Cosmos chains)
    #[structopt(long)]
    base_unit_factor: Option<Decimal>,

    #[structopt(long)]
    denom: Option<String>,

    #[structopt(long)]
    memo: Option<String>,

    /// Path to the genesis export
    #[structopt(long, parse(from_os_str))]
    genesis: Option<PathBuf>,

    /// Where staked values are cached between runs
    #[structopt(long, parse(from_os_str))]
    cache: Option<PathBuf>,

    /// Where the unsigned transaction is written
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// What to do with repeated delegations: overwrite, sum or reject
    #[structopt(long)]
    duplicate_policy: Option<DuplicatePolicy>,
}

impl Settings {
    pub fn into_config(self) -> Result<RepaymentConfig, repayment::Error> {
        let mut config = match &self.config {
            Some(path) => RepaymentConfig::load(path)?,
            None => RepaymentConfig::default(),
        };

        let Settings {
            config: _,
            validator_address,
            payment_address,
            repayment_ratio,
            base_unit_factor,
            denom,
            memo,
            genesis,
            cache,
            output,
            duplicate_policy,
        } = self;

        if let Some(validator_address) = validator_address {
            config.validator_address = validator_address;
        }
        if let Some(payment_address) = payment_address {
            config.payment_address = payment_address;
        }
        if let Some(repayment_ratio) = repayment_ratio {
            config.repayment_ratio = repayment_ratio;
        }
        if let Some(base_unit_factor) = base_unit_factor {
            config.base_unit_factor = base_unit_factor;
        }
        if let Some(denom) = denom {
            config.denom = denom;
        }
        if let Some(memo) = memo {
            config.memo = memo;
        }
        if let Some(genesis) = genesis {
            config.genesis_path = genesis;
        }
        if let Some(cache) = cache {
            config.cache_path = cache;
        }
        if let Some(output) = output {
            config.output_path = output;
        }
        if let Some(duplicate_policy) = duplicate_policy {
            config.duplicate_policy = duplicate_policy;
        }

        config.validate()?;
        Ok(config)
    }
}
