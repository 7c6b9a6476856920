mod aggregate;
mod extract;
mod repay;
mod settings;

use repayment_toolbox::repayment;
use structopt::StructOpt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Repayment(#[from] repayment::Error),

    #[error(transparent)]
    Stake(#[from] repayment::stake::Error),

    #[error(transparent)]
    Genesis(#[from] genesis_lib::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub enum Cli {
    /// Compute the repayment owed to the delegators of a validator and write
    /// the unsigned transaction paying them
    Repay(repay::Repay),
    /// Compute (or load from the cache) the staked values of a validator
    Aggregate(aggregate::Aggregate),
    /// Dump the records of a genesis export section as json lines
    Extract(extract::Extract),
}

impl Cli {
    pub fn exec(self) -> Result<(), Error> {
        match self {
            Self::Repay(cmd) => cmd.exec(),
            Self::Aggregate(cmd) => cmd.exec(),
            Self::Extract(cmd) => cmd.exec(),
        }
    }
}
