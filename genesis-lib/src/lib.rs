pub mod amount;
pub mod delegation;
mod stream;
#[cfg(any(test, feature = "test-api"))]
pub mod testing;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use delegation::DelegationRecord;
pub use stream::{Extraction, GenesisReader};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not in sections")]
    UnknownSection(String),

    #[error("could not open genesis export {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record #{index} in {section}")]
    MalformedRecord {
        section: Section,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid genesis export while reading {section}")]
    Json {
        section: Section,
        #[source]
        source: serde_json::Error,
    },
}

/// Record collections that can be streamed out of a genesis export.
///
/// Every section is an array located at a fixed dotted path, each element of
/// the array being one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    StakedAmounts,
    AccountBalances,
    TotalSupply,
    /// Useful to check e.g. the bonded status of a validator
    ValidatorsInfo,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::StakedAmounts,
        Section::AccountBalances,
        Section::TotalSupply,
        Section::ValidatorsInfo,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Section::StakedAmounts => "staked_amounts",
            Section::AccountBalances => "account_balances",
            Section::TotalSupply => "total_supply",
            Section::ValidatorsInfo => "validators_info",
        }
    }

    pub fn path(&self) -> &'static [&'static str] {
        match self {
            Section::StakedAmounts => &["app_state", "staking", "delegations"],
            Section::AccountBalances => &["app_state", "bank", "balances"],
            Section::TotalSupply => &["app_state", "bank", "supply"],
            Section::ValidatorsInfo => &["app_state", "staking", "validators"],
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path().join("."))
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.key() == s)
            .ok_or_else(|| Error::UnknownSection(s.to_string()))
    }
}
