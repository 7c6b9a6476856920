//! Unsigned Cosmos SDK transaction batching one bank transfer per delegator.
//! The resulting file is meant to be signed and broadcast with the chain CLI.

use super::payment::{Payment, PaymentMap};
use crate::utils::fs::{write_atomically, WriteError};
use genesis_lib::delegation::DelegatorAddress;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const DEFAULT_MEMO: &str = "Slash Repayment to delegators";
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot pay {amount} to {delegator}, amounts must be non negative integers of base units")]
    InvalidAmount {
        delegator: DelegatorAddress,
        amount: Payment,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "crate::utils::serde::display_string")]
    pub amount: u128,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgSend {
    #[serde(rename = "@type")]
    pub type_url: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: Vec<Coin>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxBody {
    pub messages: Vec<MsgSend>,
    pub memo: String,
    #[serde(with = "crate::utils::serde::display_string")]
    pub timeout_height: u64,
    pub extension_options: Vec<Value>,
    pub non_critical_extension_options: Vec<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Fee {
    pub amount: Vec<Coin>,
    #[serde(with = "crate::utils::serde::display_string")]
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthInfo {
    pub signer_infos: Vec<Value>,
    pub fee: Fee,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<String>,
}

impl TransactionEnvelope {
    pub fn messages(&self) -> &[MsgSend] {
        &self.body.messages
    }

    /// Sum of every transferred amount, in base units
    pub fn total_amount(&self) -> u128 {
        self.body
            .messages
            .iter()
            .flat_map(|msg| msg.amount.iter())
            .map(|coin| coin.amount)
            .sum()
    }

    /// Write the envelope as indented JSON. The file is replaced atomically.
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        write_atomically(path, |writer| {
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
            self.serialize(&mut serializer).map_err(io::Error::from)
        })?;
        Ok(())
    }
}

pub struct MessageBuilder {
    from_address: String,
    denom: String,
    memo: String,
    gas_limit: u64,
}

impl MessageBuilder {
    pub fn new(from_address: impl Into<String>, denom: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            denom: denom.into(),
            memo: DEFAULT_MEMO.to_string(),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Build one transfer per delegator, in address order. Owed amounts are
    /// truncated to whole base units.
    pub fn build(&self, payments: &PaymentMap) -> Result<TransactionEnvelope, Error> {
        let messages = payments
            .iter()
            .map(|(delegator, owed)| self.transfer(delegator, *owed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransactionEnvelope {
            body: TxBody {
                messages,
                memo: self.memo.clone(),
                timeout_height: 0,
                extension_options: Vec::new(),
                non_critical_extension_options: Vec::new(),
            },
            auth_info: AuthInfo {
                signer_infos: Vec::new(),
                fee: Fee {
                    amount: Vec::new(),
                    gas_limit: self.gas_limit,
                    payer: String::new(),
                    granter: String::new(),
                },
            },
            signatures: Vec::new(),
        })
    }

    fn transfer(&self, delegator: &str, owed: Payment) -> Result<MsgSend, Error> {
        let invalid = || Error::InvalidAmount {
            delegator: delegator.to_string(),
            amount: owed,
        };
        if owed < Payment::ZERO {
            return Err(invalid());
        }
        // abs() gets rid of the sign of a truncated -0.x
        let amount = owed.trunc().abs().to_u128().ok_or_else(invalid)?;

        Ok(MsgSend {
            type_url: MSG_SEND_TYPE_URL.to_string(),
            from_address: self.from_address.clone(),
            to_address: delegator.to_string(),
            amount: vec![Coin {
                denom: self.denom.clone(),
                amount,
            }],
        })
    }
}
