//! Electrum wire protocol: framing, transport session, and response
//! decoding.
//!
//! The connection manager ([`crate::client::ElectrumClient`]) is the only
//! consumer of the session type; everything else in the crate works against
//! decoded domain types and the trait seams in [`crate::batch`],
//! [`crate::ledger`], and [`crate::account`].

pub(crate) mod parsing;
pub mod protocol;
pub(crate) mod transport;

#[cfg(test)]
pub(crate) mod mock;

use bitcoin::Network;

use crate::error::WalletError;
use crate::types::TxRecord;

pub use protocol::{Balance, HistoryEntry, UnspentEntry};

/// A transaction as returned by `blockchain.transaction.get`.
///
/// Servers that honor the verbosity flag return a structured record; others
/// reply with raw hex that must be decoded locally before use.
#[derive(Debug, Clone)]
pub enum RawTx {
    Structured(TxRecord),
    RawHex(String),
}

impl RawTx {
    /// Decode into a [`TxRecord`], running the raw-hex arm through the
    /// consensus decoder. Raw-hex records come back with zero
    /// confirmations; callers with height knowledge backfill that.
    pub fn into_record(self, network: Network) -> Result<TxRecord, WalletError> {
        match self {
            Self::Structured(record) => Ok(record),
            Self::RawHex(hex) => parsing::parse_raw_tx_hex(&hex, network),
        }
    }
}

/// Split a `blockchain.transaction.get` result into its two shapes.
pub(crate) fn parse_tx_result(
    value: serde_json::Value,
    network: Network,
) -> Result<RawTx, WalletError> {
    if let Some(hex) = value.as_str() {
        return Ok(RawTx::RawHex(hex.to_owned()));
    }
    if value.is_object() {
        return Ok(RawTx::Structured(parsing::parse_verbose_tx(
            &value, network,
        )?));
    }
    Err(WalletError::InvalidResponse(format!(
        "unexpected transaction.get result: {value}"
    )))
}
