pub mod account;
pub mod batch;
pub mod client;
pub mod coinselect;
pub mod electrum;
pub mod error;
pub mod ledger;
pub mod scripthash;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use account::{sync_account, AccountSnapshot, WalletBackend};
pub use client::{ClientConfig, ElectrumClient, FeeTiers};
pub use coinselect::{fund_payment, select_coins, CoinSelection, FlatVsizeFeeModel, FundedSelection};
pub use error::WalletError;
pub use ledger::{reconstruct, TxSource};
pub use types::{Direction, Ledger, LedgerEntry, Peer, TxRecord, Utxo, WalletAddress};
