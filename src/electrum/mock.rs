//! Canned wallet backend for tests.
//!
//! Answers from fixed data instead of a server, recording how it was
//! driven so tests can assert on call counts. Built up fluently:
//!
//! ```ignore
//! let backend = MockBackend::new()
//!     .with_history(&address, &entries)
//!     .with_transaction(record);
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::{Address, Txid};

use crate::account::WalletBackend;
use crate::electrum::HistoryEntry;
use crate::error::WalletError;
use crate::ledger::TxSource;
use crate::types::{TxRecord, Utxo};

#[derive(Default)]
pub(crate) struct MockBackend {
    histories: HashMap<Address, Vec<HistoryEntry>>,
    transactions: HashMap<Txid, TxRecord>,
    utxos: Vec<Utxo>,
    tx_fetches: usize,
    unspent_fetches: usize,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_history(mut self, address: &Address, entries: &[HistoryEntry]) -> Self {
        self.histories
            .entry(address.clone())
            .or_default()
            .extend_from_slice(entries);
        self
    }

    pub(crate) fn with_transaction(mut self, record: TxRecord) -> Self {
        self.transactions.insert(record.txid, record);
        self
    }

    pub(crate) fn with_utxo(mut self, utxo: Utxo) -> Self {
        self.utxos.push(utxo);
        self
    }

    /// Number of `transactions` calls served (fetch rounds, not txids).
    pub(crate) fn tx_fetches(&self) -> usize {
        self.tx_fetches
    }

    pub(crate) fn unspent_fetches(&self) -> usize {
        self.unspent_fetches
    }
}

#[async_trait]
impl TxSource for MockBackend {
    /// Unknown txids are omitted, mirroring a server that does not track
    /// every transaction it is asked about.
    async fn transactions(
        &mut self,
        txids: &[Txid],
    ) -> Result<HashMap<Txid, TxRecord>, WalletError> {
        self.tx_fetches += 1;
        Ok(txids
            .iter()
            .filter_map(|txid| self.transactions.get(txid).map(|r| (*txid, r.clone())))
            .collect())
    }
}

#[async_trait]
impl WalletBackend for MockBackend {
    async fn histories(
        &mut self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, Vec<HistoryEntry>>, WalletError> {
        Ok(addresses
            .iter()
            .map(|address| {
                (
                    address.clone(),
                    self.histories.get(address).cloned().unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn unspent(&mut self, addresses: &[Address]) -> Result<Vec<Utxo>, WalletError> {
        self.unspent_fetches += 1;
        Ok(self
            .utxos
            .iter()
            .filter(|utxo| addresses.contains(&utxo.address))
            .cloned()
            .collect())
    }
}
