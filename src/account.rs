//! Account-level synchronization.
//!
//! Pulls everything the wallet needs for one account in a single pass:
//! histories for every derived address, spendable outputs for the
//! addresses that have been used, and the reconstructed ledger. Address
//! derivation itself lives outside this crate; callers hand in the
//! derived receive and change [`WalletAddress`] lists, and the unused
//! ones come back with their derivation metadata intact.

use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::{Address, SignedAmount};
use tracing::info;

use crate::electrum::HistoryEntry;
use crate::error::WalletError;
use crate::ledger::{self, TxSource};
use crate::types::{Ledger, Utxo, WalletAddress};

/// The server-side operations account sync needs, on top of transaction
/// lookup. Implemented by the connection manager and by the canned test
/// backend.
#[async_trait]
pub trait WalletBackend: TxSource {
    /// Per-address history. Every requested address appears in the result,
    /// with an empty entry list for addresses the chain has never seen.
    async fn histories(
        &mut self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, Vec<HistoryEntry>>, WalletError>;

    /// Spendable outputs across the given addresses.
    async fn unspent(&mut self, addresses: &[Address]) -> Result<Vec<Utxo>, WalletError>;
}

/// Everything known about an account after one sync.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub ledger: Ledger,
    pub utxos: Vec<Utxo>,
    /// Receive addresses with no on-chain history, in derivation order.
    /// The first one is the next address to hand out.
    pub unused_receive: Vec<WalletAddress>,
    /// Change addresses with no on-chain history, in derivation order.
    pub unused_change: Vec<WalletAddress>,
    pub balance: SignedAmount,
}

/// Fetch histories, spendable outputs, and the reconstructed ledger for
/// the given derived address sets.
pub async fn sync_account<B>(
    backend: &mut B,
    receive_addresses: &[WalletAddress],
    change_addresses: &[WalletAddress],
) -> Result<AccountSnapshot, WalletError>
where
    B: WalletBackend + Send,
{
    let receive: Vec<Address> = receive_addresses
        .iter()
        .map(|w| w.address.clone())
        .collect();
    let change: Vec<Address> = change_addresses.iter().map(|w| w.address.clone()).collect();

    let mut all_addresses = Vec::with_capacity(receive.len() + change.len());
    all_addresses.extend_from_slice(&receive);
    all_addresses.extend_from_slice(&change);

    let histories = backend.histories(&all_addresses).await?;
    let has_history = |address: &Address| {
        histories
            .get(address)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    };

    let used: Vec<Address> = all_addresses
        .iter()
        .filter(|a| has_history(a))
        .cloned()
        .collect();
    let unused_receive: Vec<WalletAddress> = receive_addresses
        .iter()
        .filter(|w| !has_history(&w.address))
        .cloned()
        .collect();
    let unused_change: Vec<WalletAddress> = change_addresses
        .iter()
        .filter(|w| !has_history(&w.address))
        .cloned()
        .collect();

    // Unused addresses cannot hold outputs; skip them on the wire.
    let utxos = if used.is_empty() {
        Vec::new()
    } else {
        backend.unspent(&used).await?
    };

    let combined: Vec<HistoryEntry> = histories.into_values().flatten().collect();
    let ledger = ledger::reconstruct(backend, &receive, &change, &combined).await?;

    info!(
        used = used.len(),
        total = all_addresses.len(),
        entries = ledger.entries.len(),
        utxos = utxos.len(),
        "account synchronized"
    );

    let balance = ledger.balance;
    Ok(AccountSnapshot {
        ledger,
        utxos,
        unused_receive,
        unused_change,
        balance,
    })
}
