//! Ledger reconstruction from raw transaction history.
//!
//! Electrum servers expose per-scripthash history, not an account view.
//! This module rebuilds one: fetch every transaction the wallet's
//! addresses appear in, resolve input values from the source transactions,
//! classify each as received / sent / internal, and fold a running balance
//! in chronological order.
//!
//! Classification and folding are pure; the only I/O is the two fetch
//! rounds through [`TxSource`], which keeps the logic testable against
//! canned records.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bitcoin::{Address, Amount, SignedAmount, Txid};
use tracing::debug;

use crate::electrum::HistoryEntry;
use crate::error::WalletError;
use crate::types::{Direction, Ledger, LedgerEntry, TxRecord};

/// Bulk transaction lookup. Ids the source has no record of are omitted
/// from the result rather than failing the call.
#[async_trait]
pub trait TxSource {
    async fn transactions(
        &mut self,
        txids: &[Txid],
    ) -> Result<HashMap<Txid, TxRecord>, WalletError>;
}

/// Rebuild the account ledger for the given address sets from their
/// combined history.
///
/// `history` may contain the same txid under several addresses (a payment
/// with change touches at least two); duplicates collapse into one ledger
/// entry. Entries come back newest first, with `running_balance` carrying
/// the balance after each entry in chronological order.
pub async fn reconstruct<S>(
    source: &mut S,
    receive_addresses: &[Address],
    change_addresses: &[Address],
    history: &[HistoryEntry],
) -> Result<Ledger, WalletError>
where
    S: TxSource + Send,
{
    if history.is_empty() {
        return Ok(Ledger::empty());
    }

    // Collapse duplicate history entries, keeping the best-known height.
    let mut heights: HashMap<Txid, i32> = HashMap::new();
    let mut wallet_txids: Vec<Txid> = Vec::new();
    for entry in history {
        match heights.entry(entry.txid) {
            Entry::Vacant(slot) => {
                slot.insert(entry.height);
                wallet_txids.push(entry.txid);
            }
            Entry::Occupied(mut slot) => {
                if entry.height > *slot.get() {
                    slot.insert(entry.height);
                }
            }
        }
    }

    let fetched = source.transactions(&wallet_txids).await?;

    // Second round: the source transactions behind every input, needed to
    // resolve input values (fees) and input ownership. Anything already
    // fetched is reused.
    let mut input_txids: Vec<Txid> = fetched
        .values()
        .flat_map(|record| record.inputs.iter().map(|input| input.txid))
        .collect();
    input_txids.sort_unstable();
    input_txids.dedup();
    input_txids.retain(|txid| !fetched.contains_key(txid));

    let input_sources = if input_txids.is_empty() {
        HashMap::new()
    } else {
        source.transactions(&input_txids).await?
    };
    debug!(
        wallet_txs = fetched.len(),
        input_sources = input_sources.len(),
        "fetched ledger transactions"
    );

    let sets = AddressSets::new(receive_addresses, change_addresses);
    let resolve = |txid: &Txid| fetched.get(txid).or_else(|| input_sources.get(txid));

    // Chronological order: confirmed by height, then mempool, ties broken
    // by block time and txid for determinism.
    let mut chronological: Vec<&TxRecord> = wallet_txids
        .iter()
        .filter_map(|txid| fetched.get(txid))
        .collect();
    chronological.sort_by_key(|record| {
        let height = heights.get(&record.txid).copied().unwrap_or(0);
        let height_key = if height > 0 { i64::from(height) } else { i64::MAX };
        (height_key, record.block_time.unwrap_or(u64::MAX), record.txid)
    });

    Ok(fold_entries(&chronological, &sets, resolve))
}

// ==============================================================================
// Classification
// ==============================================================================

struct AddressSets {
    receive: HashSet<Address>,
    change: HashSet<Address>,
}

impl AddressSets {
    fn new(receive: &[Address], change: &[Address]) -> Self {
        Self {
            receive: receive.iter().cloned().collect(),
            change: change.iter().cloned().collect(),
        }
    }

    fn owns(&self, address: &Address) -> bool {
        self.receive.contains(address) || self.change.contains(address)
    }
}

enum Classification {
    Received {
        value: Amount,
        counter_address: Option<Address>,
    },
    Sent {
        value: Amount,
        fee: Option<Amount>,
        fee_unresolved: bool,
        counter_address: Option<Address>,
    },
    /// Change-only or otherwise wallet-internal movement; no ledger entry.
    Internal,
}

/// Decide what a transaction means for the account.
///
/// Classification is output-driven: any output paying a receive address
/// makes the transaction `Received`, valued at the sum paid to receive
/// addresses, even when the wallet funded it (self-payments count as
/// received, and payments to change addresses never create entries).
/// Inputs are consulted only to resolve fees, ownership, and the
/// counterparty. A transaction spending wallet inputs with no receive
/// outputs is `Sent`, valued at the sum paid to external addresses; when
/// every output stays inside the wallet it is `Internal`.
fn classify<'a>(
    record: &TxRecord,
    sets: &AddressSets,
    resolve: impl Fn(&Txid) -> Option<&'a TxRecord>,
) -> Classification {
    let mut to_receive: u64 = 0;
    let mut to_external: u64 = 0;
    let mut total_out: u64 = 0;
    let mut external_address = None;
    for output in &record.outputs {
        total_out += output.value.to_sat();
        match &output.address {
            Some(address) if sets.receive.contains(address) => {
                to_receive += output.value.to_sat();
            }
            Some(address) if sets.change.contains(address) => {}
            other => {
                to_external += output.value.to_sat();
                if external_address.is_none() {
                    external_address = other.clone();
                }
            }
        }
    }

    let mut spends_wallet = false;
    let mut resolved_in: u64 = 0;
    let mut unresolved_inputs = false;
    let mut sender_address = None;
    for input in &record.inputs {
        let previous = resolve(&input.txid)
            .and_then(|src| src.outputs.get(input.vout as usize));
        match previous {
            Some(prev) => {
                resolved_in += prev.value.to_sat();
                match &prev.address {
                    Some(address) if sets.owns(address) => spends_wallet = true,
                    Some(address) => {
                        if sender_address.is_none() {
                            sender_address = Some(address.clone());
                        }
                    }
                    None => {}
                }
            }
            None => unresolved_inputs = true,
        }
    }

    if to_receive > 0 {
        return Classification::Received {
            value: Amount::from_sat(to_receive),
            counter_address: sender_address,
        };
    }

    if spends_wallet {
        if to_external == 0 {
            return Classification::Internal;
        }
        let fee = if unresolved_inputs {
            None
        } else {
            Some(Amount::from_sat(resolved_in.saturating_sub(total_out)))
        };
        return Classification::Sent {
            value: Amount::from_sat(to_external),
            fee,
            fee_unresolved: unresolved_inputs,
            counter_address: external_address,
        };
    }

    Classification::Internal
}

/// Fold chronological classifications into ledger entries with running
/// balances, then flip to newest-first presentation order.
fn fold_entries<'a>(
    chronological: &[&TxRecord],
    sets: &AddressSets,
    resolve: impl Fn(&Txid) -> Option<&'a TxRecord> + Copy,
) -> Ledger {
    let mut balance_sat: i64 = 0;
    let mut entries = Vec::with_capacity(chronological.len());

    for record in chronological {
        let entry = match classify(record, sets, resolve) {
            Classification::Internal => continue,
            Classification::Received {
                value,
                counter_address,
            } => {
                balance_sat += value.to_sat() as i64;
                LedgerEntry {
                    txid: record.txid,
                    direction: Direction::Received,
                    value,
                    counter_address,
                    fee: None,
                    fee_unresolved: false,
                    confirmations: record.confirmations,
                    block_time: record.block_time,
                    running_balance: SignedAmount::from_sat(balance_sat),
                }
            }
            Classification::Sent {
                value,
                fee,
                fee_unresolved,
                counter_address,
            } => {
                let outflow = value.to_sat() + fee.map(Amount::to_sat).unwrap_or(0);
                balance_sat -= outflow as i64;
                LedgerEntry {
                    txid: record.txid,
                    direction: Direction::Sent,
                    value,
                    counter_address,
                    fee,
                    fee_unresolved,
                    confirmations: record.confirmations,
                    block_time: record.block_time,
                    running_balance: SignedAmount::from_sat(balance_sat),
                }
            }
        };
        entries.push(entry);
    }

    entries.reverse();
    Ledger {
        entries,
        balance: SignedAmount::from_sat(balance_sat),
    }
}
