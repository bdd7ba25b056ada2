//! Deterministic fixture builders shared across test modules.

use bitcoin::hashes::Hash;
use bitcoin::{Address, Amount, Network, ScriptBuf, Txid};

use crate::types::{TxIn, TxOut, TxRecord, WalletAddress};

pub(crate) fn txid_from_byte(byte: u8) -> Txid {
    Txid::from_byte_array([byte; 32])
}

/// A distinct p2wpkh address per byte, on regtest.
pub(crate) fn addr_from_byte(byte: u8) -> Address {
    let mut bytes = vec![0x00, 0x14];
    bytes.extend_from_slice(&[byte; 20]);
    let script = ScriptBuf::from_bytes(bytes);
    Address::from_script(&script, Network::Regtest).expect("p2wpkh script has an address form")
}

/// A derived wallet address with fixture metadata, indexed by the same
/// byte as [`addr_from_byte`].
pub(crate) fn wallet_addr(byte: u8) -> WalletAddress {
    WalletAddress {
        address: addr_from_byte(byte),
        derivation_path: format!("m/84'/1'/0'/0/{byte}"),
        public_key: "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
            .parse()
            .expect("static key must parse"),
    }
}

/// Fluent [`TxRecord`] builder for ledger and account tests. Txids are
/// assigned, not computed, so records can reference each other without
/// real signatures.
pub(crate) struct TxBuilder {
    record: TxRecord,
}

impl TxBuilder {
    pub(crate) fn new(txid: Txid) -> Self {
        Self {
            record: TxRecord {
                txid,
                version: 2,
                locktime: 0,
                inputs: Vec::new(),
                outputs: Vec::new(),
                confirmations: 0,
                block_time: None,
            },
        }
    }

    pub(crate) fn input(mut self, txid: Txid, vout: u32) -> Self {
        self.record.inputs.push(TxIn {
            txid,
            vout,
            sequence: 0xFFFF_FFFD,
        });
        self
    }

    pub(crate) fn output_to(mut self, address: &Address, sats: u64) -> Self {
        self.record.outputs.push(TxOut {
            value: Amount::from_sat(sats),
            script_pubkey: address.script_pubkey(),
            address: Some(address.clone()),
        });
        self
    }

    pub(crate) fn confirmations(mut self, confirmations: u32) -> Self {
        self.record.confirmations = confirmations;
        self
    }

    pub(crate) fn block_time(mut self, block_time: u64) -> Self {
        self.record.block_time = Some(block_time);
        self
    }

    pub(crate) fn build(self) -> TxRecord {
        self.record
    }
}
