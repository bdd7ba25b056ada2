//! Decoding of Electrum transaction responses into [`TxRecord`].
//!
//! `blockchain.transaction.get` with `verbose=true` normally returns a
//! Bitcoin Core style JSON object, but some servers ignore the verbosity
//! flag and reply with the raw transaction hex instead. Both shapes are
//! handled; raw hex goes through the `bitcoin` crate's consensus decoder.
//! Script-to-address resolution is delegated to `Address::from_script`
//! rather than trusting the server-provided address strings.

use bitcoin::consensus::encode::deserialize_hex;
use bitcoin::{Address, Amount, Denomination, Network, ScriptBuf, Transaction};

use crate::error::WalletError;
use crate::types::{TxIn, TxOut, TxRecord};

/// Amounts in verbose responses are BTC floats (occasionally strings).
pub(crate) fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, WalletError> {
    if let Some(f) = value.as_f64() {
        return Amount::from_btc(f)
            .map_err(|e| WalletError::InvalidTxData(format!("invalid BTC amount {f}: {e}")));
    }
    if let Some(s) = value.as_str() {
        return Amount::from_str_in(s, Denomination::Bitcoin)
            .map_err(|e| WalletError::InvalidTxData(format!("invalid BTC amount `{s}`: {e}")));
    }
    Err(WalletError::InvalidTxData(format!(
        "unexpected amount value: {value}"
    )))
}

/// Parse a verbose (Core-style) transaction object.
pub(crate) fn parse_verbose_tx(
    raw: &serde_json::Value,
    network: Network,
) -> Result<TxRecord, WalletError> {
    let txid = parse_field_str(raw, "txid")?
        .parse()
        .map_err(|e| WalletError::InvalidTxData(format!("invalid txid: {e}")))?;
    let version = raw
        .get("version")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| WalletError::InvalidTxData("missing version".into()))? as i32;
    let locktime = raw
        .get("locktime")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| WalletError::InvalidTxData("missing locktime".into()))?
        as u32;
    let confirmations = raw
        .get("confirmations")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0) as u32;
    let block_time = raw.get("blocktime").and_then(serde_json::Value::as_u64);

    let vin = raw
        .get("vin")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| WalletError::InvalidTxData("missing vin array".into()))?;
    let mut inputs = Vec::with_capacity(vin.len());
    for entry in vin {
        // Coinbase inputs carry no outpoint and are not ledger-relevant.
        let Some(input_txid) = entry.get("txid").and_then(serde_json::Value::as_str) else {
            continue;
        };
        inputs.push(TxIn {
            txid: input_txid
                .parse()
                .map_err(|e| WalletError::InvalidTxData(format!("invalid vin txid: {e}")))?,
            vout: entry
                .get("vout")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| WalletError::InvalidTxData("missing vin vout".into()))?
                as u32,
            sequence: entry
                .get("sequence")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0xFFFF_FFFF) as u32,
        });
    }

    let vout = raw
        .get("vout")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| WalletError::InvalidTxData("missing vout array".into()))?;
    let mut outputs = Vec::with_capacity(vout.len());
    for entry in vout {
        let value = parse_btc_amount(
            entry
                .get("value")
                .ok_or_else(|| WalletError::InvalidTxData("missing vout value".into()))?,
        )?;
        let script_hex = entry
            .get("scriptPubKey")
            .and_then(|s| s.get("hex"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| WalletError::InvalidTxData("missing scriptPubKey hex".into()))?;
        let script_pubkey = ScriptBuf::from_hex(script_hex)
            .map_err(|e| WalletError::InvalidTxData(format!("invalid scriptPubKey hex: {e}")))?;
        let address = Address::from_script(&script_pubkey, network).ok();
        outputs.push(TxOut {
            value,
            script_pubkey,
            address,
        });
    }

    Ok(TxRecord {
        txid,
        version,
        locktime,
        inputs,
        outputs,
        confirmations,
        block_time,
    })
}

/// Decode a raw consensus-serialized transaction hex into a [`TxRecord`].
///
/// Raw hex carries no confirmation data; the connection manager backfills
/// `confirmations` from its height cache when it can.
pub(crate) fn parse_raw_tx_hex(hex: &str, network: Network) -> Result<TxRecord, WalletError> {
    let tx: Transaction = deserialize_hex(hex)
        .map_err(|e| WalletError::InvalidTxData(format!("invalid raw transaction hex: {e}")))?;

    let inputs = tx
        .input
        .iter()
        .filter(|input| !input.previous_output.is_null())
        .map(|input| TxIn {
            txid: input.previous_output.txid,
            vout: input.previous_output.vout,
            sequence: input.sequence.0,
        })
        .collect();

    let outputs = tx
        .output
        .iter()
        .map(|output| TxOut {
            value: output.value,
            script_pubkey: output.script_pubkey.clone(),
            address: Address::from_script(&output.script_pubkey, network).ok(),
        })
        .collect();

    Ok(TxRecord {
        txid: tx.compute_txid(),
        version: tx.version.0,
        locktime: tx.lock_time.to_consensus_u32(),
        inputs,
        outputs,
        confirmations: 0,
        block_time: None,
    })
}

fn parse_field_str<'a>(
    raw: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, WalletError> {
    raw.get(field)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| WalletError::InvalidTxData(format!("missing {field}")))
}
