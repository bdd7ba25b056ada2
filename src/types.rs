//! Shared domain types for the wallet backend.
//!
//! Contains the peer/session model used by the connection manager, the
//! wallet-side transaction record (`TxRecord`, `TxIn`, `TxOut`), UTXOs,
//! and the classified ledger (`Ledger`, `LedgerEntry`, `Direction`).

use bitcoin::{Address, Amount, PublicKey, ScriptBuf, SignedAmount, Txid};
use serde::Serialize;

// ==============================================================================
// Peers and Sessions
// ==============================================================================

/// Transport security for a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    Plaintext,
    Tls,
}

/// A candidate Electrum server. Immutable once selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peer {
    pub host: String,
    pub port: u16,
    pub security: Security,
}

impl Peer {
    pub fn tls(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: Security::Tls,
        }
    }

    pub fn plaintext(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: Security::Plaintext,
        }
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lifecycle state of the single client session. Owned exclusively by the
/// connection manager; written only by its connect routine and RPC error
/// paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

/// Capabilities derived from the `server.version` handshake. Read-only for
/// the lifetime of a session; re-derived on every reconnect because a
/// different peer may answer.
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    pub supports_batching: bool,
    pub server_identity: String,
    pub protocol_version: String,
}

/// Snapshot of the connection manager's state for callers.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub peer: Peer,
    pub server_identity: Option<String>,
}

// ==============================================================================
// Addresses and UTXOs
// ==============================================================================

/// An address the wallet controls, as produced by the external key
/// derivation collaborator. Treated as opaque identity here; account sync
/// carries the derivation metadata through so callers can hand out the
/// next unused address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletAddress {
    pub address: Address,
    pub derivation_path: String,
    pub public_key: PublicKey,
}

/// An unspent transaction output belonging to one of the wallet's
/// addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: Amount,
    pub address: Address,
    /// Confirmation height; `None` for mempool outputs.
    pub height: Option<u32>,
}

// ==============================================================================
// Transaction Records
// ==============================================================================

/// A decoded transaction as seen from the wallet's side.
///
/// Produced either from the server's verbose response or by decoding a raw
/// hex transaction (see [`crate::electrum::RawTx`]). Input values are not
/// carried here; the ledger reconstructor resolves them from the source
/// transactions when computing fees.
#[derive(Debug, Clone, Serialize)]
pub struct TxRecord {
    pub txid: Txid,
    pub version: i32,
    pub locktime: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Zero for unconfirmed transactions.
    pub confirmations: u32,
    pub block_time: Option<u64>,
}

/// A transaction input reference (the outpoint being spent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxIn {
    pub txid: Txid,
    pub vout: u32,
    pub sequence: u32,
}

/// A transaction output with its script and, where the script has a
/// standard address form, the resolved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
    pub address: Option<Address>,
}

// ==============================================================================
// Classified Ledger
// ==============================================================================

/// Direction of a ledger entry from the wallet's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Received,
    Sent,
}

/// One classified, fee-annotated ledger entry. Read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub txid: Txid,
    pub direction: Direction,
    /// Received: sum of outputs paying wallet receive addresses.
    /// Sent: sum of outputs paying external (non-wallet, non-change)
    /// addresses.
    pub value: Amount,
    /// The external address on the other side of the transfer, when one
    /// could be resolved from the scripts.
    pub counter_address: Option<Address>,
    /// Sent entries only: sum of input values minus sum of output values.
    /// `None` when a fee could not be computed.
    pub fee: Option<Amount>,
    /// True when one or more input source transactions were unavailable,
    /// leaving the fee uncomputable.
    pub fee_unresolved: bool,
    pub confirmations: u32,
    pub block_time: Option<u64>,
    /// Account balance immediately after this entry, in chronological
    /// order.
    pub running_balance: SignedAmount,
}

/// The reconstructed account ledger, newest entry first.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub entries: Vec<LedgerEntry>,
    /// Balance after the most recent entry.
    pub balance: SignedAmount,
}

impl Ledger {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            balance: SignedAmount::ZERO,
        }
    }
}
