//! Connection manager for the Electrum session.
//!
//! Owns the single transport session and its lifecycle: a retry-forever
//! connect loop with a cancellation signal, capability probing at handshake
//! time, the txid-to-height cache, and the typed RPC surface (single and
//! batched). All shared mutable state lives behind `&mut self`; callers
//! needing concurrency serialize access externally, matching the
//! one-in-flight-operation session model.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitcoin::{Address, Amount, Network, Txid};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::batch::{dedup_keys, query_map, BatchQuery};
use crate::electrum::protocol::{Balance, HistoryEntry, UnspentEntry};
use crate::electrum::transport::ElectrumSession;
use crate::electrum::{parse_tx_result, RawTx};
use crate::error::WalletError;
use crate::scripthash::address_to_scripthash;
use crate::types::{
    ConnectionStatus, Peer, ServerCapabilities, SessionState, TxRecord, Utxo,
};

/// Name announced to the server during `server.version` negotiation.
const CLIENT_NAME: &str = concat!("siskin ", env!("CARGO_PKG_VERSION"));
const PROTOCOL_VERSION: &str = "1.4";

/// Server families known to reject batched (JSON array) requests.
const NON_BATCHING_SERVER_PREFIXES: &[&str] = &["ElectrumPersonalServer", "electrs"];

// Linear block-height estimator used to backfill confirmation counts for
// raw-hex transactions, anchored at a fixed (height, timestamp) pair with
// 9.5-minute average spacing.
const HEIGHT_ANCHOR: u64 = 627_179;
const HEIGHT_ANCHOR_TS_MS: u64 = 1_587_570_465_609;
const AVG_BLOCK_SECS: f64 = 9.5 * 60.0;

// ==============================================================================
// Configuration
// ==============================================================================

/// Connection manager configuration. Chunk sizes are tunable because
/// server response-size limits vary; transaction fetches use a smaller
/// default than address-level queries since their payloads are far
/// larger.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub peer: Peer,
    pub network: Network,
    /// Fixed backoff between reconnect attempts.
    pub retry_delay: Duration,
    /// Chunk size for scripthash-level queries (history, unspent).
    pub address_chunk_size: usize,
    /// Chunk size for full-transaction fetches.
    pub tx_chunk_size: usize,
}

impl ClientConfig {
    pub fn new(peer: Peer, network: Network) -> Self {
        Self {
            peer,
            network,
            retry_delay: Duration::from_millis(500),
            address_chunk_size: 100,
            tx_chunk_size: 45,
        }
    }
}

/// Fee estimates for three confirmation targets, in sat/vB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTiers {
    pub fast: u64,
    pub medium: u64,
    pub slow: u64,
}

// ==============================================================================
// Client
// ==============================================================================

/// The wallet's single Electrum connection.
pub struct ElectrumClient {
    config: ClientConfig,
    session: Option<ElectrumSession>,
    state: SessionState,
    capabilities: Option<ServerCapabilities>,
    /// Txid to confirmation height, populated from history responses.
    /// Write-once-idempotent, never evicted; process scoped and small.
    tx_height_cache: HashMap<Txid, i32>,
}

impl ElectrumClient {
    pub fn new(config: ClientConfig) -> Result<Self, WalletError> {
        if config.address_chunk_size == 0 || config.tx_chunk_size == 0 {
            return Err(WalletError::Config(
                "chunk sizes must be at least 1".to_owned(),
            ));
        }
        if config.peer.host.is_empty() {
            return Err(WalletError::Config("peer host must not be empty".to_owned()));
        }
        Ok(Self {
            config,
            session: None,
            state: SessionState::Disconnected,
            capabilities: None,
            tx_height_cache: HashMap::new(),
        })
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Establish a session, retrying with a fixed backoff until success or
    /// cancellation. There is no retry cap; the `shutdown` watch channel is
    /// observed before every backoff sleep and flipping it to `true` (or
    /// dropping the sender) stops the loop with [`WalletError::Cancelled`].
    pub async fn connect(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), WalletError> {
        let mut attempt: u64 = 0;
        loop {
            if *shutdown.borrow() {
                self.state = SessionState::Disconnected;
                return Err(WalletError::Cancelled);
            }

            attempt += 1;
            self.state = SessionState::Connecting;
            match self.try_connect().await {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        peer = %self.config.peer,
                        attempt,
                        error = %err,
                        "connection attempt failed; retrying"
                    );
                    self.session = None;
                    self.capabilities = None;

                    tokio::select! {
                        _ = sleep(self.config.retry_delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                self.state = SessionState::Disconnected;
                                return Err(WalletError::Cancelled);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn try_connect(&mut self) -> Result<(), WalletError> {
        let mut session = ElectrumSession::open(&self.config.peer).await?;
        let (identity, protocol) = session
            .server_version(CLIENT_NAME, PROTOCOL_VERSION)
            .await?;

        // Capability must be re-derived per session: a reconnect may land
        // on a differently-capable peer.
        let supports_batching = server_supports_batching(&identity);
        if !supports_batching {
            info!(server = %identity, "server family lacks batch support; using single calls");
        }
        info!(
            peer = %self.config.peer,
            server = %identity,
            protocol = %protocol,
            batching = supports_batching,
            "connected"
        );
        self.capabilities = Some(ServerCapabilities {
            supports_batching,
            server_identity: identity,
            protocol_version: protocol,
        });
        self.session = Some(session);
        Ok(())
    }

    /// Release the transport. Safe to call when never connected.
    pub fn close(&mut self) {
        self.session = None;
        self.capabilities = None;
        self.state = SessionState::Disconnected;
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.state == SessionState::Connected,
            peer: self.config.peer.clone(),
            server_identity: self
                .capabilities
                .as_ref()
                .map(|c| c.server_identity.clone()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.as_ref()
    }

    // ==========================================================================
    // Single RPCs
    // ==========================================================================

    pub async fn get_balance(&mut self, address: &Address) -> Result<Balance, WalletError> {
        let scripthash = address_to_scripthash(address);
        let result = self
            .request(
                "blockchain.scripthash.get_balance",
                vec![serde_json::json!(scripthash)],
            )
            .await?;
        serde_json::from_value(result)
            .map_err(|e| WalletError::InvalidResponse(format!("invalid balance result: {e}")))
    }

    pub async fn get_history(
        &mut self,
        address: &Address,
    ) -> Result<Vec<HistoryEntry>, WalletError> {
        let scripthash = address_to_scripthash(address);
        let result = self
            .request(
                "blockchain.scripthash.get_history",
                vec![serde_json::json!(scripthash)],
            )
            .await?;
        let entries = parse_history_entries(result)?;
        self.cache_heights(&entries);
        Ok(entries)
    }

    pub async fn list_unspent(&mut self, address: &Address) -> Result<Vec<Utxo>, WalletError> {
        let scripthash = address_to_scripthash(address);
        let result = self
            .request(
                "blockchain.scripthash.listunspent",
                vec![serde_json::json!(scripthash)],
            )
            .await?;
        let entries = parse_unspent_entries(result)?;
        Ok(entries
            .into_iter()
            .map(|entry| utxo_from_entry(entry, address.clone()))
            .collect())
    }

    pub async fn get_transaction(&mut self, txid: &Txid) -> Result<TxRecord, WalletError> {
        let result = self
            .request(
                "blockchain.transaction.get",
                vec![serde_json::json!(txid.to_string()), serde_json::json!(true)],
            )
            .await?;
        let raw = parse_tx_result(result, self.config.network)?;
        decode_with_backfill(raw, self.config.network, &self.tx_height_cache)
    }

    /// Fee estimate for the given confirmation target, converted from the
    /// server's BTC-per-kilobyte float to sat/vB. A server that cannot
    /// estimate answers -1; the caller-visible floor is 1 sat/vB.
    pub async fn estimate_fee(&mut self, target_blocks: u32) -> Result<u64, WalletError> {
        let result = self
            .request(
                "blockchain.estimatefee",
                vec![serde_json::json!(target_blocks)],
            )
            .await?;
        let btc_per_kb = result.as_f64().ok_or_else(|| {
            WalletError::InvalidResponse(format!("invalid estimatefee result: {result}"))
        })?;
        if btc_per_kb < 0.0 {
            return Ok(1);
        }
        Ok((btc_per_kb / 1024.0 * 100_000_000.0).round() as u64)
    }

    /// Fast / medium / slow estimates at 1, 18, and 144 block targets.
    pub async fn estimate_fee_tiers(&mut self) -> Result<FeeTiers, WalletError> {
        Ok(FeeTiers {
            fast: self.estimate_fee(1).await?,
            medium: self.estimate_fee(18).await?,
            slow: self.estimate_fee(144).await?,
        })
    }

    /// Submit a signed raw transaction. Server-side rejection surfaces as
    /// [`WalletError::Server`] rather than being swallowed.
    pub async fn broadcast(&mut self, tx_hex: &str) -> Result<Txid, WalletError> {
        let result = self
            .request(
                "blockchain.transaction.broadcast",
                vec![serde_json::json!(tx_hex)],
            )
            .await?;
        result
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                WalletError::InvalidResponse(format!("invalid broadcast result: {result}"))
            })
    }

    // ==========================================================================
    // Batched RPCs
    // ==========================================================================

    /// Transaction history for many addresses at once.
    pub async fn multi_get_history(
        &mut self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, Vec<HistoryEntry>>, WalletError> {
        let (use_batch, chunk) = self.batch_policy(self.config.address_chunk_size)?;
        let session = self.session.as_mut().ok_or(WalletError::NotConnected)?;
        let mut op = ScripthashQuery {
            session,
            method: "blockchain.scripthash.get_history",
            parse: parse_history_entries,
        };
        let result = query_map(&mut op, addresses, chunk, use_batch).await;
        let histories = self.absorb_fault(result)?;

        for entries in histories.values() {
            self.cache_heights(entries);
        }
        Ok(histories)
    }

    /// Spendable outputs for many addresses at once, flattened with their
    /// owning address attached.
    pub async fn multi_get_utxos(
        &mut self,
        addresses: &[Address],
    ) -> Result<Vec<Utxo>, WalletError> {
        let (use_batch, chunk) = self.batch_policy(self.config.address_chunk_size)?;
        let session = self.session.as_mut().ok_or(WalletError::NotConnected)?;
        let mut op = ScripthashQuery {
            session,
            method: "blockchain.scripthash.listunspent",
            parse: parse_unspent_entries,
        };
        let result = query_map(&mut op, addresses, chunk, use_batch).await;
        let per_address = self.absorb_fault(result)?;

        Ok(per_address
            .into_iter()
            .flat_map(|(address, entries)| {
                entries
                    .into_iter()
                    .map(move |entry| utxo_from_entry(entry, address.clone()))
            })
            .collect())
    }

    /// Full transaction records for many txids at once. Duplicate ids are
    /// collapsed before chunking; ids the server has no record of are
    /// omitted from the result.
    pub async fn multi_get_transactions(
        &mut self,
        txids: &[Txid],
    ) -> Result<HashMap<Txid, TxRecord>, WalletError> {
        let distinct = dedup_keys(txids);
        let (use_batch, chunk) = self.batch_policy(self.config.tx_chunk_size)?;
        let network = self.config.network;
        let session = self.session.as_mut().ok_or(WalletError::NotConnected)?;
        let mut op = TransactionQuery {
            session,
            network,
            height_cache: &self.tx_height_cache,
        };
        let result = query_map(&mut op, &distinct, chunk, use_batch).await;
        self.absorb_fault(result)
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    async fn request(
        &mut self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, WalletError> {
        if self.state != SessionState::Connected {
            return Err(WalletError::NotConnected);
        }
        let session = self.session.as_mut().ok_or(WalletError::NotConnected)?;
        let result = session.call(method, params).await;
        self.absorb_fault(result)
    }

    /// A transport-level failure poisons the session: flip to `Faulted`
    /// and drop it so the next `connect()` runs the retry loop. Other
    /// errors pass through untouched.
    fn absorb_fault<T>(&mut self, result: Result<T, WalletError>) -> Result<T, WalletError> {
        if let Err(err) = &result {
            if err.is_transport_fault() {
                warn!(peer = %self.config.peer, error = %err, "session faulted");
                self.state = SessionState::Faulted;
                self.session = None;
                self.capabilities = None;
            }
        }
        result
    }

    fn batch_policy(&self, chunk_size: usize) -> Result<(bool, usize), WalletError> {
        if self.state != SessionState::Connected {
            return Err(WalletError::NotConnected);
        }
        let use_batch = self
            .capabilities
            .as_ref()
            .map(|c| c.supports_batching)
            .unwrap_or(false);
        Ok((use_batch, chunk_size))
    }

    fn cache_heights(&mut self, entries: &[HistoryEntry]) {
        for entry in entries {
            if entry.height > 0 {
                self.tx_height_cache.insert(entry.txid, entry.height);
            }
        }
    }
}

/// Prefix match against server families known to lack batch support.
fn server_supports_batching(identity: &str) -> bool {
    !NON_BATCHING_SERVER_PREFIXES
        .iter()
        .any(|prefix| identity.starts_with(prefix))
}

// ==============================================================================
// Trait Seams
// ==============================================================================

#[async_trait::async_trait]
impl crate::ledger::TxSource for ElectrumClient {
    async fn transactions(
        &mut self,
        txids: &[Txid],
    ) -> Result<HashMap<Txid, TxRecord>, WalletError> {
        self.multi_get_transactions(txids).await
    }
}

#[async_trait::async_trait]
impl crate::account::WalletBackend for ElectrumClient {
    async fn histories(
        &mut self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, Vec<HistoryEntry>>, WalletError> {
        self.multi_get_history(addresses).await
    }

    async fn unspent(&mut self, addresses: &[Address]) -> Result<Vec<Utxo>, WalletError> {
        self.multi_get_utxos(addresses).await
    }
}

// ==============================================================================
// Height Estimation and Backfill
// ==============================================================================

/// Estimate the current chain tip height from wall-clock time. Only used
/// to approximate confirmation counts when a server returns raw hex with
/// no confirmation data; never used for consensus-relevant decisions.
fn estimate_tip_height() -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(HEIGHT_ANCHOR_TS_MS);
    let elapsed_secs = now_ms.saturating_sub(HEIGHT_ANCHOR_TS_MS) / 1000;
    HEIGHT_ANCHOR + (elapsed_secs as f64 / AVG_BLOCK_SECS) as u64
}

/// Approximate timestamp of a block at `height`, from the same anchor.
fn estimate_block_time(height: u64) -> u64 {
    let base_secs = HEIGHT_ANCHOR_TS_MS / 1000;
    base_secs.saturating_add(((height.saturating_sub(HEIGHT_ANCHOR)) as f64 * AVG_BLOCK_SECS) as u64)
}

/// Decode a `transaction.get` result, backfilling confirmations and block
/// time for the raw-hex shape from the height cache. The estimator can lag
/// the real tip, so the confirmation count is clamped below at 1 for any
/// cached (confirmed) height.
fn decode_with_backfill(
    raw: RawTx,
    network: Network,
    height_cache: &HashMap<Txid, i32>,
) -> Result<TxRecord, WalletError> {
    let was_raw = matches!(raw, RawTx::RawHex(_));
    let mut record = raw.into_record(network)?;

    if was_raw {
        if let Some(&height) = height_cache.get(&record.txid) {
            if height > 0 {
                let tip = estimate_tip_height();
                record.confirmations =
                    tip.saturating_sub(height as u64).max(1) as u32;
                record.block_time = Some(estimate_block_time(height as u64));
                debug!(
                    txid = %record.txid,
                    height,
                    confirmations = record.confirmations,
                    "backfilled confirmations from height cache"
                );
            }
        }
    }
    Ok(record)
}

// ==============================================================================
// Batch Adapters
// ==============================================================================

fn parse_history_entries(value: serde_json::Value) -> Result<Vec<HistoryEntry>, WalletError> {
    serde_json::from_value(value)
        .map_err(|e| WalletError::InvalidTxData(format!("invalid history result: {e}")))
}

fn parse_unspent_entries(value: serde_json::Value) -> Result<Vec<UnspentEntry>, WalletError> {
    serde_json::from_value(value)
        .map_err(|e| WalletError::InvalidTxData(format!("invalid listunspent result: {e}")))
}

fn utxo_from_entry(entry: UnspentEntry, address: Address) -> Utxo {
    Utxo {
        txid: entry.txid,
        vout: entry.vout,
        value: Amount::from_sat(entry.value),
        address,
        height: u32::try_from(entry.height).ok().filter(|h| *h > 0),
    }
}

/// Scripthash-keyed query family (history, unspent). The key is the
/// address; its scripthash is derived per call.
struct ScripthashQuery<'a, V> {
    session: &'a mut ElectrumSession,
    method: &'static str,
    parse: fn(serde_json::Value) -> Result<V, WalletError>,
}

#[async_trait::async_trait]
impl<V: Send> BatchQuery<Address, V> for ScripthashQuery<'_, V> {
    async fn single(&mut self, key: &Address) -> Result<V, WalletError> {
        let result = self
            .session
            .call(
                self.method,
                vec![serde_json::json!(address_to_scripthash(key))],
            )
            .await?;
        (self.parse)(result)
    }

    async fn batch(&mut self, keys: &[Address]) -> Result<Vec<(Address, V)>, WalletError> {
        let params = keys
            .iter()
            .map(|key| vec![serde_json::json!(address_to_scripthash(key))])
            .collect();
        let results = self.session.call_batch(self.method, params).await?;

        let mut pairs = Vec::with_capacity(keys.len());
        for (key, result) in keys.iter().zip(results) {
            if let Some(value) = result {
                pairs.push((key.clone(), (self.parse)(value)?));
            }
        }
        Ok(pairs)
    }
}

/// Full-transaction query family, with raw-hex decoding and confirmation
/// backfill.
struct TransactionQuery<'a> {
    session: &'a mut ElectrumSession,
    network: Network,
    height_cache: &'a HashMap<Txid, i32>,
}

#[async_trait::async_trait]
impl BatchQuery<Txid, TxRecord> for TransactionQuery<'_> {
    async fn single(&mut self, key: &Txid) -> Result<TxRecord, WalletError> {
        let result = self
            .session
            .call(
                "blockchain.transaction.get",
                vec![serde_json::json!(key.to_string()), serde_json::json!(true)],
            )
            .await?;
        let raw = parse_tx_result(result, self.network)?;
        decode_with_backfill(raw, self.network, self.height_cache)
    }

    async fn batch(&mut self, keys: &[Txid]) -> Result<Vec<(Txid, TxRecord)>, WalletError> {
        let params = keys
            .iter()
            .map(|key| vec![serde_json::json!(key.to_string()), serde_json::json!(true)])
            .collect();
        let results = self
            .session
            .call_batch("blockchain.transaction.get", params)
            .await?;

        let mut pairs = Vec::with_capacity(keys.len());
        for (key, result) in keys.iter().zip(results) {
            if let Some(value) = result {
                let raw = parse_tx_result(value, self.network)?;
                pairs.push((
                    *key,
                    decode_with_backfill(raw, self.network, self.height_cache)?,
                ));
            }
        }
        Ok(pairs)
    }
}

// ==============================================================================
// Tests
// ==============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::addr_from_byte;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    fn loopback_config(port: u16) -> ClientConfig {
        let mut config = ClientConfig::new(Peer::plaintext("127.0.0.1", port), Network::Regtest);
        config.retry_delay = Duration::from_millis(10);
        config
    }

    /// Answer one `server.version` handshake on an accepted socket.
    async fn serve_handshake(socket: TcpStream, identity: &str) {
        let mut reader = BufReader::new(socket);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read handshake");
        let req: serde_json::Value = serde_json::from_str(&line).expect("handshake is json");
        assert_eq!(req["method"], "server.version");

        let response = serde_json::json!({
            "jsonrpc": "2.0",
            "id": req["id"],
            "result": [identity, "1.4"]
        });
        reader
            .get_mut()
            .write_all(format!("{response}\n").as_bytes())
            .await
            .expect("write handshake response");
    }

    #[test]
    fn batching_capability_by_server_family() {
        assert!(!server_supports_batching("ElectrumPersonalServer 0.2.1"));
        assert!(!server_supports_batching("electrs/0.9.9"));
        assert!(server_supports_batching("ElectrumX 1.16.0"));
        assert!(server_supports_batching("Fulcrum 1.9.0"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = loopback_config(1);
        config.tx_chunk_size = 0;
        assert!(matches!(
            ElectrumClient::new(config),
            Err(WalletError::Config(_))
        ));
    }

    #[tokio::test]
    async fn rpc_while_disconnected_fails_immediately() {
        let mut client = ElectrumClient::new(loopback_config(1)).expect("client");
        let err = client
            .get_balance(&addr_from_byte(1))
            .await
            .expect_err("must not silently wait for a reconnect");
        assert!(matches!(err, WalletError::NotConnected));
    }

    #[tokio::test]
    async fn connect_retries_until_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            // Kill the first two connections before the handshake; answer
            // the third.
            for _ in 0..2 {
                let (socket, _) = listener.accept().await.expect("accept");
                drop(socket);
            }
            let (socket, _) = listener.accept().await.expect("accept");
            serve_handshake(socket, "MockServer 1.0").await;
        });

        let mut client = ElectrumClient::new(loopback_config(port)).expect("client");
        let (_tx, mut shutdown) = watch::channel(false);
        client
            .connect(&mut shutdown)
            .await
            .expect("third attempt must succeed without extra connect() calls");
        server.await.expect("server task");

        assert_eq!(client.state(), SessionState::Connected);
        let status = client.status();
        assert!(status.connected);
        assert_eq!(status.server_identity.as_deref(), Some("MockServer 1.0"));
        assert!(
            client.capabilities().expect("caps").supports_batching,
            "unknown server family defaults to batching"
        );
    }

    #[tokio::test]
    async fn handshake_detects_non_batching_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            serve_handshake(socket, "ElectrumPersonalServer 0.2.1").await;
        });

        let mut client = ElectrumClient::new(loopback_config(port)).expect("client");
        let (_tx, mut shutdown) = watch::channel(false);
        client.connect(&mut shutdown).await.expect("connect");
        server.await.expect("server task");

        assert!(!client.capabilities().expect("caps").supports_batching);
    }

    #[tokio::test]
    async fn raised_shutdown_cancels_the_retry_loop() {
        // Nothing is listening on the peer port, so every attempt fails.
        let mut client = ElectrumClient::new(loopback_config(1)).expect("client");
        let (tx, mut shutdown) = watch::channel(false);
        tx.send(true).expect("signal shutdown");

        let err = client
            .connect(&mut shutdown)
            .await
            .expect_err("must observe the shutdown signal");
        assert!(matches!(err, WalletError::Cancelled));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn close_is_safe_when_never_connected() {
        let mut client = ElectrumClient::new(loopback_config(1)).expect("client");
        client.close();
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.status().server_identity.is_none());
    }

    #[test]
    fn tip_estimate_is_after_the_anchor() {
        assert!(estimate_tip_height() > HEIGHT_ANCHOR);
        assert!(estimate_block_time(HEIGHT_ANCHOR + 10) > HEIGHT_ANCHOR_TS_MS / 1000);
    }
}
