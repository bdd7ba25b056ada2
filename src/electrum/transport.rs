//! TCP/TLS transport session for the Electrum line protocol.
//!
//! One session owns one stream. Requests and responses are single JSON
//! lines; batched requests are one JSON array line. The session assumes a
//! single in-flight logical operation at a time; concurrent callers must
//! serialize externally (the connection manager owns the session mutably,
//! which enforces this at the type level).

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace, warn};

use crate::error::WalletError;
use crate::types::{Peer, Security};

use super::protocol::{parse_jsonrpc_error, parse_response_id, JsonRpcRequest, JsonRpcResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

// ==============================================================================
// Stream
// ==============================================================================

enum ElectrumStream {
    Plain(BufStream<TcpStream>),
    Tls(Box<BufStream<TlsStream<TcpStream>>>),
}

impl ElectrumStream {
    async fn send_line(&mut self, payload: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(s) => {
                s.write_all(payload).await?;
                s.write_all(b"\n").await?;
                s.flush().await
            }
            Self::Tls(s) => {
                s.write_all(payload).await?;
                s.write_all(b"\n").await?;
                s.flush().await
            }
        }
    }

    async fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read_line(buf).await,
            Self::Tls(s) => s.read_line(buf).await,
        }
    }
}

fn tls_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

// ==============================================================================
// Session
// ==============================================================================

/// An open request/response session with one Electrum server.
pub(crate) struct ElectrumSession {
    stream: ElectrumStream,
    next_id: u64,
}

impl ElectrumSession {
    /// Dial the peer and wrap the stream. Does not perform the protocol
    /// handshake; the connection manager drives that separately so it can
    /// record capabilities.
    pub(crate) async fn open(peer: &Peer) -> Result<Self, WalletError> {
        let tcp = timeout(CONNECT_TIMEOUT, TcpStream::connect((peer.host.as_str(), peer.port)))
            .await
            .map_err(|_| timeout_error("connect"))??;
        tcp.set_nodelay(true)?;

        let stream = match peer.security {
            Security::Plaintext => ElectrumStream::Plain(BufStream::new(tcp)),
            Security::Tls => {
                let server_name = ServerName::try_from(peer.host.clone()).map_err(|e| {
                    WalletError::Config(format!("invalid TLS server name `{}`: {e}", peer.host))
                })?;
                let tls = timeout(CONNECT_TIMEOUT, tls_connector().connect(server_name, tcp))
                    .await
                    .map_err(|_| timeout_error("TLS handshake"))??;
                ElectrumStream::Tls(Box::new(BufStream::new(tls)))
            }
        };

        Ok(Self { stream, next_id: 0 })
    }

    fn reserve_ids(&mut self, count: u64) -> u64 {
        let start = self.next_id;
        self.next_id += count;
        start
    }

    /// Issue one request and wait for its response. Server notifications
    /// (frames without our request id) arriving in between are skipped.
    pub(crate) async fn call(
        &mut self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, WalletError> {
        let id = self.reserve_ids(1);
        debug!(rpc.id = id, rpc.method = method, rpc.params = params.len(), "rpc call");
        let frame = serde_json::to_vec(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| WalletError::InvalidTxData(format!("encode request: {e}")))?;
        self.stream.send_line(&frame).await?;

        loop {
            let body = self.read_frame().await?;
            trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response frame");
            let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
                WalletError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
            })?;

            if decoded.id.is_null() || parse_response_id(&decoded.id).ok() != Some(id) {
                trace!(rpc.id = id, "skipping unsolicited frame");
                continue;
            }

            if let Some(err) = decoded.error {
                return Err(parse_jsonrpc_error(err));
            }
            return Ok(decoded.result.unwrap_or(serde_json::Value::Null));
        }
    }

    /// Issue one batched request (a JSON array of calls to `method`, one
    /// per parameter list) and return the results positionally.
    ///
    /// Per-item server errors are tolerated and yield `None` at that
    /// position. A whole-batch rejection (one error object instead of an
    /// array) surfaces as [`WalletError::Server`] so callers can retry the
    /// chunk as single calls; only transport failures poison the session.
    pub(crate) async fn call_batch(
        &mut self,
        method: &str,
        params_per_item: Vec<Vec<serde_json::Value>>,
    ) -> Result<Vec<Option<serde_json::Value>>, WalletError> {
        if params_per_item.is_empty() {
            return Ok(Vec::new());
        }

        let count = params_per_item.len();
        let start_id = self.reserve_ids(count as u64);
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = count,
            rpc.method = method,
            "rpc batch call"
        );
        let requests: Vec<JsonRpcRequest<'_>> = params_per_item
            .into_iter()
            .enumerate()
            .map(|(offset, params)| JsonRpcRequest {
                jsonrpc: "2.0",
                id: start_id + offset as u64,
                method,
                params,
            })
            .collect();
        let frame = serde_json::to_vec(&requests)
            .map_err(|e| WalletError::InvalidTxData(format!("encode batch request: {e}")))?;
        self.stream.send_line(&frame).await?;

        let decoded = loop {
            let body = self.read_frame().await?;
            trace!(rpc.batch_start_id = start_id, body = %body, "rpc batch response frame");
            if !body.trim_start().starts_with('[') {
                // A server rejecting the batch as a whole answers with one
                // error object (id null); anything else here is a
                // notification to skip.
                if let Ok(single) = serde_json::from_str::<JsonRpcResponse>(&body) {
                    if let Some(err) = single.error {
                        return Err(parse_jsonrpc_error(err));
                    }
                }
                trace!(rpc.batch_start_id = start_id, "skipping unsolicited frame");
                continue;
            }
            break serde_json::from_str::<Vec<JsonRpcResponse>>(&body).map_err(|e| {
                WalletError::InvalidResponse(format!("decode JSON-RPC batch response: {e}"))
            })?;
        };

        let mut by_id: HashMap<u64, JsonRpcResponse> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            by_id.insert(parse_response_id(&item.id)?, item);
        }

        let mut ordered = Vec::with_capacity(count);
        for id in start_id..(start_id + count as u64) {
            match by_id.remove(&id) {
                None => {
                    warn!(rpc.id = id, rpc.method = method, "batch item missing from response");
                    ordered.push(None);
                }
                Some(item) => match item.error {
                    Some(err) => {
                        warn!(
                            rpc.id = id,
                            rpc.method = method,
                            error = %parse_jsonrpc_error(err),
                            "batch item failed"
                        );
                        ordered.push(None);
                    }
                    None => ordered.push(Some(item.result.unwrap_or(serde_json::Value::Null))),
                },
            }
        }

        Ok(ordered)
    }

    /// `server.version` negotiation. Returns the raw
    /// `(server identity, protocol version)` pair.
    pub(crate) async fn server_version(
        &mut self,
        client_name: &str,
        protocol: &str,
    ) -> Result<(String, String), WalletError> {
        let result = self
            .call(
                "server.version",
                vec![serde_json::json!(client_name), serde_json::json!(protocol)],
            )
            .await?;

        let pair = result
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| {
                WalletError::InvalidResponse(format!("malformed server.version result: {result}"))
            })?;
        let identity = pair[0].as_str().ok_or_else(|| {
            WalletError::InvalidResponse("server.version identity is not a string".to_owned())
        })?;
        let version = pair[1].as_str().ok_or_else(|| {
            WalletError::InvalidResponse("server.version protocol is not a string".to_owned())
        })?;
        Ok((identity.to_owned(), version.to_owned()))
    }

    async fn read_frame(&mut self) -> Result<String, WalletError> {
        let mut line = String::new();
        let read = timeout(RESPONSE_TIMEOUT, self.stream.read_line(&mut line))
            .await
            .map_err(|_| timeout_error("response"))??;
        if read == 0 {
            return Err(WalletError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        Ok(line)
    }
}

fn timeout_error(what: &str) -> WalletError {
    WalletError::Transport(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{what} timed out"),
    ))
}
