//! JSON-RPC 2.0 frames and Electrum result shapes.
//!
//! The Electrum wire protocol is plain JSON-RPC over a newline-delimited
//! stream. Batched calls are JSON arrays of request objects; responses are
//! matched back to requests by id, never by arrival order.

use bitcoin::Txid;

use crate::error::WalletError;

// ==============================================================================
// Frames
// ==============================================================================

#[derive(serde::Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) id: u64,
    pub(crate) method: &'a str,
    pub(crate) params: Vec<serde_json::Value>,
}

#[derive(serde::Deserialize)]
pub(crate) struct JsonRpcResponse {
    /// Absent on server notifications, which carry no id.
    #[serde(default)]
    pub(crate) id: serde_json::Value,
    pub(crate) result: Option<serde_json::Value>,
    pub(crate) error: Option<serde_json::Value>,
}

/// Parse a JSON-RPC error value into a structured `WalletError`.
///
/// JSON-RPC defines errors as `{"code": <int>, "message": <string>}`, but
/// some Electrum implementations reply with a bare string; both shapes are
/// handled, anything else falls back to `InvalidResponse`.
pub(crate) fn parse_jsonrpc_error(err: serde_json::Value) -> WalletError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    if let Ok(parsed) = serde_json::from_value::<JsonRpcError>(err.clone()) {
        return WalletError::Server {
            code: parsed.code,
            message: parsed.message,
        };
    }
    if let Some(message) = err.as_str() {
        return WalletError::Server {
            code: 0,
            message: message.to_owned(),
        };
    }
    WalletError::InvalidResponse(format!("non-standard JSON-RPC error: {err}"))
}

pub(crate) fn parse_response_id(id: &serde_json::Value) -> Result<u64, WalletError> {
    if let Some(n) = id.as_u64() {
        return Ok(n);
    }

    if let Some(s) = id.as_str() {
        return s.parse::<u64>().map_err(|e| {
            WalletError::InvalidResponse(format!("invalid response id string: {e}"))
        });
    }

    Err(WalletError::InvalidResponse(format!(
        "invalid response id: {id}"
    )))
}

// ==============================================================================
// Result Shapes
// ==============================================================================

/// `blockchain.scripthash.get_balance` result, in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

/// One entry of `blockchain.scripthash.get_history`.
///
/// `height > 0` is the confirmation height; `0` means mempool; negative
/// means unconfirmed with unconfirmed parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "tx_hash")]
    pub txid: Txid,
    pub height: i32,
}

/// One entry of `blockchain.scripthash.listunspent`. `value` is in
/// satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct UnspentEntry {
    #[serde(rename = "tx_hash")]
    pub txid: Txid,
    #[serde(rename = "tx_pos")]
    pub vout: u32,
    pub value: u64,
    pub height: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_id_u64() {
        let val = serde_json::json!(42);
        assert_eq!(parse_response_id(&val).expect("should parse"), 42);
    }

    #[test]
    fn parse_response_id_string() {
        let val = serde_json::json!("123");
        assert_eq!(parse_response_id(&val).expect("should parse"), 123);
    }

    #[test]
    fn parse_response_id_invalid() {
        let val = serde_json::json!(true);
        assert!(parse_response_id(&val).is_err());
    }

    #[test]
    fn structured_error_becomes_server_error() {
        let err = parse_jsonrpc_error(serde_json::json!({
            "code": -32601,
            "message": "unknown method"
        }));
        assert!(matches!(
            err,
            WalletError::Server { code: -32601, ref message } if message == "unknown method"
        ));
    }

    #[test]
    fn bare_string_error_becomes_server_error() {
        let err = parse_jsonrpc_error(serde_json::json!(
            "the transaction was rejected by network rules"
        ));
        assert!(matches!(err, WalletError::Server { code: 0, .. }));
    }

    #[test]
    fn history_entry_uses_wire_field_names() {
        let entry: HistoryEntry = serde_json::from_value(serde_json::json!({
            "tx_hash": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "height": 170
        }))
        .expect("history entry must deserialize");
        assert_eq!(entry.height, 170);
    }

    #[test]
    fn unspent_entry_uses_wire_field_names() {
        let entry: UnspentEntry = serde_json::from_value(serde_json::json!({
            "tx_hash": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "tx_pos": 1,
            "value": 50_000,
            "height": 120
        }))
        .expect("unspent entry must deserialize");
        assert_eq!(entry.vout, 1);
        assert_eq!(entry.value, 50_000);
    }
}
