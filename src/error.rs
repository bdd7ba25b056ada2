use bitcoin::Amount;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// An RPC was attempted while the session is not connected.
    /// Never retried internally; surfaced to the caller immediately.
    #[error("not connected to an Electrum server")]
    NotConnected,

    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    #[error("invalid transaction data: {0}")]
    InvalidTxData(String),

    #[error("insufficient funds: {available} available, {required} required")]
    InsufficientFunds {
        available: Amount,
        required: Amount,
    },

    #[error("connection attempt cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WalletError {
    /// Whether this error indicates the underlying session is unusable.
    /// The connection manager flips to `Faulted` on these and drops the
    /// session so the next `connect()` runs the retry loop.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::InvalidResponse(_))
    }
}
