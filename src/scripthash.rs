//! Address to Electrum lookup-key conversion.
//!
//! Electrum servers index activity by *scripthash*: the sha256 digest of an
//! address's output script, byte-reversed, hex encoded. The reversal is a
//! protocol convention and must be reproduced exactly for interoperability.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::hex::DisplayHex;
use bitcoin::{Address, Script};

/// Compute the Electrum scripthash for an output script.
#[must_use]
pub fn script_to_scripthash(script: &Script) -> String {
    let mut digest = sha256::Hash::hash(script.as_bytes()).to_byte_array();
    digest.reverse();
    digest.to_lower_hex_string()
}

/// Compute the Electrum scripthash for an address.
#[must_use]
pub fn address_to_scripthash(address: &Address) -> String {
    script_to_scripthash(&address.script_pubkey())
}
