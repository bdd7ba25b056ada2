//! Batched-query scheduling.
//!
//! Turns large key sets (addresses, txids) into chunked wire requests.
//! Each chunk goes out either as one batched call or as per-key single
//! calls, depending on the server capability detected at handshake time.
//! Chunking is a pure performance concern: for a given key set the result
//! mapping is the same for every chunk size.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use async_trait::async_trait;
use tracing::warn;

use crate::error::WalletError;

/// One query family (history, unspent, transaction fetch, ...) executed
/// against the session, in single and batched form. `batch` receives at
/// most one chunk's worth of keys.
#[async_trait]
pub trait BatchQuery<K, V>
where
    K: Send + Sync,
    V: Send,
{
    async fn single(&mut self, key: &K) -> Result<V, WalletError>;

    async fn batch(&mut self, keys: &[K]) -> Result<Vec<(K, V)>, WalletError>;
}

/// Collapse duplicate keys, keeping first-seen order. Redundant round
/// trips for the same key are wasted work and some servers reject
/// duplicate batch entries.
#[must_use]
pub fn dedup_keys<K: Clone + Eq + Hash>(items: &[K]) -> Vec<K> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|k| seen.insert((*k).clone()))
        .cloned()
        .collect()
}

/// Execute `op` over `items` in contiguous chunks of at most `chunk_size`,
/// merging everything into one key-to-result mapping.
///
/// With `use_batch`, each chunk is one batched call; a failed batch call
/// falls back to the sequential path for that chunk. On the sequential
/// path, a per-key failure (server has no record of the key) omits that
/// key from the mapping rather than aborting the query. Transport faults
/// abort either way, since nothing after them can succeed.
pub async fn query_map<K, V, Q>(
    op: &mut Q,
    items: &[K],
    chunk_size: usize,
    use_batch: bool,
) -> Result<HashMap<K, V>, WalletError>
where
    K: Clone + Eq + Hash + Send + Sync + std::fmt::Debug,
    V: Send,
    Q: BatchQuery<K, V> + Send + ?Sized,
{
    let mut results = HashMap::with_capacity(items.len());

    for chunk in items.chunks(chunk_size.max(1)) {
        if use_batch {
            match op.batch(chunk).await {
                Ok(pairs) => {
                    results.extend(pairs);
                    continue;
                }
                Err(err) if err.is_transport_fault() => return Err(err),
                Err(err) => {
                    warn!(
                        chunk_len = chunk.len(),
                        error = %err,
                        "batched call failed; falling back to single calls"
                    );
                }
            }
        }

        for key in chunk {
            match op.single(key).await {
                Ok(value) => {
                    results.insert(key.clone(), value);
                }
                Err(WalletError::NotConnected) => return Err(WalletError::NotConnected),
                Err(err) if err.is_transport_fault() => return Err(err),
                Err(err) => {
                    // Some servers do not track every transaction they are
                    // asked about (e.g. inputs spent by our own txs).
                    warn!(key = ?key, error = %err, "query item failed; omitting key");
                }
            }
        }
    }

    Ok(results)
}
