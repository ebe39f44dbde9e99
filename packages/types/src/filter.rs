use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// A log subscription registered with a [`LogSource`](crate::LogSource).
///
/// `name` is the subscription identifier and must be unique per logical
/// binding instance, not per event signature: two bindings watching the
/// same event must not clobber each other's filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub event_sigs: Vec<B256>,
    pub addresses: Vec<Address>,
}

/// How deep a log must be buried before the source will return it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmations {
    /// Only logs in finalized (immutable) blocks.
    Finalized,
    /// Include logs from blocks that may still reorg.
    Unconfirmed,
}
