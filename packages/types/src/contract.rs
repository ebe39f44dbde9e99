use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// The concrete on-chain target a logical event binding is pointed at.
///
/// `pending` selects the read confirmation policy: a pending contract is
/// read at `Unconfirmed` depth, otherwise only finalized logs are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundContract {
    pub address: Address,
    #[serde(default)]
    pub pending: bool,
}
