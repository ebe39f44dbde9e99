use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// One on-chain event record, as handed back by a [`LogSource`](crate::LogSource).
///
/// `(block_number, log_index)` is unique per log and forms the total order
/// used for "latest" selection. Topic 0 is always the event signature hash;
/// up to three further topics carry indexed field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub block_number: u64,
    pub log_index: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub address: Address,
    /// Convenience copy of topic 0.
    pub event_sig: B256,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub block_timestamp: Option<u64>,
}

impl Log {
    /// The topic at `index`, if the log carries that many.
    pub fn topic(&self, index: usize) -> Option<&B256> {
        self.topics.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn test_serde_round_trip() {
        let log = Log {
            block_number: 12,
            log_index: 3,
            block_hash: keccak256(b"block"),
            tx_hash: keccak256(b"tx"),
            address: Address::repeat_byte(0x11),
            event_sig: keccak256(b"Transfer(address,address,uint256)"),
            topics: vec![keccak256(b"Transfer(address,address,uint256)")],
            data: Bytes::from(vec![0u8; 32]),
            block_timestamp: Some(1_700_000_000),
        };

        let json = serde_json::to_string(&log).unwrap();
        let back: Log = serde_json::from_str(&json).unwrap();
        assert_eq!(log, back);
    }
}
