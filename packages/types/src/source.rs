use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::{Confirmations, FilterSpec, Log};

/// The external log-streaming collaborator.
///
/// Implementations own their polling and reorg handling; this interface is
/// an opaque keyed set of filters plus two query shapes. Each call is
/// atomic on its own, nothing more is assumed about internal concurrency.
/// Errors are opaque (`anyhow`) and classified by the caller; an absence
/// condition is signalled with a message containing "not found" or
/// "no rows".
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Whether a filter with this subscription name is currently registered.
    async fn has_filter(&self, name: &str) -> bool;

    async fn register_filter(&self, filter: FilterSpec) -> anyhow::Result<()>;

    async fn unregister_filter(&self, name: &str) -> anyhow::Result<()>;

    /// The single newest log for (signature, address) at the given depth.
    async fn latest_log_by_event_sig_with_confs(
        &self,
        event_sig: B256,
        address: Address,
        confs: Confirmations,
    ) -> anyhow::Result<Log>;

    /// All logs for (signature, address) whose topic at `topic_index`
    /// matches one of `topic_values`, at the given depth. The result is
    /// unordered. The source can only filter on a single topic slot; any
    /// further narrowing is the caller's job.
    async fn indexed_logs(
        &self,
        event_sig: B256,
        address: Address,
        topic_index: usize,
        topic_values: Vec<B256>,
        confs: Confirmations,
    ) -> anyhow::Result<Vec<Log>>;
}
