use std::sync::{Arc, RwLock};

use alloy_primitives::{Address, B256};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use relay_types::{BoundContract, Confirmations, FilterSpec, Log, LogSource};

use crate::codec::entry::{NamedArg, TypeDescriptor};
use crate::codec::{value, wrap_item_type, Codec, EventDef, MAX_TOPIC_FIELDS};
use crate::error::{classify_source_err, RelayError};

struct BindingState {
    address: Address,
    pending: bool,
    bound: bool,
    /// Latched on the first explicit `register` call and never reset by
    /// unregistration, so every later rebind re-registers automatically.
    register_requested: bool,
}

/// One (contract, event) log-filter subscription and its read path.
///
/// The binding owns the filter lifecycle at the log source, narrows
/// candidate logs by indexed topics beyond what the source can filter
/// natively, picks the newest survivor and decodes it through the codec.
pub struct EventBinding {
    contract_name: String,
    event_name: String,
    sig_hash: B256,
    /// Subscription identifier, unique per binding instance so two
    /// bindings sharing an event signature cannot clobber each other's
    /// filters at the source.
    id: String,
    params_item: String,
    data_item: String,
    /// All indexed inputs, in declaration order; the params item may
    /// cover only a prefix of these (or none), but every topic slot is
    /// parsed on decode.
    topic_args: Vec<NamedArg>,
    source: Arc<dyn LogSource>,
    codec: Arc<Codec>,
    state: RwLock<BindingState>,
    /// Serializes register/unregister/bind across their source calls;
    /// reads never take it.
    lifecycle: Mutex<()>,
}

impl std::fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBinding")
            .field("contract_name", &self.contract_name)
            .field("event_name", &self.event_name)
            .field("sig_hash", &self.sig_hash)
            .field("id", &self.id)
            .field("params_item", &self.params_item)
            .field("data_item", &self.data_item)
            .field("topic_args", &self.topic_args)
            .finish_non_exhaustive()
    }
}

impl EventBinding {
    /// The codec must already carry both item shapes for this event
    /// (see [`crate::CodecConfig::add_event`]).
    pub fn new(
        contract_name: impl Into<String>,
        event: &EventDef,
        source: Arc<dyn LogSource>,
        codec: Arc<Codec>,
    ) -> Result<Self, RelayError> {
        let contract_name = contract_name.into();
        let params_item = wrap_item_type(&contract_name, &event.name, true);
        let data_item = wrap_item_type(&contract_name, &event.name, false);
        for item in [&params_item, &data_item] {
            if codec.entry(item).is_err() {
                return Err(RelayError::invalid_config(format!(
                    "codec has no entry for {item}"
                )));
            }
        }

        let topic_args = event
            .indexed_inputs()
            .iter()
            .map(|def| {
                Ok(NamedArg {
                    name: def.name.clone(),
                    ty: TypeDescriptor::from_def(def)?,
                })
            })
            .collect::<Result<Vec<_>, RelayError>>()?;
        if topic_args.len() > MAX_TOPIC_FIELDS {
            return Err(RelayError::invalid_config(format!(
                "event {} has {} indexed fields, at most {MAX_TOPIC_FIELDS} fit in topics",
                event.name,
                topic_args.len()
            )));
        }

        let id = format!("{data_item}-{}", Uuid::now_v7().as_simple());
        Ok(Self {
            sig_hash: event.signature_hash(),
            event_name: event.name.clone(),
            contract_name,
            id,
            params_item,
            data_item,
            topic_args,
            source,
            codec,
            state: RwLock::new(BindingState {
                address: Address::ZERO,
                pending: false,
                bound: false,
                register_requested: false,
            }),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn signature_hash(&self) -> B256 {
        self.sig_hash
    }

    /// Creates the filter at the log source. No-op unless the binding is
    /// bound and no filter exists yet for this subscription id. The
    /// request is latched either way: once asked, every future bind
    /// keeps the binding registered.
    pub async fn register(&self) -> Result<(), RelayError> {
        let _guard = self.lifecycle.lock().await;
        self.register_locked().await
    }

    /// Removes the filter if present; idempotent.
    pub async fn unregister(&self) -> Result<(), RelayError> {
        let _guard = self.lifecycle.lock().await;
        self.unregister_locked().await
    }

    /// Points the binding at a (new) contract address. Any filter tied to
    /// the old address is removed first so it cannot survive the address
    /// change; registration is repeated only if it was ever requested.
    pub async fn bind(&self, contract: BoundContract) -> Result<(), RelayError> {
        let _guard = self.lifecycle.lock().await;
        self.unregister_locked().await?;

        let register_requested = {
            let mut state = self.state.write().unwrap();
            state.address = contract.address;
            state.pending = contract.pending;
            state.bound = true;
            state.register_requested
        };
        tracing::debug!(
            id = %self.id,
            address = %contract.address,
            pending = contract.pending,
            "bound event"
        );

        if register_requested {
            self.register_locked().await
        } else {
            Ok(())
        }
    }

    async fn register_locked(&self) -> Result<(), RelayError> {
        let address = {
            let mut state = self.state.write().unwrap();
            state.register_requested = true;
            if !state.bound {
                return Ok(());
            }
            state.address
        };
        if self.source.has_filter(&self.id).await {
            return Ok(());
        }

        tracing::debug!(id = %self.id, event = %self.event_name, %address, "registering log filter");
        self.source
            .register_filter(FilterSpec {
                name: self.id.clone(),
                event_sigs: vec![self.sig_hash],
                addresses: vec![address],
            })
            .await
            .map_err(RelayError::Internal)
    }

    async fn unregister_locked(&self) -> Result<(), RelayError> {
        if !self.source.has_filter(&self.id).await {
            return Ok(());
        }

        tracing::debug!(id = %self.id, "unregistering log filter");
        self.source
            .unregister_filter(&self.id)
            .await
            .map_err(RelayError::Internal)
    }

    /// Decodes the newest log matching `params` into `T`.
    ///
    /// With no indexed fields in the schema the source is asked for the
    /// single newest log directly. Otherwise the first indexed field
    /// becomes the source's native topic filter and the rest are matched
    /// client-side, since the source filters on one topic slot only.
    pub async fn get_latest_value<P, T>(&self, params: &P) -> Result<T, RelayError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (address, pending) = {
            let state = self.state.read().unwrap();
            if !state.bound {
                return Err(RelayError::invalid_type("event not bound"));
            }
            (state.address, state.pending)
        };
        let confs = if pending {
            Confirmations::Unconfirmed
        } else {
            Confirmations::Finalized
        };

        let log = if self.codec.entry(&self.params_item)?.args().is_empty() {
            self.source
                .latest_log_by_event_sig_with_confs(self.sig_hash, address, confs)
                .await
                .map_err(classify_source_err)?
        } else {
            self.latest_matching_log(address, confs, params).await?
        };
        self.decode_log(&log)
    }

    async fn latest_matching_log<P: Serialize + ?Sized>(
        &self,
        address: Address,
        confs: Confirmations,
        params: &P,
    ) -> Result<Log, RelayError> {
        let off_chain = self.convert_to_off_chain(params)?;
        let on_chain = self
            .codec
            .transform_for_on_chain(off_chain, &self.params_item)?;
        let topics = self.encode_topic_filters(&on_chain)?;
        let Some((first, remaining)) = topics.split_first() else {
            return Err(RelayError::invalid_type("no indexed fields to filter on"));
        };

        let logs = self
            .source
            .indexed_logs(self.sig_hash, address, 1, vec![*first], confs)
            .await
            .map_err(classify_source_err)?;
        tracing::debug!(
            id = %self.id,
            candidates = logs.len(),
            client_side_filters = remaining.len(),
            "narrowing indexed logs"
        );

        let mut newest: Option<Log> = None;
        for log in logs {
            if !matches_remaining_filters(&log, remaining) {
                continue;
            }
            let replace = match &newest {
                None => true,
                Some(current) => {
                    (log.block_number, log.log_index) > (current.block_number, current.log_index)
                }
            };
            if replace {
                newest = Some(log);
            }
        }

        newest.ok_or_else(|| RelayError::NotFound(anyhow::anyhow!("no events found")))
    }

    // Caller params may be partial; unset filter fields keep their zero
    // value from the item's native shape.
    fn convert_to_off_chain<P: Serialize + ?Sized>(&self, params: &P) -> Result<Value, RelayError> {
        let mut shape = self.codec.create_type(&self.params_item, true)?;
        let given = serde_json::to_value(params).map_err(|e| {
            RelayError::invalid_type(format!("unencodable filter params: {e}"))
        })?;
        match (&mut shape, given) {
            (Value::Object(shape_map), Value::Object(given_map)) => {
                for (name, value) in given_map {
                    shape_map.insert(name, value);
                }
            }
            (_, Value::Null) => {}
            (_, other) => {
                return Err(RelayError::invalid_type(format!(
                    "filter params must be a struct, got {other}"
                )));
            }
        }
        Ok(shape)
    }

    fn encode_topic_filters(&self, on_chain: &Value) -> Result<Vec<B256>, RelayError> {
        let entry = self.codec.entry(&self.params_item)?;
        let obj = on_chain.as_object().ok_or_else(|| {
            RelayError::invalid_type("filter params must be a struct".to_string())
        })?;
        let mut hashes = Vec::with_capacity(entry.args().len());
        for arg in entry.args() {
            let field = obj.get(&arg.name).ok_or_else(|| {
                RelayError::invalid_type(format!("missing filter field {}", arg.name))
            })?;
            let sol_value = value::to_sol_value(&arg.ty, field, &arg.name)?;
            hashes.push(value::topic_hash(&sol_value, &arg.name)?);
        }
        Ok(hashes)
    }

    // Topics and data together form one logical event value: the data
    // payload decodes through the codec, the topic slots parse against
    // the indexed schema, and both merge into the same output.
    fn decode_log<T: DeserializeOwned>(&self, log: &Log) -> Result<T, RelayError> {
        let mut decoded = self.codec.decode_value(&log.data, &self.data_item)?;

        let topic_args = &self.topic_args;
        if log.topics.len() < topic_args.len() + 1 {
            return Err(RelayError::invalid_type("not enough topics to decode"));
        }
        let obj = decoded.as_object_mut().ok_or_else(|| {
            RelayError::internal(anyhow::anyhow!("decoded event data is not a struct"))
        })?;
        for (i, arg) in topic_args.iter().enumerate() {
            obj.insert(
                arg.name.clone(),
                value::parse_topic_value(&arg.ty, log.topics[i + 1])?,
            );
        }

        serde_json::from_value(decoded).map_err(|e| {
            RelayError::invalid_type(format!("decoded event does not fit target: {e}"))
        })
    }
}

/// Topics beyond the natively-filtered slot 1 must equal the remaining
/// computed hashes byte-for-byte, in order.
fn matches_remaining_filters(log: &Log, remaining: &[B256]) -> bool {
    remaining
        .iter()
        .enumerate()
        .all(|(i, hash)| log.topic(i + 2) == Some(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, Bytes};

    fn log_at(block_number: u64, log_index: u64) -> Log {
        Log {
            block_number,
            log_index,
            block_hash: keccak256(b"block"),
            tx_hash: keccak256(b"tx"),
            address: Address::ZERO,
            event_sig: B256::ZERO,
            topics: vec![B256::ZERO, B256::with_last_byte(1), B256::with_last_byte(2)],
            data: Bytes::new(),
            block_timestamp: None,
        }
    }

    #[test]
    fn test_matches_remaining_filters() {
        let log = log_at(1, 0);
        assert!(matches_remaining_filters(&log, &[]));
        assert!(matches_remaining_filters(&log, &[B256::with_last_byte(2)]));
        assert!(!matches_remaining_filters(&log, &[B256::with_last_byte(9)]));
        // log too short for the requested filters
        assert!(!matches_remaining_filters(
            &log,
            &[B256::with_last_byte(2), B256::with_last_byte(3)]
        ));
    }
}
