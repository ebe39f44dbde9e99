use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use relay_evm::{
    wrap_item_type, ArgumentDef, Codec, CodecConfig, EventBinding, EventDef, RelayError,
};
use relay_types::{BoundContract, Confirmations, FilterSpec, Log, LogSource};

#[derive(Default)]
struct MockLogSource {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    filters: HashMap<String, FilterSpec>,
    logs: Vec<Log>,
    fail_register: bool,
    last_confs: Option<Confirmations>,
}

impl MockLogSource {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_log(&self, log: Log) {
        self.state.lock().unwrap().logs.push(log);
    }

    fn fail_next_registers(&self) {
        self.state.lock().unwrap().fail_register = true;
    }

    fn filter_count(&self) -> usize {
        self.state.lock().unwrap().filters.len()
    }

    fn filter_addresses(&self, name: &str) -> Option<Vec<Address>> {
        self.state
            .lock()
            .unwrap()
            .filters
            .get(name)
            .map(|filter| filter.addresses.clone())
    }

    fn last_confs(&self) -> Option<Confirmations> {
        self.state.lock().unwrap().last_confs
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn has_filter(&self, name: &str) -> bool {
        self.state.lock().unwrap().filters.contains_key(name)
    }

    async fn register_filter(&self, filter: FilterSpec) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_register {
            anyhow::bail!("filter store unavailable");
        }
        state.filters.insert(filter.name.clone(), filter);
        Ok(())
    }

    async fn unregister_filter(&self, name: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().filters.remove(name);
        Ok(())
    }

    async fn latest_log_by_event_sig_with_confs(
        &self,
        event_sig: B256,
        address: Address,
        confs: Confirmations,
    ) -> anyhow::Result<Log> {
        let mut state = self.state.lock().unwrap();
        state.last_confs = Some(confs);
        state
            .logs
            .iter()
            .filter(|log| log.event_sig == event_sig && log.address == address)
            .max_by_key(|log| (log.block_number, log.log_index))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("log not found"))
    }

    async fn indexed_logs(
        &self,
        event_sig: B256,
        address: Address,
        topic_index: usize,
        topic_values: Vec<B256>,
        confs: Confirmations,
    ) -> anyhow::Result<Vec<Log>> {
        let mut state = self.state.lock().unwrap();
        state.last_confs = Some(confs);
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.event_sig == event_sig
                    && log.address == address
                    && log
                        .topic(topic_index)
                        .is_some_and(|topic| topic_values.contains(topic))
            })
            .cloned()
            .collect())
    }
}

const CONTRACT: &str = "Token";

fn transfer_event() -> EventDef {
    EventDef::new(
        "Transfer",
        vec![
            ArgumentDef::new("from", "address").indexed(),
            ArgumentDef::new("to", "address").indexed(),
            ArgumentDef::new("value", "uint64"),
        ],
    )
}

fn setup() -> (Arc<MockLogSource>, Arc<Codec>, EventBinding) {
    setup_with(&transfer_event())
}

fn setup_with(event: &EventDef) -> (Arc<MockLogSource>, Arc<Codec>, EventBinding) {
    let source = MockLogSource::new();
    let mut config = CodecConfig::default();
    config.add_event(CONTRACT, event).unwrap();
    let codec = Arc::new(Codec::new(&config).unwrap());
    let binding = EventBinding::new(
        CONTRACT,
        event,
        source.clone(),
        codec.clone(),
    )
    .unwrap();
    (source, codec, binding)
}

fn address_topic(address: Address) -> B256 {
    B256::left_padding_from(address.as_slice())
}

#[allow(clippy::too_many_arguments)]
fn transfer_log(
    codec: &Codec,
    address: Address,
    from: Address,
    to: Address,
    value: u64,
    block_number: u64,
    log_index: u64,
) -> Log {
    let sig = transfer_event().signature_hash();
    let data = codec
        .encode_value(
            json!({ "value": value }),
            &wrap_item_type(CONTRACT, "Transfer", false),
        )
        .unwrap();
    Log {
        block_number,
        log_index,
        block_hash: keccak256(block_number.to_be_bytes()),
        tx_hash: keccak256([block_number as u8, log_index as u8]),
        address,
        event_sig: sig,
        topics: vec![sig, address_topic(from), address_topic(to)],
        data: data.into(),
        block_timestamp: None,
    }
}

#[derive(Debug, Deserialize)]
struct Transfer {
    from: Address,
    to: Address,
    value: u64,
}

fn bound(address: Address) -> BoundContract {
    BoundContract {
        address,
        pending: false,
    }
}

#[tokio::test]
async fn test_get_latest_value_unbound() {
    let (_source, _codec, binding) = setup();
    let err = binding
        .get_latest_value::<_, Transfer>(&json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidType(_)));
}

#[tokio::test]
async fn test_latest_value_without_filters() {
    let event = EventDef::new("Ping", vec![ArgumentDef::new("n", "uint64")]);
    let source = MockLogSource::new();
    let mut config = CodecConfig::default();
    config.add_event(CONTRACT, &event).unwrap();
    let codec = Arc::new(Codec::new(&config).unwrap());
    let binding = EventBinding::new(
        CONTRACT,
        &event,
        source.clone(),
        codec.clone(),
    )
    .unwrap();

    let address = Address::repeat_byte(0x11);
    binding.bind(bound(address)).await.unwrap();

    let sig = event.signature_hash();
    let data_item = wrap_item_type(CONTRACT, "Ping", false);
    for (block_number, n) in [(5u64, 1u64), (7, 2)] {
        source.push_log(Log {
            block_number,
            log_index: 0,
            block_hash: keccak256(block_number.to_be_bytes()),
            tx_hash: keccak256(b"tx"),
            address,
            event_sig: sig,
            topics: vec![sig],
            data: codec
                .encode_value(json!({ "n": n }), &data_item)
                .unwrap()
                .into(),
            block_timestamp: None,
        });
    }

    #[derive(Debug, Deserialize)]
    struct Ping {
        n: u64,
    }
    let got: Ping = binding.get_latest_value(&()).await.unwrap();
    assert_eq!(got.n, 2);
    assert_eq!(source.last_confs(), Some(Confirmations::Finalized));
}

#[tokio::test]
async fn test_absence_is_not_found() {
    let event = EventDef::new("Ping", vec![ArgumentDef::new("n", "uint64")]);
    let (_source, _codec, binding) = setup_with(&event);
    binding.bind(bound(Address::repeat_byte(0x11))).await.unwrap();

    // the source reports absence with a message, the binding maps it
    let err = binding
        .get_latest_value::<_, serde_json::Value>(&())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));
}

#[tokio::test]
async fn test_no_surviving_candidate_is_not_found() {
    let (source, codec, binding) = setup();
    let address = Address::repeat_byte(0x11);
    binding.bind(bound(address)).await.unwrap();

    let from = Address::repeat_byte(0xaa);
    let other = Address::repeat_byte(0xbb);
    source.push_log(transfer_log(&codec, address, other, other, 1, 1, 0));

    let err = binding
        .get_latest_value::<_, Transfer>(&json!({"from": from, "to": other}))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));
}

#[tokio::test]
async fn test_narrowing_keeps_only_fully_matching_log() {
    let (source, codec, binding) = setup();
    let address = Address::repeat_byte(0x11);
    binding.bind(bound(address)).await.unwrap();

    let from = Address::repeat_byte(0xaa);
    let wanted_to = Address::repeat_byte(0xbb);
    let other_to = Address::repeat_byte(0xcc);

    // all three share the natively-filtered first topic; only one also
    // matches the client-side filter on the second
    source.push_log(transfer_log(&codec, address, from, other_to, 1, 10, 0));
    source.push_log(transfer_log(&codec, address, from, wanted_to, 2, 11, 0));
    source.push_log(transfer_log(&codec, address, from, other_to, 3, 12, 0));

    let got: Transfer = binding
        .get_latest_value(&json!({"from": from, "to": wanted_to}))
        .await
        .unwrap();
    assert_eq!(got.from, from);
    assert_eq!(got.to, wanted_to);
    assert_eq!(got.value, 2);
}

#[tokio::test]
async fn test_newest_selection_by_log_index_then_block() {
    let (source, codec, binding) = setup();
    let address = Address::repeat_byte(0x11);
    binding.bind(bound(address)).await.unwrap();

    let from = Address::repeat_byte(0xaa);
    let to = Address::repeat_byte(0xbb);
    let params = json!({"from": from, "to": to});

    // same block, higher log index wins
    source.push_log(transfer_log(&codec, address, from, to, 1, 10, 2));
    source.push_log(transfer_log(&codec, address, from, to, 2, 10, 5));
    let got: Transfer = binding.get_latest_value(&params).await.unwrap();
    assert_eq!(got.value, 2);

    // higher block wins regardless of log index
    source.push_log(transfer_log(&codec, address, from, to, 3, 11, 0));
    source.push_log(transfer_log(&codec, address, from, to, 4, 12, 0));
    let got: Transfer = binding.get_latest_value(&params).await.unwrap();
    assert_eq!(got.value, 4);
}

#[tokio::test]
async fn test_pending_contract_reads_unconfirmed() {
    let (source, codec, binding) = setup();
    let address = Address::repeat_byte(0x11);
    binding
        .bind(BoundContract {
            address,
            pending: true,
        })
        .await
        .unwrap();

    let from = Address::repeat_byte(0xaa);
    let to = Address::repeat_byte(0xbb);
    source.push_log(transfer_log(&codec, address, from, to, 1, 1, 0));

    let _: Transfer = binding
        .get_latest_value(&json!({"from": from, "to": to}))
        .await
        .unwrap();
    assert_eq!(source.last_confs(), Some(Confirmations::Unconfirmed));
}

#[tokio::test]
async fn test_insufficient_topics_is_invalid_type() {
    // two indexed fields but no filter inputs: reads go through the
    // newest-log path and every topic slot is still parsed on decode
    let event = transfer_event().with_filter_inputs(vec![]);
    let (source, codec, binding) = setup_with(&event);
    let address = Address::repeat_byte(0x11);
    binding.bind(bound(address)).await.unwrap();

    let sig = event.signature_hash();
    source.push_log(Log {
        block_number: 1,
        log_index: 0,
        block_hash: keccak256(b"block"),
        tx_hash: keccak256(b"tx"),
        address,
        event_sig: sig,
        // missing both indexed topic slots
        topics: vec![sig],
        data: codec
            .encode_value(
                json!({ "value": 0 }),
                &wrap_item_type(CONTRACT, "Transfer", false),
            )
            .unwrap()
            .into(),
        block_timestamp: None,
    });

    let err = binding
        .get_latest_value::<_, Transfer>(&())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::InvalidType(_)));
}

#[tokio::test]
async fn test_bind_without_register_request_never_creates_filter() {
    let (source, _codec, binding) = setup();
    binding.bind(bound(Address::repeat_byte(0x11))).await.unwrap();
    binding.unregister().await.unwrap();
    binding.bind(bound(Address::repeat_byte(0x22))).await.unwrap();
    assert_eq!(source.filter_count(), 0);
}

#[tokio::test]
async fn test_rebind_moves_the_filter() {
    let (source, _codec, binding) = setup();
    let old = Address::repeat_byte(0x11);
    let new = Address::repeat_byte(0x22);

    binding.bind(bound(old)).await.unwrap();
    binding.register().await.unwrap();
    assert_eq!(source.filter_addresses(binding.id()), Some(vec![old]));

    binding.bind(bound(new)).await.unwrap();
    assert_eq!(source.filter_count(), 1);
    assert_eq!(source.filter_addresses(binding.id()), Some(vec![new]));
}

#[tokio::test]
async fn test_register_before_bind_is_deferred() {
    let (source, _codec, binding) = setup();

    // not bound yet: nothing to register, but the request is latched
    binding.register().await.unwrap();
    assert_eq!(source.filter_count(), 0);

    binding.bind(bound(Address::repeat_byte(0x11))).await.unwrap();
    assert_eq!(source.filter_count(), 1);
}

#[tokio::test]
async fn test_register_is_idempotent() {
    let (source, _codec, binding) = setup();
    binding.bind(bound(Address::repeat_byte(0x11))).await.unwrap();
    binding.register().await.unwrap();
    binding.register().await.unwrap();
    assert_eq!(source.filter_count(), 1);

    binding.unregister().await.unwrap();
    binding.unregister().await.unwrap();
    assert_eq!(source.filter_count(), 0);
}

#[tokio::test]
async fn test_bindings_with_distinct_ids_do_not_interfere() {
    let source = MockLogSource::new();
    let mut config = CodecConfig::default();
    config.add_event(CONTRACT, &transfer_event()).unwrap();
    let codec = Arc::new(Codec::new(&config).unwrap());

    let binding_a = EventBinding::new(
        CONTRACT,
        &transfer_event(),
        source.clone(),
        codec.clone(),
    )
    .unwrap();
    let binding_b = EventBinding::new(
        CONTRACT,
        &transfer_event(),
        source.clone(),
        codec.clone(),
    )
    .unwrap();
    assert_ne!(binding_a.id(), binding_b.id());

    let address = Address::repeat_byte(0x11);
    binding_a.bind(bound(address)).await.unwrap();
    binding_b.bind(bound(address)).await.unwrap();
    binding_a.register().await.unwrap();
    binding_b.register().await.unwrap();
    assert_eq!(source.filter_count(), 2);

    binding_a.unregister().await.unwrap();
    assert_eq!(source.filter_count(), 1);
    assert!(source.filter_addresses(binding_b.id()).is_some());
}

#[tokio::test]
async fn test_failed_register_inside_bind_surfaces_internal() {
    let (source, _codec, binding) = setup();
    binding.bind(bound(Address::repeat_byte(0x11))).await.unwrap();
    binding.register().await.unwrap();

    source.fail_next_registers();
    let err = binding
        .bind(bound(Address::repeat_byte(0x22)))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Internal(_)));

    // the old filter was removed and no new one appeared; the binding
    // itself is still bound and readable
    assert_eq!(source.filter_count(), 0);
    let read = binding
        .get_latest_value::<_, Transfer>(&json!({
            "from": Address::repeat_byte(0xaa),
            "to": Address::repeat_byte(0xbb),
        }))
        .await;
    assert!(matches!(read, Err(RelayError::NotFound(_))));
}

#[tokio::test]
async fn test_binding_requires_registered_codec_items() {
    let source = MockLogSource::new();
    let codec = Arc::new(Codec::new(&CodecConfig::default()).unwrap());
    let err = EventBinding::new(
        CONTRACT,
        &transfer_event(),
        source,
        codec,
    )
    .unwrap_err();
    assert!(matches!(err, RelayError::InvalidConfig(_)));
}
