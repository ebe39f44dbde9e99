mod config;
pub(crate) mod entry;
mod modifier;
mod size;
pub(crate) mod value;

pub use config::{ArgumentDef, CodecConfig, EntryConfig, EventDef};
pub use modifier::ModifierConfig;

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::RelayError;
use entry::CodecEntry;

/// Max four topics on EVM; the first is always the event signature, so
/// three are left for indexed fields.
pub const MAX_TOPIC_FIELDS: usize = 3;

/// Derives the item name for one side of an event: `params.` names the
/// indexed/topic shape, `return.` the data shape. Bindings derive the
/// same names independently, so codec and binding stay in sync without a
/// shared registry.
pub fn wrap_item_type(contract_name: &str, item_name: &str, for_params: bool) -> String {
    if for_params {
        format!("params.{contract_name}.{item_name}")
    } else {
        format!("return.{contract_name}.{item_name}")
    }
}

/// Converts between the off-chain value representation and the on-chain
/// ABI encoding, per named item. Entries are parsed once at construction
/// and immutable afterwards.
#[derive(Debug)]
pub struct Codec {
    entries: BTreeMap<String, CodecEntry>,
}

impl Codec {
    pub fn new(config: &CodecConfig) -> Result<Self, RelayError> {
        let mut entries = BTreeMap::new();
        for (name, entry_config) in &config.entries {
            let entry = CodecEntry::from_config(entry_config).map_err(|e| {
                RelayError::invalid_config(format!("item {name}: {e}"))
            })?;
            entries.insert(name.clone(), entry);
        }
        Ok(Self { entries })
    }

    pub(crate) fn entry(&self, item_type: &str) -> Result<&CodecEntry, RelayError> {
        self.entries
            .get(item_type)
            .ok_or_else(|| RelayError::invalid_type(format!("unknown item type {item_type}")))
    }

    /// A zero-valued instance of the item's native (off-chain) shape, for
    /// callers to populate before encoding. The flag is accepted for both
    /// directions; the shape is the same since the wire format is
    /// symmetric.
    pub fn create_type(&self, item_type: &str, _for_encoding: bool) -> Result<Value, RelayError> {
        let entry = self.entry(item_type)?;
        entry.modifiers().to_off_chain(entry.zero_value())
    }

    /// Forward modifier transforms, then primitive ABI encoding.
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
        item_type: &str,
    ) -> Result<Vec<u8>, RelayError> {
        let value = serde_json::to_value(value).map_err(|e| {
            RelayError::invalid_type(format!("unencodable value for {item_type}: {e}"))
        })?;
        self.encode_value(value, item_type)
    }

    pub fn encode_value(&self, value: Value, item_type: &str) -> Result<Vec<u8>, RelayError> {
        let entry = self.entry(item_type)?;
        let on_chain = entry.modifiers().to_on_chain(value)?;
        entry.encode(&on_chain)
    }

    /// Primitive ABI decoding, then inverse modifier transforms in
    /// reverse configured order.
    pub fn decode<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        item_type: &str,
    ) -> Result<T, RelayError> {
        let value = self.decode_value(bytes, item_type)?;
        serde_json::from_value(value).map_err(|e| {
            RelayError::invalid_type(format!("decoded {item_type} does not fit target: {e}"))
        })
    }

    pub fn decode_value(&self, bytes: &[u8], item_type: &str) -> Result<Value, RelayError> {
        let entry = self.entry(item_type)?;
        let on_chain = entry.decode(bytes)?;
        entry.modifiers().to_off_chain(on_chain)
    }

    /// Worst-case encoded size with `n` bounding every dynamic-length
    /// member's element count.
    pub fn max_encoding_size(&self, n: usize, item_type: &str) -> Result<usize, RelayError> {
        Ok(self.entry(item_type)?.max_size(n))
    }

    /// Same bound as [`Self::max_encoding_size`]; the wire format is
    /// symmetric so one structural walk serves both directions.
    pub fn max_decoding_size(&self, n: usize, item_type: &str) -> Result<usize, RelayError> {
        self.max_encoding_size(n, item_type)
    }

    /// Applies only the item's forward modifier chain, leaving the value
    /// in its on-chain shape. Used for building topic filters out of
    /// caller params without encoding them.
    pub(crate) fn transform_for_on_chain(
        &self,
        value: Value,
        item_type: &str,
    ) -> Result<Value, RelayError> {
        self.entry(item_type)?.modifiers().to_on_chain(value)
    }
}
