use std::collections::BTreeMap;

use alloy_json_abi::{Event, EventParam, Param};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::codec::{wrap_item_type, ModifierConfig, MAX_TOPIC_FIELDS};
use crate::error::RelayError;

/// One argument in a declarative type schema, mirroring JSON-ABI argument
/// marshalling (`name` / `type` / `indexed` / `components`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ArgumentDef>,
}

impl ArgumentDef {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
            indexed: false,
            components: Vec::new(),
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn with_components(mut self, components: Vec<ArgumentDef>) -> Self {
        self.components = components;
        self
    }
}

/// A logical event: its name plus the full ordered argument list, indexed
/// and non-indexed fields interleaved as declared on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    pub inputs: Vec<ArgumentDef>,
    /// Indexed inputs offered as filter params. `None` means all of them.
    /// Must be a prefix of the indexed inputs in declaration order, since
    /// filtering matches topic slots positionally; an empty list disables
    /// filtered reads for this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_inputs: Option<Vec<String>>,
}

impl EventDef {
    pub fn new(name: &str, inputs: Vec<ArgumentDef>) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            filter_inputs: None,
        }
    }

    pub fn with_filter_inputs(mut self, filter_inputs: Vec<String>) -> Self {
        self.filter_inputs = Some(filter_inputs);
        self
    }

    pub(crate) fn indexed_inputs(&self) -> Vec<ArgumentDef> {
        self.inputs.iter().filter(|arg| arg.indexed).cloned().collect()
    }

    /// The event signature hash (topic 0).
    pub fn signature_hash(&self) -> B256 {
        self.abi_event().selector()
    }

    fn abi_event(&self) -> Event {
        Event {
            name: self.name.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|arg| EventParam {
                    ty: arg.ty.clone(),
                    name: arg.name.clone(),
                    indexed: arg.indexed,
                    components: arg.components.iter().map(to_param).collect(),
                    internal_type: None,
                })
                .collect(),
            anonymous: false,
        }
    }
}

fn to_param(arg: &ArgumentDef) -> Param {
    Param {
        ty: arg.ty.clone(),
        name: arg.name.clone(),
        components: arg.components.iter().map(to_param).collect(),
        internal_type: None,
    }
}

/// Declarative codec configuration: one entry per named item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub entries: BTreeMap<String, EntryConfig>,
}

/// Schema and modifier chain for one named item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// JSON-ABI argument array, kept as text so the schema can ride
    /// verbatim inside any outer configuration format.
    pub type_abi: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierConfig>,
}

impl EntryConfig {
    pub fn new(args: &[ArgumentDef]) -> Result<Self, RelayError> {
        let type_abi = serde_json::to_string(args)
            .map_err(|e| RelayError::invalid_config(format!("unserializable schema: {e}")))?;
        Ok(Self {
            type_abi,
            modifiers: Vec::new(),
        })
    }

    pub fn with_modifiers(mut self, modifiers: Vec<ModifierConfig>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub(crate) fn arguments(&self) -> Result<Vec<ArgumentDef>, RelayError> {
        serde_json::from_str(&self.type_abi)
            .map_err(|e| RelayError::invalid_config(format!("bad type schema: {e}")))
    }
}

impl CodecConfig {
    /// Registers the two item shapes for one event under their derived
    /// names: `params.<contract>.<event>` carries the indexed arguments
    /// (the topic/filter shape), `return.<contract>.<event>` the
    /// non-indexed ones (the data shape). A binding constructed for the
    /// same (contract, event) derives the same names independently.
    pub fn add_event(
        &mut self,
        contract_name: &str,
        event: &EventDef,
    ) -> Result<(), RelayError> {
        let indexed = event.indexed_inputs();
        if indexed.len() > MAX_TOPIC_FIELDS {
            return Err(RelayError::invalid_config(format!(
                "event {} has {} indexed fields, at most {MAX_TOPIC_FIELDS} fit in topics",
                event.name,
                indexed.len()
            )));
        }
        let params = match &event.filter_inputs {
            None => indexed,
            Some(names) => {
                // positional topic matching requires a prefix
                let prefix = indexed.iter().take(names.len()).map(|arg| &arg.name);
                if !names.iter().eq(prefix) {
                    return Err(RelayError::invalid_config(format!(
                        "filter inputs of event {} must be a prefix of its indexed inputs",
                        event.name
                    )));
                }
                indexed.into_iter().take(names.len()).collect()
            }
        };
        let data: Vec<ArgumentDef> = event
            .inputs
            .iter()
            .filter(|arg| !arg.indexed)
            .cloned()
            .collect();

        let params_item = wrap_item_type(contract_name, &event.name, true);
        let data_item = wrap_item_type(contract_name, &event.name, false);
        if self.entries.contains_key(&params_item) || self.entries.contains_key(&data_item) {
            return Err(RelayError::invalid_config(format!(
                "duplicate event {}.{}",
                contract_name, event.name
            )));
        }

        self.entries.insert(params_item, EntryConfig::new(&params)?);
        self.entries.insert(data_item, EntryConfig::new(&data)?);
        Ok(())
    }
}
