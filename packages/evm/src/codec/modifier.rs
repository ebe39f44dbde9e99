use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RelayError;

/// One reversible value-substitution rule applied around encode/decode.
///
/// The forward transform produces the on-chain shape before primitive
/// encoding; the inverse restores the off-chain shape after decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Fixes on-chain fields to constants on encode and strips them again
    /// on decode, re-injecting the off-chain-only fields the chain does
    /// not carry but the protocol still expects to exist.
    HardCode {
        #[serde(default)]
        on_chain: BTreeMap<String, Value>,
        #[serde(default)]
        off_chain: BTreeMap<String, Value>,
    },
    /// Substitutes off-chain field names with their on-chain counterparts.
    /// Fields absent from the value are left untouched.
    Rename { fields: BTreeMap<String, String> },
}

impl ModifierConfig {
    fn to_on_chain(&self, value: Value) -> Result<Value, RelayError> {
        let mut map = into_object(value)?;
        match self {
            Self::HardCode {
                on_chain,
                off_chain,
            } => {
                for field in off_chain.keys() {
                    map.remove(field);
                }
                for (field, constant) in on_chain {
                    map.insert(field.clone(), constant.clone());
                }
            }
            Self::Rename { fields } => {
                for (off_chain_name, on_chain_name) in fields {
                    if let Some(value) = map.remove(off_chain_name) {
                        map.insert(on_chain_name.clone(), value);
                    }
                }
            }
        }
        Ok(Value::Object(map))
    }

    fn to_off_chain(&self, value: Value) -> Result<Value, RelayError> {
        let mut map = into_object(value)?;
        match self {
            Self::HardCode {
                on_chain,
                off_chain,
            } => {
                for field in on_chain.keys() {
                    map.remove(field);
                }
                for (field, constant) in off_chain {
                    map.insert(field.clone(), constant.clone());
                }
            }
            Self::Rename { fields } => {
                for (off_chain_name, on_chain_name) in fields {
                    if let Some(value) = map.remove(on_chain_name) {
                        map.insert(off_chain_name.clone(), value);
                    }
                }
            }
        }
        Ok(Value::Object(map))
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, RelayError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RelayError::invalid_type(format!(
            "modifiers apply to struct values, got {other}"
        ))),
    }
}

/// An ordered chain of modifiers.
///
/// Forward transforms run in configured order, inverse transforms in
/// reverse order, so the last modifier applied on encode is the first
/// one undone on decode.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModifierChain {
    modifiers: Vec<ModifierConfig>,
}

impl ModifierChain {
    pub fn new(modifiers: Vec<ModifierConfig>) -> Self {
        Self { modifiers }
    }

    pub fn to_on_chain(&self, mut value: Value) -> Result<Value, RelayError> {
        for modifier in &self.modifiers {
            value = modifier.to_on_chain(value)?;
        }
        Ok(value)
    }

    pub fn to_off_chain(&self, mut value: Value) -> Result<Value, RelayError> {
        for modifier in self.modifiers.iter().rev() {
            value = modifier.to_off_chain(value)?;
        }
        Ok(value)
    }
}
