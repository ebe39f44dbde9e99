use alloy_dyn_abi::{DynSolType, DynSolValue};
use serde_json::{Map, Value};

use crate::codec::config::{ArgumentDef, EntryConfig};
use crate::codec::modifier::ModifierChain;
use crate::codec::{size, value};
use crate::error::RelayError;

/// Structural descriptor for one schema type.
///
/// Encode, decode, size-bound and topic-hash all walk this one shape;
/// nested struct fields keep their names here (the underlying ABI tuple
/// type erases them).
#[derive(Debug, Clone)]
pub(crate) enum TypeDescriptor {
    Scalar(DynSolType),
    FixedArray(Box<TypeDescriptor>, usize),
    Array(Box<TypeDescriptor>),
    Struct(Vec<(String, TypeDescriptor)>),
}

impl TypeDescriptor {
    pub fn from_def(def: &ArgumentDef) -> Result<Self, RelayError> {
        Self::parse(&def.ty, &def.components)
    }

    // Array suffixes resolve outside-in: `uint8[2][]` is a dynamic array
    // of `uint8[2]`.
    fn parse(ty: &str, components: &[ArgumentDef]) -> Result<Self, RelayError> {
        if let Some(base) = ty.strip_suffix("[]") {
            return Ok(Self::Array(Box::new(Self::parse(base, components)?)));
        }
        if let Some(rest) = ty.strip_suffix(']') {
            let open = rest.rfind('[').ok_or_else(|| {
                RelayError::invalid_config(format!("malformed array type {ty}"))
            })?;
            let count: usize = rest[open + 1..]
                .parse()
                .map_err(|_| RelayError::invalid_config(format!("malformed array type {ty}")))?;
            return Ok(Self::FixedArray(
                Box::new(Self::parse(&rest[..open], components)?),
                count,
            ));
        }
        if ty == "tuple" {
            if components.is_empty() {
                return Err(RelayError::invalid_config(
                    "tuple type without components".to_string(),
                ));
            }
            let fields = components
                .iter()
                .map(|c| Ok((c.name.clone(), Self::from_def(c)?)))
                .collect::<Result<Vec<_>, RelayError>>()?;
            return Ok(Self::Struct(fields));
        }
        match DynSolType::parse(ty) {
            Ok(
                DynSolType::Tuple(_) | DynSolType::Array(_) | DynSolType::FixedArray(_, _),
            ) => Err(RelayError::invalid_config(format!(
                "aggregate type {ty} must be declared via components"
            ))),
            Ok(scalar) => Ok(Self::Scalar(scalar)),
            Err(e) => Err(RelayError::invalid_config(format!(
                "unsupported type {ty}: {e}"
            ))),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Scalar(DynSolType::Bytes | DynSolType::String) => true,
            Self::Scalar(_) => false,
            Self::FixedArray(elem, _) => elem.is_dynamic(),
            Self::Array(_) => true,
            Self::Struct(fields) => fields.iter().any(|(_, ty)| ty.is_dynamic()),
        }
    }

    /// The equivalent alloy type, field names erased.
    pub fn dyn_type(&self) -> DynSolType {
        match self {
            Self::Scalar(ty) => ty.clone(),
            Self::FixedArray(elem, count) => {
                DynSolType::FixedArray(Box::new(elem.dyn_type()), *count)
            }
            Self::Array(elem) => DynSolType::Array(Box::new(elem.dyn_type())),
            Self::Struct(fields) => {
                DynSolType::Tuple(fields.iter().map(|(_, ty)| ty.dyn_type()).collect())
            }
        }
    }
}

/// One named argument of a codec entry.
#[derive(Debug, Clone)]
pub(crate) struct NamedArg {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// The immutable descriptor for one named item: ordered argument layout
/// plus the item's modifier chain. The synthesized native shape follows
/// the argument order exactly.
#[derive(Debug, Clone)]
pub(crate) struct CodecEntry {
    args: Vec<NamedArg>,
    modifiers: ModifierChain,
}

impl CodecEntry {
    pub fn from_config(config: &EntryConfig) -> Result<Self, RelayError> {
        let args = config
            .arguments()?
            .iter()
            .map(|def| {
                Ok(NamedArg {
                    name: def.name.clone(),
                    ty: TypeDescriptor::from_def(def)?,
                })
            })
            .collect::<Result<Vec<_>, RelayError>>()?;
        Ok(Self {
            args,
            modifiers: ModifierChain::new(config.modifiers.clone()),
        })
    }

    pub fn args(&self) -> &[NamedArg] {
        &self.args
    }

    pub fn modifiers(&self) -> &ModifierChain {
        &self.modifiers
    }

    /// Zero-valued on-chain shape, field order matching the schema.
    pub fn zero_value(&self) -> Value {
        let mut map = Map::new();
        for arg in &self.args {
            map.insert(arg.name.clone(), value::zero_value(&arg.ty));
        }
        Value::Object(map)
    }

    /// Primitive ABI params-encoding of an on-chain-shaped value.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, RelayError> {
        let obj = value.as_object().ok_or_else(|| {
            RelayError::invalid_type(format!("expected a struct value, got {value}"))
        })?;
        let mut members = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let field = obj.get(&arg.name).ok_or_else(|| {
                RelayError::invalid_type(format!("missing field {}", arg.name))
            })?;
            members.push(value::to_sol_value(&arg.ty, field, &arg.name)?);
        }
        Ok(DynSolValue::Tuple(members).abi_encode_params())
    }

    /// Primitive ABI params-decoding back to the on-chain shape.
    pub fn decode(&self, data: &[u8]) -> Result<Value, RelayError> {
        if self.args.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let tuple = DynSolType::Tuple(self.args.iter().map(|arg| arg.ty.dyn_type()).collect());
        let decoded = tuple
            .abi_decode_params(data)
            .map_err(|e| RelayError::internal(anyhow::anyhow!("abi decode failed: {e}")))?;
        let DynSolValue::Tuple(members) = decoded else {
            return Err(RelayError::internal(anyhow::anyhow!(
                "abi decoder returned a non-tuple for a params schema"
            )));
        };
        if members.len() != self.args.len() {
            return Err(RelayError::internal(anyhow::anyhow!(
                "abi decoder returned {} members for {} arguments",
                members.len(),
                self.args.len()
            )));
        }
        let mut map = Map::new();
        for (arg, member) in self.args.iter().zip(&members) {
            map.insert(arg.name.clone(), value::from_sol_value(&arg.ty, member)?);
        }
        Ok(Value::Object(map))
    }

    /// Worst-case encoded/decoded byte size given `n` as the element bound
    /// for every dynamic-length member. One walk serves both directions
    /// since the wire format is symmetric.
    pub fn max_size(&self, n: usize) -> usize {
        size::max_size_of_args(&self.args, n)
    }
}
