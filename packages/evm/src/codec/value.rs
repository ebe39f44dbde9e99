use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Address, B256, I256, U256};
use serde_json::{Map, Value};

use crate::codec::entry::TypeDescriptor;
use crate::error::RelayError;

/// Builds the ABI value for one field from its native representation.
///
/// Numbers are accepted as JSON numbers or as decimal/0x strings, so
/// widths beyond 64 bits stay representable.
pub(crate) fn to_sol_value(
    ty: &TypeDescriptor,
    value: &Value,
    field: &str,
) -> Result<DynSolValue, RelayError> {
    match ty {
        TypeDescriptor::Scalar(scalar) => scalar_to_sol_value(scalar, value, field),
        TypeDescriptor::FixedArray(elem, count) => {
            let items = value.as_array().ok_or_else(|| mismatch(field, "array", value))?;
            if items.len() != *count {
                return Err(RelayError::invalid_type(format!(
                    "field {field} expects {count} elements, got {}",
                    items.len()
                )));
            }
            let members = items
                .iter()
                .map(|item| to_sol_value(elem, item, field))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::FixedArray(members))
        }
        TypeDescriptor::Array(elem) => {
            let items = value.as_array().ok_or_else(|| mismatch(field, "array", value))?;
            let members = items
                .iter()
                .map(|item| to_sol_value(elem, item, field))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Array(members))
        }
        TypeDescriptor::Struct(fields) => {
            let obj = value
                .as_object()
                .ok_or_else(|| mismatch(field, "struct", value))?;
            let members = fields
                .iter()
                .map(|(name, ty)| {
                    let nested = obj.get(name).ok_or_else(|| {
                        RelayError::invalid_type(format!("missing field {field}.{name}"))
                    })?;
                    to_sol_value(ty, nested, name)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Tuple(members))
        }
    }
}

fn scalar_to_sol_value(
    ty: &DynSolType,
    value: &Value,
    field: &str,
) -> Result<DynSolValue, RelayError> {
    match ty {
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| mismatch(field, "bool", value)),
        DynSolType::Uint(bits) => {
            let parsed = if let Some(n) = value.as_u64() {
                U256::from(n)
            } else if let Some(s) = value.as_str() {
                s.parse::<U256>()
                    .map_err(|_| mismatch(field, "unsigned integer", value))?
            } else {
                return Err(mismatch(field, "unsigned integer", value));
            };
            if parsed.bit_len() > *bits {
                return Err(RelayError::invalid_type(format!(
                    "field {field} does not fit uint{bits}"
                )));
            }
            Ok(DynSolValue::Uint(parsed, *bits))
        }
        DynSolType::Int(bits) => {
            let parsed = if let Some(n) = value.as_i64() {
                I256::try_from(n).map_err(|_| mismatch(field, "signed integer", value))?
            } else if let Some(s) = value.as_str() {
                s.parse::<I256>()
                    .map_err(|_| mismatch(field, "signed integer", value))?
            } else {
                return Err(mismatch(field, "signed integer", value));
            };
            Ok(DynSolValue::Int(parsed, *bits))
        }
        DynSolType::Address => value
            .as_str()
            .and_then(|s| s.parse::<Address>().ok())
            .map(DynSolValue::Address)
            .ok_or_else(|| mismatch(field, "address", value)),
        DynSolType::FixedBytes(size) => {
            let bytes = hex_bytes(value, field)?;
            if bytes.len() != *size {
                return Err(RelayError::invalid_type(format!(
                    "field {field} expects bytes{size}, got {} bytes",
                    bytes.len()
                )));
            }
            Ok(DynSolValue::FixedBytes(
                B256::right_padding_from(&bytes),
                *size,
            ))
        }
        DynSolType::Bytes => Ok(DynSolValue::Bytes(hex_bytes(value, field)?)),
        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_string()))
            .ok_or_else(|| mismatch(field, "string", value)),
        other => Err(RelayError::invalid_type(format!(
            "field {field} has unsupported scalar type {other:?}"
        ))),
    }
}

/// The native representation of one decoded ABI value.
///
/// Integers that fit 64 bits come back as JSON numbers, wider ones as
/// decimal strings; byte shapes come back 0x-hex encoded.
pub(crate) fn from_sol_value(
    ty: &TypeDescriptor,
    value: &DynSolValue,
) -> Result<Value, RelayError> {
    match (ty, value) {
        (TypeDescriptor::Scalar(_), DynSolValue::Bool(b)) => Ok(Value::from(*b)),
        (TypeDescriptor::Scalar(_), DynSolValue::Uint(n, _)) => Ok(u64::try_from(*n)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(n.to_string()))),
        (TypeDescriptor::Scalar(_), DynSolValue::Int(n, _)) => Ok(i64::try_from(*n)
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(n.to_string()))),
        (TypeDescriptor::Scalar(_), DynSolValue::Address(a)) => {
            Ok(Value::from(a.to_checksum(None)))
        }
        (TypeDescriptor::Scalar(_), DynSolValue::FixedBytes(word, size)) => {
            Ok(Value::from(format!("0x{}", const_hex::encode(&word[..*size]))))
        }
        (TypeDescriptor::Scalar(_), DynSolValue::Bytes(bytes)) => {
            Ok(Value::from(format!("0x{}", const_hex::encode(bytes))))
        }
        (TypeDescriptor::Scalar(_), DynSolValue::String(s)) => Ok(Value::from(s.clone())),
        (
            TypeDescriptor::FixedArray(elem, _) | TypeDescriptor::Array(elem),
            DynSolValue::FixedArray(items) | DynSolValue::Array(items),
        ) => Ok(Value::Array(
            items
                .iter()
                .map(|item| from_sol_value(elem, item))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        (TypeDescriptor::Struct(fields), DynSolValue::Tuple(members))
            if fields.len() == members.len() =>
        {
            let mut map = Map::new();
            for ((name, ty), member) in fields.iter().zip(members) {
                map.insert(name.clone(), from_sol_value(ty, member)?);
            }
            Ok(Value::Object(map))
        }
        _ => Err(RelayError::internal(anyhow::anyhow!(
            "decoded value does not match its schema shape"
        ))),
    }
}

/// Zero-valued native instance of a type.
pub(crate) fn zero_value(ty: &TypeDescriptor) -> Value {
    match ty {
        TypeDescriptor::Scalar(scalar) => match scalar {
            DynSolType::Bool => Value::from(false),
            DynSolType::Uint(_) | DynSolType::Int(_) => Value::from(0u64),
            DynSolType::Address => Value::from(Address::ZERO.to_checksum(None)),
            DynSolType::FixedBytes(size) => {
                Value::from(format!("0x{}", const_hex::encode(vec![0u8; *size])))
            }
            DynSolType::Bytes => Value::from("0x"),
            _ => Value::from(""),
        },
        TypeDescriptor::FixedArray(elem, count) => {
            Value::Array((0..*count).map(|_| zero_value(elem)).collect())
        }
        TypeDescriptor::Array(_) => Value::Array(Vec::new()),
        TypeDescriptor::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), zero_value(ty)))
                .collect(),
        ),
    }
}

/// The 32-byte topic slot content for one indexed value: value types use
/// their ABI word, `string`/`bytes` the keccak hash of the raw payload.
/// Other shapes cannot be filtered on.
pub(crate) fn topic_hash(value: &DynSolValue, field: &str) -> Result<B256, RelayError> {
    match value {
        DynSolValue::String(s) => Ok(keccak256(s.as_bytes())),
        DynSolValue::Bytes(bytes) => Ok(keccak256(bytes)),
        other => other.as_word().ok_or_else(|| {
            RelayError::invalid_type(format!("field {field} has an unsupported indexed type"))
        }),
    }
}

/// Recovers the native value of one indexed field from its topic slot.
///
/// Dynamic and aggregate indexed values are stored on-chain as hashes;
/// their preimage is unrecoverable, so the hash itself is surfaced.
pub(crate) fn parse_topic_value(ty: &TypeDescriptor, word: B256) -> Result<Value, RelayError> {
    match ty {
        TypeDescriptor::Scalar(scalar)
            if !matches!(scalar, DynSolType::Bytes | DynSolType::String) =>
        {
            let decoded = scalar
                .abi_decode(word.as_slice())
                .map_err(|e| RelayError::invalid_type(format!("bad topic value: {e}")))?;
            from_sol_value(ty, &decoded)
        }
        _ => Ok(Value::from(word.to_string())),
    }
}

fn hex_bytes(value: &Value, field: &str) -> Result<Vec<u8>, RelayError> {
    value
        .as_str()
        .and_then(|s| const_hex::decode(s).ok())
        .ok_or_else(|| mismatch(field, "hex bytes", value))
}

fn mismatch(field: &str, expected: &str, value: &Value) -> RelayError {
    RelayError::invalid_type(format!("field {field} expects {expected}, got {value}"))
}
