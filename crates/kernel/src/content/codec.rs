//! Wire codec for documents.
//!
//! A document is a JSON array of block envelopes:
//!
//! ```json
//! [{"kind": "hero", "value": {"heading": "Hi", "style": "centered"}}]
//! ```
//!
//! Only top-level blocks carry an envelope. Values nested inside structs and
//! lists are written bare, and their kinds are recovered from the schema on
//! the way back in. Unknown kinds and undeclared struct fields are kept as
//! raw JSON so that encoding a decoded document gives back the same payload.

use std::collections::BTreeMap;

use ramo_sdk::schema::{KindDescriptor, KindRef, Shape};
use ramo_sdk::types::{BlockInstance, BlockPath, BlockValue, Document, Primitive};
use serde_json::{Map, Value};

use super::{BlockRegistry, ValidationMode};
use crate::error::{CoreError, CoreResult};

const KIND_KEY: &str = "kind";
const VALUE_KEY: &str = "value";

/// Encode a document to its wire form.
pub fn encode(document: &Document) -> Value {
    Value::Array(document.iter().map(encode_block).collect())
}

/// Encode one top-level block as a `{"kind", "value"}` envelope.
pub fn encode_block(block: &BlockInstance) -> Value {
    let mut envelope = Map::new();
    envelope.insert(KIND_KEY.to_string(), Value::String(block.kind.clone()));
    envelope.insert(VALUE_KEY.to_string(), encode_value(&block.value));
    Value::Object(envelope)
}

/// Encode a value without an envelope.
pub fn encode_value(value: &BlockValue) -> Value {
    match value {
        BlockValue::Primitive(p) => p.to_json(),
        BlockValue::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, child)| (name.clone(), encode_value(&child.value)))
                .collect(),
        ),
        BlockValue::List(items) => {
            Value::Array(items.iter().map(|item| encode_value(&item.value)).collect())
        }
        BlockValue::Opaque(raw) => raw.clone(),
    }
}

/// Decode a wire document, preserving unknown kinds as opaque blocks.
pub fn decode(json: &Value, registry: &BlockRegistry) -> CoreResult<Document> {
    decode_with_mode(json, registry, ValidationMode::Lenient)
}

/// Decode a wire document, failing with `UnknownKind` on the first kind the
/// registry does not know.
pub fn decode_strict(json: &Value, registry: &BlockRegistry) -> CoreResult<Document> {
    decode_with_mode(json, registry, ValidationMode::Strict)
}

/// Parse and decode a wire document from text.
pub fn decode_str(
    text: &str,
    registry: &BlockRegistry,
    mode: ValidationMode,
) -> CoreResult<Document> {
    let json: Value = serde_json::from_str(text)
        .map_err(|e| CoreError::malformed(&BlockPath::root(), format!("invalid JSON: {e}")))?;
    decode_with_mode(&json, registry, mode)
}

pub fn decode_with_mode(
    json: &Value,
    registry: &BlockRegistry,
    mode: ValidationMode,
) -> CoreResult<Document> {
    let root = BlockPath::root();
    let Value::Array(envelopes) = json else {
        return Err(CoreError::malformed(
            &root,
            format!("expected an array of blocks, found {}", json_type(json)),
        ));
    };

    envelopes
        .iter()
        .enumerate()
        .map(|(i, envelope)| decode_envelope(envelope, registry, mode, &root.index(i)))
        .collect()
}

fn decode_envelope(
    envelope: &Value,
    registry: &BlockRegistry,
    mode: ValidationMode,
    path: &BlockPath,
) -> CoreResult<BlockInstance> {
    let Value::Object(map) = envelope else {
        return Err(CoreError::malformed(
            path,
            format!("expected a block object, found {}", json_type(envelope)),
        ));
    };
    if let Some(extra) = map.keys().find(|k| *k != KIND_KEY && *k != VALUE_KEY) {
        return Err(CoreError::malformed(
            path,
            format!("unexpected key '{extra}' in block"),
        ));
    }
    let kind = match map.get(KIND_KEY) {
        Some(Value::String(kind)) if !kind.is_empty() => kind,
        Some(_) => return Err(CoreError::malformed(path, "'kind' must be a non-empty string")),
        None => return Err(CoreError::malformed(path, "block has no 'kind'")),
    };
    let value = map
        .get(VALUE_KEY)
        .ok_or_else(|| CoreError::malformed(path, "block has no 'value'"))?;

    match registry.get(kind) {
        Some(descriptor) => {
            let value = decode_value(value, &descriptor, registry, mode, path)?;
            Ok(BlockInstance::new(kind, value))
        }
        None if mode == ValidationMode::Strict => Err(CoreError::unknown_kind(kind)),
        None => Ok(BlockInstance::opaque(kind, value.clone())),
    }
}

/// Decode a bare value whose kind is known from the schema.
pub(crate) fn decode_value(
    json: &Value,
    descriptor: &KindDescriptor,
    registry: &BlockRegistry,
    mode: ValidationMode,
    path: &BlockPath,
) -> CoreResult<BlockValue> {
    match &descriptor.shape {
        Shape::Scalar { .. } | Shape::Choice { .. } => Primitive::from_json(json)
            .map(BlockValue::Primitive)
            .ok_or_else(|| {
                CoreError::malformed(
                    path,
                    format!(
                        "'{}' expects a primitive value, found {}",
                        descriptor.kind,
                        json_type(json)
                    ),
                )
            }),
        Shape::Struct { .. } => {
            let Value::Object(map) = json else {
                return Err(CoreError::malformed(
                    path,
                    format!(
                        "'{}' expects an object, found {}",
                        descriptor.kind,
                        json_type(json)
                    ),
                ));
            };
            let mut fields = BTreeMap::new();
            for (name, raw) in map {
                let instance = match descriptor.fields().iter().find(|f| &f.name == name) {
                    Some(field) => {
                        decode_nested(raw, &field.kind, registry, mode, &path.field(name))?
                    }
                    None => BlockInstance::undeclared(raw.clone()),
                };
                fields.insert(name.clone(), instance);
            }
            Ok(BlockValue::Struct(fields))
        }
        Shape::List { child, .. } => {
            let Value::Array(raw_items) = json else {
                return Err(CoreError::malformed(
                    path,
                    format!(
                        "'{}' expects an array, found {}",
                        descriptor.kind,
                        json_type(json)
                    ),
                ));
            };
            let items = raw_items
                .iter()
                .enumerate()
                .map(|(i, raw)| decode_nested(raw, child, registry, mode, &path.index(i)))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(BlockValue::List(items))
        }
    }
}

fn decode_nested(
    json: &Value,
    kind_ref: &KindRef,
    registry: &BlockRegistry,
    mode: ValidationMode,
    path: &BlockPath,
) -> CoreResult<BlockInstance> {
    match registry.resolve(kind_ref) {
        Some(descriptor) => {
            let value = decode_value(json, &descriptor, registry, mode, path)?;
            Ok(BlockInstance::new(&descriptor.kind, value))
        }
        None if mode == ValidationMode::Strict => Err(CoreError::unknown_kind(kind_ref.tag())),
        None => Ok(BlockInstance::opaque(kind_ref.tag(), json.clone())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
