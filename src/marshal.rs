//! Marshaller contract and the default JSON implementation.
//!
//! The binding engine never touches encoded bytes directly; every value that
//! crosses the wire goes through a [`Marshaller`], checked against its
//! [`Shape`].

use crate::descriptor::Shape;
use crate::error::MarshalError;
use crate::types::Value;

/// Encodes and decodes structured values for the wire
pub trait Marshaller: Send + Sync {
    /// Content type announced on encoded bodies
    fn content_type(&self) -> &'static str;

    /// Encode `value`, which must conform to `shape`
    fn encode(&self, value: &Value, shape: &Shape) -> Result<Vec<u8>, MarshalError>;

    /// Decode `bytes` into a value conforming to `shape`
    fn decode(&self, bytes: &[u8], shape: &Shape) -> Result<Value, MarshalError>;
}

/// `serde_json` backed marshaller with recursive shape checks
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl JsonMarshaller {
    pub fn new() -> Self {
        Self
    }
}

impl Marshaller for JsonMarshaller {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, value: &Value, shape: &Shape) -> Result<Vec<u8>, MarshalError> {
        conform(value, shape, "")?;
        serde_json::to_vec(value).map_err(|e| MarshalError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], shape: &Shape) -> Result<Value, MarshalError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| MarshalError::Syntax(e.to_string()))?;
        conform(&value, shape, "")?;
        Ok(value)
    }
}

/// Check that `value` conforms to `shape`; `path` locates nested mismatches
pub fn conform(value: &Value, shape: &Shape, path: &str) -> Result<(), MarshalError> {
    let ok = match (shape, value) {
        (Shape::Any, _) => true,
        (Shape::Void, Value::Null) => true,
        (Shape::Bool, Value::Bool(_)) => true,
        (Shape::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (Shape::Number, Value::Number(_)) => true,
        (Shape::String, Value::String(_)) => true,
        (Shape::Optional(_), Value::Null) => true,
        (Shape::Optional(inner), _) => return conform(value, inner, path),
        (Shape::List(inner), Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                conform(item, inner, &format!("{}/{}", path, index))?;
            }
            true
        }
        (Shape::Object { fields, .. }, Value::Object(map)) => {
            for field in fields {
                let field_path = format!("{}/{}", path, field.name);
                match map.get(&field.name) {
                    Some(field_value) => conform(field_value, &field.shape, &field_path)?,
                    None if field.shape.is_optional() => {}
                    None => {
                        return Err(MarshalError::ShapeMismatch {
                            path: field_path,
                            expected: field.shape.to_string(),
                            found: "nothing".to_string(),
                        });
                    }
                }
            }
            true
        }
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(MarshalError::ShapeMismatch {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            expected: shape.to_string(),
            found: kind_of(value).to_string(),
        })
    }
}

/// Encode a value for a text location (path segment, query value or header).
///
/// Strings travel raw; everything else travels in the marshaller's encoding.
pub fn encode_text(
    marshaller: &dyn Marshaller,
    value: &Value,
    shape: &Shape,
) -> Result<String, MarshalError> {
    if shape.is_textual()
        && let Value::String(text) = value
    {
        return Ok(text.clone());
    }
    let bytes = marshaller.encode(value, shape)?;
    String::from_utf8(bytes).map_err(|e| MarshalError::Encode(e.to_string()))
}

/// Inverse of [`encode_text`]
pub fn decode_text(
    marshaller: &dyn Marshaller,
    text: &str,
    shape: &Shape,
) -> Result<Value, MarshalError> {
    if shape.is_textual() {
        return Ok(Value::String(text.to_string()));
    }
    marshaller.decode(text.as_bytes(), shape)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
