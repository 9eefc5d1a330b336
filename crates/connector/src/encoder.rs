//! Schema filtering and Avro encoding with the registry wire frame
//!
//! Frame layout: `0x00` magic byte, 4-byte big-endian schema id, Avro binary datum.

use apache_avro::types::Value as AvroValue;
use apache_avro::{from_avro_datum, to_avro_datum, Schema};
use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Number, Value};

use crate::binding::TopicBinding;
use crate::error::EncodeError;

/// Untyped key -> value record as decoded from the feed
pub type RawRecord = Map<String, Value>;

pub const MAGIC_BYTE: u8 = 0x00;
pub const HEADER_LEN: usize = 5;

/// Keep exactly the keys declared by the schema
pub fn filter(record: &RawRecord, field_names: &[String]) -> RawRecord {
    record
        .iter()
        .filter(|(k, _)| field_names.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Widen through the shortest decimal form so 189.95f32 becomes 189.95, not 189.9499969482422
pub fn widen_f32(value: f32) -> f64 {
    value
        .to_string()
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(value))
}

pub fn frame(schema_id: i32, datum: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + datum.len());
    buf.put_u8(MAGIC_BYTE);
    buf.put_i32(schema_id);
    buf.put_slice(datum);
    buf.freeze()
}

/// Split a frame into schema id and datum
pub fn unframe(bytes: &[u8]) -> Result<(i32, &[u8]), EncodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EncodeError::InvalidFrame(format!(
            "{} bytes is shorter than the frame header",
            bytes.len()
        )));
    }
    if bytes[0] != MAGIC_BYTE {
        return Err(EncodeError::InvalidFrame(format!(
            "unexpected magic byte {:#04x}",
            bytes[0]
        )));
    }
    let schema_id = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((schema_id, &bytes[HEADER_LEN..]))
}

fn to_avro(value: &Value, schema: &Schema) -> Result<AvroValue, String> {
    match (schema, value) {
        (Schema::Null, Value::Null) => Ok(AvroValue::Null),
        (Schema::Boolean, Value::Bool(b)) => Ok(AvroValue::Boolean(*b)),
        (Schema::Int, Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(AvroValue::Int)
            .ok_or_else(|| format!("{} is not an int", n)),
        (Schema::Long, Value::Number(n)) => n
            .as_i64()
            .map(AvroValue::Long)
            .ok_or_else(|| format!("{} is not a long", n)),
        (Schema::Float, Value::Number(n)) => n
            .as_f64()
            .map(|v| AvroValue::Float(v as f32))
            .ok_or_else(|| format!("{} is not a float", n)),
        (Schema::Double, Value::Number(n)) => n
            .as_f64()
            .map(AvroValue::Double)
            .ok_or_else(|| format!("{} is not a double", n)),
        (Schema::String, Value::String(s)) => Ok(AvroValue::String(s.clone())),
        (Schema::Union(union), value) => union
            .variants()
            .iter()
            .enumerate()
            .find_map(|(i, variant)| {
                to_avro(value, variant)
                    .ok()
                    .map(|v| AvroValue::Union(i as u32, Box::new(v)))
            })
            .ok_or_else(|| format!("{} matches no branch of the union", value)),
        // Complex and logical types go through the library's resolution rules
        (schema, value) => AvroValue::from(value.clone())
            .resolve(schema)
            .map_err(|e| e.to_string()),
    }
}

fn from_avro(value: AvroValue) -> Result<Value, String> {
    Ok(match value {
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(b) => Value::Bool(b),
        AvroValue::Int(v) | AvroValue::Date(v) | AvroValue::TimeMillis(v) => Value::from(v),
        AvroValue::Long(v)
        | AvroValue::TimeMicros(v)
        | AvroValue::TimestampMillis(v)
        | AvroValue::TimestampMicros(v) => Value::from(v),
        AvroValue::Float(v) => float_value(widen_f32(v)),
        AvroValue::Double(v) => float_value(v),
        AvroValue::String(s) | AvroValue::Enum(_, s) => Value::String(s),
        AvroValue::Union(_, inner) => from_avro(*inner)?,
        AvroValue::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_avro)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AvroValue::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| Ok((k, from_avro(v)?)))
                .collect::<Result<Map<_, _>, String>>()?,
        ),
        AvroValue::Record(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| Ok((k, from_avro(v)?)))
                .collect::<Result<Map<_, _>, String>>()?,
        ),
        other => return Err(format!("unsupported avro value {:?}", other)),
    })
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Encodes enriched records against a topic binding's schema
pub struct SchemaEncoder;

impl SchemaEncoder {
    /// Validate `record` against the binding schema and return the framed datum.
    /// Absent optional fields take their schema default.
    pub fn encode(record: &RawRecord, binding: &TopicBinding) -> Result<Bytes, EncodeError> {
        let mismatch = |reason: String| EncodeError::SchemaMismatch {
            schema_id: binding.schema_id,
            reason,
        };

        let Schema::Record(ref record_schema) = binding.schema else {
            return Err(mismatch("value schema is not a record".to_string()));
        };

        let mut fields = Vec::with_capacity(record_schema.fields.len());
        for field in &record_schema.fields {
            let value = match (record.get(&field.name), field.default.as_ref()) {
                (Some(value), _) => to_avro(value, &field.schema),
                (None, Some(default)) => to_avro(default, &field.schema),
                (None, None) => Err("missing required field".to_string()),
            }
            .map_err(|reason| mismatch(format!("field {}: {}", field.name, reason)))?;
            fields.push((field.name.clone(), value));
        }

        let datum = to_avro_datum(&binding.schema, AvroValue::Record(fields))
            .map_err(|e| mismatch(e.to_string()))?;
        Ok(frame(binding.schema_id, &datum))
    }

    /// Inverse of `encode`. Optional fields absent at encode time come back as null.
    pub fn decode(bytes: &[u8], binding: &TopicBinding) -> Result<RawRecord, EncodeError> {
        let (schema_id, mut datum) = unframe(bytes)?;
        if schema_id != binding.schema_id {
            return Err(EncodeError::InvalidFrame(format!(
                "schema id {} does not match binding schema id {}",
                schema_id, binding.schema_id
            )));
        }

        let value = from_avro_datum(&binding.schema, &mut datum, None)
            .map_err(|e| EncodeError::InvalidFrame(e.to_string()))?;
        match from_avro(value).map_err(EncodeError::InvalidFrame)? {
            Value::Object(record) => Ok(record),
            other => Err(EncodeError::InvalidFrame(format!(
                "decoded value is not a record: {}",
                other
            ))),
        }
    }
}
