//! Conversion between NBT trees and `serde_json` values, the shape the
//! JavaScript host sees.
//!
//! Going to JSON loses the numeric tag types. Coming back, each name is typed
//! from the tag it replaces when there is one, otherwise from a schema table.
//!
//! JavaScript numbers are doubles, so longs outside the safe integer range are
//! written as decimal strings and read back from them.

use serde_json::{Map, Number, Value};

use super::schema::{self, TagSchema};
use super::{Compound, List, Tag, TagId};
use crate::error::{Result, WorldError};

/// Largest integer a double holds exactly.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

fn long(v: i64) -> Value {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&v) {
        Value::from(v)
    } else {
        Value::String(v.to_string())
    }
}

pub fn to_json(tag: &Tag) -> Value {
    match tag {
        Tag::Byte(v) => Value::from(*v),
        Tag::Short(v) => Value::from(*v),
        Tag::Int(v) => Value::from(*v),
        Tag::Long(v) => long(*v),
        Tag::Float(v) => float(*v as f64),
        Tag::Double(v) => float(*v),
        Tag::ByteArray(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        // Game rules are stored as the strings "true" and "false".
        Tag::String(s) if s == "true" => Value::Bool(true),
        Tag::String(s) if s == "false" => Value::Bool(false),
        Tag::String(s) => Value::String(s.clone()),
        Tag::List(list) => Value::Array(list.items.iter().map(to_json).collect()),
        Tag::Compound(c) => compound_to_json(c),
        Tag::IntArray(values) => Value::Array(values.iter().map(|v| Value::from(*v)).collect()),
        Tag::LongArray(values) => Value::Array(values.iter().map(|v| long(*v)).collect()),
    }
}

pub fn compound_to_json(compound: &Compound) -> Value {
    let map: Map<String, Value> = compound
        .iter()
        .map(|(name, tag)| (name.to_string(), to_json(tag)))
        .collect();
    Value::Object(map)
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Builds a compound from a JSON object.
///
/// `previous` is the compound being replaced, if any; its tags fix the types
/// of matching names. Names found neither there nor in `table` are rejected.
pub fn compound_from_json(
    value: &Value,
    table: &'static [TagSchema],
    previous: Option<&Compound>,
) -> Result<Compound> {
    let object = value.as_object().ok_or_else(|| WorldError::TypeMismatch {
        name: "<root>".to_string(),
        expected: TagId::Compound,
        found: json_kind(value),
    })?;

    let mut compound = Compound::new();
    for (name, v) in object {
        let like = previous.and_then(|p| p.get(name));
        let entry = schema::lookup(table, name);
        let id = match (like, entry) {
            (Some(tag), _) => tag.id(),
            (None, Some(entry)) => entry.id,
            (None, None) => return Err(WorldError::InvalidTagName(name.clone())),
        };
        compound.insert(name.clone(), tag_from_json(name, v, id, like, table)?);
    }
    Ok(compound)
}

fn tag_from_json(
    name: &str,
    value: &Value,
    id: TagId,
    like: Option<&Tag>,
    table: &'static [TagSchema],
) -> Result<Tag> {
    let mismatch = || WorldError::TypeMismatch {
        name: name.to_string(),
        expected: id,
        found: json_kind(value),
    };

    let tag = match id {
        TagId::Byte => {
            let v = match value {
                Value::Bool(b) => *b as i64,
                _ => int(value).ok_or_else(mismatch)?,
            };
            Tag::Byte(i8::try_from(v).map_err(|_| mismatch())?)
        }
        TagId::Short => Tag::Short(int(value).and_then(|v| i16::try_from(v).ok()).ok_or_else(mismatch)?),
        TagId::Int => Tag::Int(int(value).and_then(|v| i32::try_from(v).ok()).ok_or_else(mismatch)?),
        TagId::Long => Tag::Long(long_from(value).ok_or_else(mismatch)?),
        TagId::Float => Tag::Float(value.as_f64().ok_or_else(mismatch)? as f32),
        TagId::Double => Tag::Double(value.as_f64().ok_or_else(mismatch)?),
        TagId::String => match value {
            Value::String(s) => Tag::String(s.clone()),
            Value::Bool(b) => Tag::String(b.to_string()),
            _ => return Err(mismatch()),
        },
        TagId::ByteArray => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let bytes = items
                .iter()
                .map(|v| match int(v) {
                    Some(b @ -128..=255) => Ok(b as u8),
                    _ => Err(mismatch()),
                })
                .collect::<Result<Vec<u8>>>()?;
            Tag::ByteArray(bytes)
        }
        TagId::IntArray => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let values = items
                .iter()
                .map(|v| int(v).and_then(|v| i32::try_from(v).ok()).ok_or_else(mismatch))
                .collect::<Result<Vec<i32>>>()?;
            Tag::IntArray(values)
        }
        TagId::LongArray => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let values = items
                .iter()
                .map(|v| long_from(v).ok_or_else(mismatch))
                .collect::<Result<Vec<i64>>>()?;
            Tag::LongArray(values)
        }
        TagId::Compound => {
            let previous = like.and_then(Tag::as_compound);
            Tag::Compound(compound_from_json(value, table, previous)?)
        }
        TagId::List => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let previous = like.and_then(Tag::as_list);
            let entry = schema::lookup(table, name);
            let element = match (previous, entry) {
                (Some(list), _) if list.element != TagId::End => list.element,
                (_, Some(entry)) => entry.element,
                _ if items.is_empty() => TagId::End,
                _ => return Err(WorldError::InvalidTagName(name.to_string())),
            };

            let mut list = List::new(element);
            if items.is_empty() && entry.is_some_and(|e| e.empty_byte_list) {
                list.element = TagId::ByteArray;
            }
            for (i, item) in items.iter().enumerate() {
                let item_like = previous.and_then(|l| l.items.get(i));
                list.items
                    .push(tag_from_json(name, item, element, item_like, table)?);
            }
            Tag::List(list)
        }
        TagId::End => return Err(mismatch()),
    };
    Ok(tag)
}

/// Integral numbers, including doubles that hold an integer exactly.
fn int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

fn long_from(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.parse().ok(),
        _ => int(value),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What a value looks like after a trip through a JavaScript engine:
/// integers beyond 32 bits come back as doubles.
#[cfg(test)]
pub(crate) fn through_js(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_err() => Number::from_f64(i as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(through_js).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), through_js(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}
