// src/nbt/writer.rs
use super::{Compound, NamedTag, Tag, TagId};
use crate::error::{Result, WorldError};
use byteorder::{BigEndian, WriteBytesExt};
use log::trace;

/// Encodes a root compound, including its name and the closing TAG_End.
pub fn write_root(root: &NamedTag) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4096);
    out.write_u8(TagId::Compound as u8)?;
    write_string(&mut out, &root.name)?;
    write_compound(&mut out, &root.compound)?;
    trace!("[nbt] wrote root '{}' ({} bytes)", root.name, out.len());
    Ok(out)
}

/// Appends the payload of `tag` (no id, no name).
pub fn write_payload(out: &mut Vec<u8>, tag: &Tag) -> Result<()> {
    match tag {
        Tag::Byte(v) => out.write_i8(*v)?,
        Tag::Short(v) => out.write_i16::<BigEndian>(*v)?,
        Tag::Int(v) => out.write_i32::<BigEndian>(*v)?,
        Tag::Long(v) => out.write_i64::<BigEndian>(*v)?,
        Tag::Float(v) => out.write_f32::<BigEndian>(*v)?,
        Tag::Double(v) => out.write_f64::<BigEndian>(*v)?,
        Tag::ByteArray(bytes) => {
            write_length(out, bytes.len())?;
            out.extend_from_slice(bytes);
        }
        Tag::String(s) => write_string(out, s)?,
        Tag::List(list) => {
            out.write_u8(list.element as u8)?;
            write_length(out, list.items.len())?;
            for item in &list.items {
                if item.id() != list.element {
                    return Err(WorldError::InvalidNbt(format!(
                        "list of {:?} holds a {}",
                        list.element,
                        item.kind()
                    )));
                }
                write_payload(out, item)?;
            }
        }
        Tag::Compound(compound) => write_compound(out, compound)?,
        Tag::IntArray(values) => {
            write_length(out, values.len())?;
            for v in values {
                out.write_i32::<BigEndian>(*v)?;
            }
        }
        Tag::LongArray(values) => {
            write_length(out, values.len())?;
            for v in values {
                out.write_i64::<BigEndian>(*v)?;
            }
        }
    }
    Ok(())
}

fn write_compound(out: &mut Vec<u8>, compound: &Compound) -> Result<()> {
    for (name, tag) in compound.iter() {
        out.write_u8(tag.id() as u8)?;
        write_string(out, name)?;
        write_payload(out, tag)?;
    }
    out.write_u8(TagId::End as u8)?;
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| WorldError::InvalidNbt(format!("string of {} bytes is too long", s.len())))?;
    out.write_u16::<BigEndian>(len)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| WorldError::InvalidNbt(format!("array of {} items is too long", len)))?;
    out.write_i32::<BigEndian>(len)?;
    Ok(())
}
