// src/nbt/reader.rs
use super::{Compound, List, NamedTag, Tag, TagId};
use crate::error::{Result, WorldError};
use byteorder::{BigEndian, ReadBytesExt};
use log::trace;
use std::io::{self, Cursor};

/// Compounds and lists nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 512;

fn eof(context: &'static str) -> impl Fn(io::Error) -> WorldError {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WorldError::UnexpectedEof(context),
        _ => WorldError::Io(e),
    }
}

/// Decodes a complete NBT root. The root must be a compound.
pub fn read_root(bytes: &[u8]) -> Result<NamedTag> {
    let mut cursor = Cursor::new(bytes);
    let id = cursor.read_u8().map_err(eof("root tag id"))?;
    if id != TagId::Compound as u8 {
        return Err(WorldError::InvalidNbt(format!(
            "root tag must be a compound, found id {}",
            id
        )));
    }
    let name = read_string(&mut cursor)?;
    let compound = read_compound(&mut cursor, 0)?;
    trace!(
        "[nbt] root '{}' with {} tags, {} of {} bytes consumed",
        name,
        compound.len(),
        cursor.position(),
        bytes.len()
    );
    Ok(NamedTag { name, compound })
}

/// Decodes one payload of type `id` at the cursor.
pub fn read_payload(cursor: &mut Cursor<&[u8]>, id: TagId, depth: usize) -> Result<Tag> {
    if depth > MAX_DEPTH {
        return Err(WorldError::InvalidNbt(format!(
            "nesting deeper than {} levels",
            MAX_DEPTH
        )));
    }

    Ok(match id {
        TagId::End => {
            return Err(WorldError::InvalidNbt(
                "TAG_End has no payload".to_string(),
            ))
        }
        TagId::Byte => Tag::Byte(cursor.read_i8().map_err(eof("byte"))?),
        TagId::Short => Tag::Short(cursor.read_i16::<BigEndian>().map_err(eof("short"))?),
        TagId::Int => Tag::Int(cursor.read_i32::<BigEndian>().map_err(eof("int"))?),
        TagId::Long => Tag::Long(cursor.read_i64::<BigEndian>().map_err(eof("long"))?),
        TagId::Float => Tag::Float(cursor.read_f32::<BigEndian>().map_err(eof("float"))?),
        TagId::Double => Tag::Double(cursor.read_f64::<BigEndian>().map_err(eof("double"))?),
        TagId::ByteArray => {
            let len = read_length(cursor, "byte array")?;
            let start = cursor.position() as usize;
            let bytes = take(cursor, len, "byte array")?;
            trace!("[nbt] byte array of {} bytes at {}", len, start);
            Tag::ByteArray(bytes.to_vec())
        }
        TagId::String => Tag::String(read_string(cursor)?),
        TagId::List => {
            let element = TagId::try_from(cursor.read_u8().map_err(eof("list element id"))?)?;
            let len = read_length(cursor, "list")?;
            if element == TagId::End && len > 0 {
                return Err(WorldError::InvalidNbt(format!(
                    "list of TAG_End with {} items",
                    len
                )));
            }
            let mut items = Vec::with_capacity(len.min(remaining(cursor)));
            for _ in 0..len {
                items.push(read_payload(cursor, element, depth + 1)?);
            }
            Tag::List(List { element, items })
        }
        TagId::Compound => Tag::Compound(read_compound(cursor, depth + 1)?),
        TagId::IntArray => {
            let len = read_length(cursor, "int array")?;
            if len * 4 > remaining(cursor) {
                return Err(WorldError::UnexpectedEof("int array"));
            }
            let mut values = vec![0i32; len];
            cursor
                .read_i32_into::<BigEndian>(&mut values)
                .map_err(eof("int array"))?;
            Tag::IntArray(values)
        }
        TagId::LongArray => {
            let len = read_length(cursor, "long array")?;
            if len * 8 > remaining(cursor) {
                return Err(WorldError::UnexpectedEof("long array"));
            }
            let mut values = vec![0i64; len];
            cursor
                .read_i64_into::<BigEndian>(&mut values)
                .map_err(eof("long array"))?;
            Tag::LongArray(values)
        }
    })
}

fn read_compound(cursor: &mut Cursor<&[u8]>, depth: usize) -> Result<Compound> {
    let mut compound = Compound::new();
    loop {
        let id = cursor.read_u8().map_err(eof("compound entry id"))?;
        if id == TagId::End as u8 {
            break;
        }
        let id = TagId::try_from(id)?;
        let name = read_string(cursor)?;
        let payload = read_payload(cursor, id, depth)?;
        compound.insert(name, payload);
    }
    Ok(compound)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u16::<BigEndian>().map_err(eof("string length"))? as usize;
    let bytes = take(cursor, len, "string")?;
    // Java writes modified UTF-8; only NUL and supplementary characters differ.
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_length(cursor: &mut Cursor<&[u8]>, context: &'static str) -> Result<usize> {
    let len = cursor.read_i32::<BigEndian>().map_err(eof(context))?;
    usize::try_from(len)
        .map_err(|_| WorldError::InvalidNbt(format!("negative {} length {}", context, len)))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

fn take<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize, context: &'static str) -> Result<&'a [u8]> {
    if len > remaining(cursor) {
        return Err(WorldError::UnexpectedEof(context));
    }
    let start = cursor.position() as usize;
    let data: &'a [u8] = *cursor.get_ref();
    cursor.set_position((start + len) as u64);
    Ok(&data[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello world" example from the format description.
    const HELLO_WORLD: &[u8] = &[
        0x0a, 0x00, 0x0b, b'h', b'e', b'l', b'l', b'o', b' ', b'w', b'o', b'r', b'l', b'd',
        0x08, 0x00, 0x04, b'n', b'a', b'm', b'e', 0x00, 0x09, b'B', b'a', b'n', b'a', b'n',
        b'r', b'a', b'm', b'a', 0x00,
    ];

    #[test]
    fn reads_hello_world() {
        let root = read_root(HELLO_WORLD).unwrap();
        assert_eq!(root.name, "hello world");
        assert_eq!(root.compound.get_str("name"), Some("Bananrama"));
    }

    #[test]
    fn reads_numbers_as_their_real_types() {
        let mut bytes = vec![0x0a, 0x00, 0x00];
        bytes.extend([0x05, 0x00, 0x01, b'f']);
        bytes.extend(1.5f32.to_be_bytes());
        bytes.extend([0x06, 0x00, 0x01, b'd']);
        bytes.extend((-0.25f64).to_be_bytes());
        bytes.extend([0x04, 0x00, 0x01, b'l']);
        bytes.extend((-2i64).to_be_bytes());
        bytes.extend([0x01, 0x00, 0x01, b'b', 0xff]);
        bytes.push(0x00);

        let root = read_root(&bytes).unwrap();
        assert_eq!(root.compound.get("f"), Some(&Tag::Float(1.5)));
        assert_eq!(root.compound.get_f64("d"), Some(-0.25));
        assert_eq!(root.compound.get_i64("l"), Some(-2));
        assert_eq!(root.compound.get_i8("b"), Some(-1));
    }

    #[test]
    fn reads_lists_and_int_arrays() {
        let mut bytes = vec![0x0a, 0x00, 0x00];
        bytes.extend([0x09, 0x00, 0x01, b'L', 0x02, 0, 0, 0, 2, 0x00, 0x07, 0xff, 0xff]);
        bytes.extend([0x0b, 0x00, 0x01, b'I', 0, 0, 0, 2, 0, 0, 1, 0, 0xff, 0xff, 0xff, 0xfe]);
        bytes.push(0x00);

        let root = read_root(&bytes).unwrap();
        let list = root.compound.get_list("L").unwrap();
        assert_eq!(list.element, TagId::Short);
        assert_eq!(list.items, vec![Tag::Short(7), Tag::Short(-1)]);
        assert_eq!(root.compound.get_int_array("I"), Some(&[256, -2][..]));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let cut = &HELLO_WORLD[..HELLO_WORLD.len() - 4];
        assert!(matches!(read_root(cut), Err(WorldError::UnexpectedEof(_))));
    }

    #[test]
    fn huge_declared_length_does_not_allocate() {
        let bytes = [0x0a, 0x00, 0x00, 0x07, 0x00, 0x01, b'a', 0x7f, 0xff, 0xff, 0xff];
        assert!(matches!(read_root(&bytes), Err(WorldError::UnexpectedEof(_))));
    }

    #[test]
    fn negative_length_is_invalid() {
        let bytes = [0x0a, 0x00, 0x00, 0x07, 0x00, 0x01, b'a', 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(read_root(&bytes), Err(WorldError::InvalidNbt(_))));
    }

    #[test]
    fn root_must_be_compound() {
        assert!(matches!(
            read_root(&[0x01, 0x00, 0x00, 0x05]),
            Err(WorldError::InvalidNbt(_))
        ));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let bytes = [0x0a, 0x00, 0x00, 0x0d, 0x00, 0x01, b'x', 0x00];
        assert!(matches!(read_root(&bytes), Err(WorldError::UnknownTag(13))));
    }

    fn nested_compounds(depth: usize) -> Vec<u8> {
        let mut bytes = vec![0x0a, 0x00, 0x00];
        for _ in 0..depth {
            bytes.extend([0x0a, 0x00, 0x01, b'c']);
        }
        bytes.extend(std::iter::repeat(0x00).take(depth + 1));
        bytes
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let err = read_root(&nested_compounds(600)).unwrap_err();
        assert!(matches!(err, WorldError::InvalidNbt(_)));
        assert!(err.to_string().contains("512"));

        let root = read_root(&nested_compounds(100)).unwrap();
        let mut inner = &root.compound;
        for _ in 0..100 {
            inner = inner.get_compound("c").unwrap();
        }
        assert!(inner.is_empty());
    }

    #[test]
    fn empty_names_inside_compounds_are_read() {
        let bytes = [0x0a, 0x00, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00];
        let root = read_root(&bytes).unwrap();
        assert_eq!(root.compound.get_i8(""), Some(5));
        assert_eq!(root.compound.len(), 1);
    }
}
