//! Named Binary Tag model plus the codecs built on it.
//!
//! Every multi-byte value is big-endian. A file is a single named root tag,
//! which for all Minecraft data is a compound.

pub mod json;
pub mod reader;
pub mod schema;
pub mod writer;

use std::fmt::Write as _;

use crate::compression::{self, Compression};
use crate::error::{Result, WorldError};

pub use reader::read_root;
pub use writer::write_root;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagId {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TryFrom<u8> for TagId {
    type Error = WorldError;

    fn try_from(id: u8) -> Result<Self> {
        Ok(match id {
            0 => TagId::End,
            1 => TagId::Byte,
            2 => TagId::Short,
            3 => TagId::Int,
            4 => TagId::Long,
            5 => TagId::Float,
            6 => TagId::Double,
            7 => TagId::ByteArray,
            8 => TagId::String,
            9 => TagId::List,
            10 => TagId::Compound,
            11 => TagId::IntArray,
            12 => TagId::LongArray,
            other => return Err(WorldError::UnknownTag(other)),
        })
    }
}

/// A single NBT payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    pub fn id(&self) -> TagId {
        match self {
            Tag::Byte(_) => TagId::Byte,
            Tag::Short(_) => TagId::Short,
            Tag::Int(_) => TagId::Int,
            Tag::Long(_) => TagId::Long,
            Tag::Float(_) => TagId::Float,
            Tag::Double(_) => TagId::Double,
            Tag::ByteArray(_) => TagId::ByteArray,
            Tag::String(_) => TagId::String,
            Tag::List(_) => TagId::List,
            Tag::Compound(_) => TagId::Compound,
            Tag::IntArray(_) => TagId::IntArray,
            Tag::LongArray(_) => TagId::LongArray,
        }
    }

    /// Human readable payload kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Byte(_) => "byte",
            Tag::Short(_) => "short",
            Tag::Int(_) => "int",
            Tag::Long(_) => "long",
            Tag::Float(_) => "float",
            Tag::Double(_) => "double",
            Tag::ByteArray(_) => "byte array",
            Tag::String(_) => "string",
            Tag::List(_) => "list",
            Tag::Compound(_) => "compound",
            Tag::IntArray(_) => "int array",
            Tag::LongArray(_) => "long array",
        }
    }

    /// Widens any integer payload to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v as i64),
            Tag::Short(v) => Some(v as i64),
            Tag::Int(v) => Some(v as i64),
            Tag::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Tag::Float(v) => Some(v as f64),
            Tag::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Tag::List(l) => Some(l),
            _ => None,
        }
    }
}

/// A homogeneous list. The element id is kept even when the list is empty,
/// since Minecraft is not consistent about what it writes there.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub element: TagId,
    pub items: Vec<Tag>,
}

impl List {
    pub fn new(element: TagId) -> Self {
        List {
            element,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, tag: Tag) -> Result<()> {
        if self.items.is_empty() && self.element == TagId::End {
            self.element = tag.id();
        }
        if tag.id() != self.element {
            return Err(WorldError::InvalidNbt(format!(
                "list of {:?} cannot hold a {}",
                self.element,
                tag.kind()
            )));
        }
        self.items.push(tag);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.items.iter()
    }
}

/// Insertion-ordered map of named tags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Compound::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    /// Inserts a tag. Replacing an existing name keeps its position and
    /// returns the previous payload.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) -> Option<Tag> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, tag)),
            None => {
                self.entries.push((name, tag));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn get_i8(&self, name: &str) -> Option<i8> {
        match self.get(name)? {
            Tag::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i16(&self, name: &str) -> Option<i16> {
        match self.get(name)? {
            Tag::Short(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Tag::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Tag::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Tag::Double(v) => Some(*v),
            Tag::Float(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn get_byte_array(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            Tag::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_int_array(&self, name: &str) -> Option<&[i32]> {
        match self.get(name)? {
            Tag::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&List> {
        self.get(name)?.as_list()
    }

    pub fn get_compound(&self, name: &str) -> Option<&Compound> {
        self.get(name)?.as_compound()
    }

    pub fn get_compound_mut(&mut self, name: &str) -> Option<&mut Compound> {
        self.get_mut(name)?.as_compound_mut()
    }
}

impl<'a> IntoIterator for &'a Compound {
    type Item = &'a (String, Tag);
    type IntoIter = std::slice::Iter<'a, (String, Tag)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        let mut compound = Compound::new();
        for (name, tag) in iter {
            compound.insert(name, tag);
        }
        compound
    }
}

/// A root tag: always a compound, usually with an empty name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedTag {
    pub name: String,
    pub compound: Compound,
}

impl NamedTag {
    pub fn new(name: impl Into<String>, compound: Compound) -> Self {
        NamedTag {
            name: name.into(),
            compound,
        }
    }
}

/// Decompresses `bytes` with `mode` and decodes the root tag.
pub fn read_compressed(bytes: &[u8], mode: Compression, limit: usize) -> Result<NamedTag> {
    let raw = compression::inflate(bytes, mode, limit)?;
    read_root(&raw)
}

/// Encodes `root` and compresses it with `mode`.
pub fn write_compressed(root: &NamedTag, mode: Compression, level: u32) -> Result<Vec<u8>> {
    let raw = write_root(root)?;
    compression::deflate(&raw, mode, level)
}

/// Formats the first `count` bytes of `buffer` as a hex dump: offset column,
/// 4-byte groups, printable ASCII gutter.
pub fn hex_dump(buffer: &[u8], count: usize) -> String {
    let mut out = String::new();
    for (row, chunk) in buffer[..count.min(buffer.len())].chunks(16).enumerate() {
        let _ = write!(out, " {:4} ", row * 16);
        for (i, byte) in chunk.iter().enumerate() {
            let _ = write!(out, "{:02x}", byte);
            if i % 4 == 3 {
                out.push(' ');
            }
        }
        let gutter: String = chunk
            .iter()
            .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, " |{}|", gutter);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_insert_replaces_in_place() {
        let mut c = Compound::new();
        c.insert("a", Tag::Int(1));
        c.insert("b", Tag::Int(2));
        assert_eq!(c.insert("a", Tag::Int(3)), Some(Tag::Int(1)));
        let names: Vec<&str> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(c.get_i32("a"), Some(3));
        assert_eq!(c.get_i64("a"), None);
    }

    #[test]
    fn list_rejects_mixed_items() {
        let mut list = List::new(TagId::End);
        list.push(Tag::Short(1)).unwrap();
        assert_eq!(list.element, TagId::Short);
        assert!(list.push(Tag::Int(1)).is_err());
    }

    #[test]
    fn unknown_tag_id() {
        assert!(matches!(TagId::try_from(13), Err(WorldError::UnknownTag(13))));
        assert_eq!(TagId::try_from(12).unwrap(), TagId::LongArray);
    }

    #[test]
    fn hex_dump_rows() {
        let dump = hex_dump(b"0123456789abcdef\x00\x01", 18);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("|0123456789abcdef|"));
        assert!(lines[1].starts_with("   16 0001"));
        assert!(lines[1].ends_with("|..|"));
    }
}
