// src/nibble.rs
use crate::coords::SECTION_VOLUME;
use crate::error::{Result, WorldError};

/// Bytes needed to hold one nibble per block of a section (2048).
pub const NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

/// 4096 four-bit values packed two per byte, even indices in the low nibble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibbleArray {
    data: Vec<u8>,
}

impl NibbleArray {
    pub fn new() -> Self {
        NibbleArray {
            data: vec![0; NIBBLE_BYTES],
        }
    }

    /// An array where every nibble is `value` (masked to 4 bits).
    pub fn filled(value: u8) -> Self {
        let v = value & 0x0f;
        NibbleArray {
            data: vec![v | (v << 4); NIBBLE_BYTES],
        }
    }

    pub fn from_bytes(bytes: &[u8], context: &str) -> Result<Self> {
        if bytes.len() != NIBBLE_BYTES {
            return Err(WorldError::InvalidChunk(format!(
                "{} holds {} bytes, expected {}",
                context,
                bytes.len(),
                NIBBLE_BYTES
            )));
        }
        Ok(NibbleArray {
            data: bytes.to_vec(),
        })
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        let byte = self.data[index >> 1];
        if index & 1 == 0 {
            byte & 0x0f
        } else {
            byte >> 4
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        let value = value & 0x0f;
        let byte = &mut self.data[index >> 1];
        if index & 1 == 0 {
            *byte = (*byte & 0xf0) | value;
        } else {
            *byte = (*byte & 0x0f) | (value << 4);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for NibbleArray {
    fn default() -> Self {
        NibbleArray::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_indices_use_the_low_nibble() {
        let mut n = NibbleArray::new();
        n.set(0, 0xa);
        n.set(1, 0x5);
        n.set(4095, 0xff);
        assert_eq!(n.as_bytes()[0], 0x5a);
        assert_eq!(n.get(0), 0xa);
        assert_eq!(n.get(1), 0x5);
        assert_eq!(n.get(4095), 0xf);
        assert_eq!(n.as_bytes()[2047], 0xf0);
    }

    #[test]
    fn filled_and_sizes() {
        let n = NibbleArray::filled(15);
        assert!((0..4096).all(|i| n.get(i) == 15));
        assert!(NibbleArray::from_bytes(&[0; 100], "SkyLight").is_err());
        assert!(NibbleArray::new().is_zero());
    }
}
