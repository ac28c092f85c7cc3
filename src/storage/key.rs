//! Fixed-Width Keys
//!
//! Keys travel on the overlay as 20-byte, left-aligned, zero-padded buffers.
//! Locally the valid length is kept explicitly so decoding never has to guess
//! where a key ends.

use std::fmt;
use thiserror::Error;

/// Size of a key on the wire (same width as a DHT info-hash).
pub const KEY_SIZE: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is empty")]
    Empty,

    #[error("key is too long: {len} > {max}")]
    TooLong { len: usize, max: usize },

    #[error("key contains a zero byte at position {0}")]
    EmbeddedZero(usize),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    bytes: [u8; KEY_SIZE],
    len: usize,
}

impl Key {
    /// Encodes a human-readable key into the padded wire buffer.
    pub fn encode(key: &str) -> Result<Self, KeyError> {
        let raw = key.as_bytes();

        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > KEY_SIZE {
            return Err(KeyError::TooLong {
                len: raw.len(),
                max: KEY_SIZE,
            });
        }
        if let Some(pos) = raw.iter().position(|b| *b == 0) {
            return Err(KeyError::EmbeddedZero(pos));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes[..raw.len()].copy_from_slice(raw);

        Ok(Self {
            bytes,
            len: raw.len(),
        })
    }

    /// Rebuilds a key from its padded wire form; the key ends at the first zero byte.
    pub fn from_wire(bytes: [u8; KEY_SIZE]) -> Self {
        let len = bytes.iter().position(|b| *b == 0).unwrap_or(KEY_SIZE);
        let mut clean = [0u8; KEY_SIZE];
        clean[..len].copy_from_slice(&bytes[..len]);
        Self { bytes: clean, len }
    }

    pub fn to_wire(&self) -> [u8; KEY_SIZE] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Human-readable form, if the key bytes are UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.as_str().is_some_and(|s| s.starts_with(prefix))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "0x{}", hex::encode(self.as_bytes())),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}
