//! Id strings: the 64-bit name hashes the engine embeds in logs and
//! profiler streams, and the string tables used to turn them back into text.

mod murmur;
mod table;

pub use murmur::hash64;
pub use table::SymbolTable;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit id-string hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash64(pub u64);

impl Hash64 {
    pub fn of(s: &str) -> Self {
        hash64(s.as_bytes())
    }

    /// The 32-bit id string is the low half of the 64-bit one.
    pub const fn low32(self) -> u32 {
        self.0 as u32
    }

    pub fn short_hex(self) -> String {
        format!("{:08x}", self.low32())
    }
}

impl fmt::Display for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Hash64 {
    fn from(v: u64) -> Self {
        Hash64(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHashError {
    #[error("expected 8 or 16 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex digit in {0:?}")]
    InvalidDigit(String),
}

/// Key into a [`SymbolTable`]: either a full 64-bit hash or its 32-bit truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKey {
    Full(Hash64),
    Short(u32),
}

/// Parses 16 hex digits as a full hash and 8 as a short one.
impl FromStr for IdKey {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseHashError::InvalidDigit(s.to_string()));
        }
        let bad = |_| ParseHashError::InvalidDigit(s.to_string());
        match s.len() {
            16 => Ok(IdKey::Full(Hash64(u64::from_str_radix(s, 16).map_err(bad)?))),
            8 => Ok(IdKey::Short(u32::from_str_radix(s, 16).map_err(bad)?)),
            n => Err(ParseHashError::InvalidLength(n)),
        }
    }
}

impl FromStr for Hash64 {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<IdKey>()? {
            IdKey::Full(h) => Ok(h),
            IdKey::Short(_) => Err(ParseHashError::InvalidLength(s.len())),
        }
    }
}
