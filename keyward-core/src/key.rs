//! Key model produced by the big-key inspector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Bytes in one mebibyte, the unit used by size thresholds and reports.
pub const MEBIBYTE: u64 = 1024 * 1024;

/// Value type of a key as reported by `TYPE`.
///
/// The set is closed: supporting a new remote data type means adding a
/// variant here, and every `match` over it must then handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyType {
    /// Plain string value.
    #[serde(rename = "string")]
    String,
    /// Linked list.
    #[serde(rename = "list")]
    List,
    /// Field/value hash.
    #[serde(rename = "hash")]
    Hash,
    /// Unordered set.
    #[serde(rename = "set")]
    Set,
    /// Sorted set.
    #[serde(rename = "zset")]
    SortedSet,
}

impl KeyType {
    /// Returns the name used by the cache node for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Hash => "hash",
            Self::Set => "set",
            Self::SortedSet => "zset",
        }
    }

    /// Command returning the element count for this type.
    pub fn length_command(&self) -> &'static str {
        match self {
            Self::String => "STRLEN",
            Self::List => "LLEN",
            Self::Hash => "HLEN",
            Self::Set => "SCARD",
            Self::SortedSet => "ZCARD",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "list" => Ok(Self::List),
            "hash" => Ok(Self::Hash),
            "set" => Ok(Self::Set),
            "zset" => Ok(Self::SortedSet),
            other => Err(StoreError::Unsupported(other.to_owned())),
        }
    }
}

/// Remaining lifetime of a key, decoded from the `TTL` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Key has no expiry (`-1`).
    Never,
    /// Key is gone or already expired (`-2`).
    Expired,
    /// Seconds left before expiration.
    In(u64),
}

impl From<i64> for Expiry {
    fn from(ttl: i64) -> Self {
        match ttl {
            -1 => Self::Never,
            t if t < 0 => Self::Expired,
            t => Self::In(t as u64),
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("no ttl"),
            Self::Expired => f.write_str("expired"),
            Self::In(secs) => write!(f, "{secs}s"),
        }
    }
}

/// Metadata of a single inspected key.
///
/// Produced once by the inspector and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key name.
    #[serde(rename = "key")]
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// Memory footprint reported by `MEMORY USAGE`.
    #[serde(rename = "memory_bytes")]
    pub size_bytes: u64,
    /// String length or collection cardinality.
    #[serde(rename = "elements")]
    pub element_count: u64,
    /// Raw `TTL` reply: `-1` no expiry, `-2` missing.
    #[serde(rename = "ttl")]
    pub ttl_seconds: i64,
}

impl KeyRecord {
    /// Decoded view of [`KeyRecord::ttl_seconds`].
    pub fn expiry(&self) -> Expiry {
        Expiry::from(self.ttl_seconds)
    }

    /// Size in mebibytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / MEBIBYTE as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_type_names() {
        assert_eq!("zset".parse::<KeyType>().unwrap(), KeyType::SortedSet);
        assert_eq!("hash".parse::<KeyType>().unwrap(), KeyType::Hash);
        assert!(matches!(
            "stream".parse::<KeyType>(),
            Err(StoreError::Unsupported(name)) if name == "stream"
        ));
    }

    #[test]
    fn decodes_ttl_reply() {
        assert_eq!(Expiry::from(-1), Expiry::Never);
        assert_eq!(Expiry::from(-2), Expiry::Expired);
        assert_eq!(Expiry::from(42).to_string(), "42s");
    }
}
