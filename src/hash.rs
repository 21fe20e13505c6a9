//! 20-byte object identity, rendered as 40 lowercase hex characters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::GraftError;

pub const HASH_BYTES: usize = 20;
pub const HASH_HEX_LEN: usize = HASH_BYTES * 2;

/// A SHA-1 digest identifying a blob, tree, or commit by its header-prefixed
/// payload. Always the binary 20-byte form; the hex form is only used at the
/// edges (parsing tree entries, printing, config files).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(#[serde(with = "hex_bytes")] [u8; HASH_BYTES]);

impl ObjectHash {
    pub fn from_bytes(bytes: [u8; HASH_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }

    /// Hashes `"<kind> <len>\0" + payload`, the canonical object digest.
    pub fn of_object(kind: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(payload.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(payload);
        let digest = hasher.finalize();
        let mut bytes = [0u8; HASH_BYTES];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ObjectHash {
    type Err = GraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(GraftError::Protocol(format!(
                "expected a {HASH_HEX_LEN}-char hex hash, got {} chars",
                s.len()
            )));
        }
        let decoded = hex::decode(s)
            .map_err(|e| GraftError::Protocol(format!("invalid hex hash {s:?}: {e}")))?;
        let mut bytes = [0u8; HASH_BYTES];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.to_hex())
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 20], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 20], D::Error> {
        let s = String::deserialize(d)?;
        let v = hex::decode(&s).map_err(serde::de::Error::custom)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("hash must be 20 bytes"))
    }
}
