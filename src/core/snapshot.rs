//! Value snapshots for rollback and duplicate detection.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use super::json_canon::{CanonJsonError, to_canon_json_bytes};

/// SHA-256 over canonical JSON bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotDigest(pub [u8; 32]);

impl SnapshotDigest {
    pub fn to_hex(self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Debug for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotDigest({})", &self.to_hex()[..12])
    }
}

/// Serialized snapshot of an entity value.
///
/// Digest equality is the exact-comparison primitive: two snapshots of the
/// same logical value always have equal digests because the bytes are
/// canonical. Rollback restores from the bytes, comparisons use the digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    bytes: Vec<u8>,
    digest: SnapshotDigest,
}

impl Snapshot {
    pub fn capture<T: Serialize>(value: &T) -> Result<Self, CanonJsonError> {
        let bytes = to_canon_json_bytes(value)?;
        let digest = SnapshotDigest(Sha256::digest(&bytes).into());
        Ok(Self { bytes, digest })
    }

    pub fn digest(&self) -> SnapshotDigest {
        self.digest
    }

    pub fn restore<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }

    pub fn same_value(&self, other: &Snapshot) -> bool {
        self.digest == other.digest
    }
}
