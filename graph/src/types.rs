//! Core domain types shared by every crate in the workspace: the shapes
//! that flow through the ingest pipeline before they are turned into graph
//! mutations. These types carry no I/O and no locking; they are plain data.

use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Block height. The source protocol calls this `blockNum`; we keep the
/// name `BlockNumber` to match the teacher's `graph::blockchain` naming.
pub type BlockNumber = u64;

/// A network tenant prefix, e.g. `spkccT_`. Validated once at construction
/// so every other component can assume the grammar already holds.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NetworkPrefix(Arc<str>);

#[derive(Debug, Error)]
#[error("network prefix '{0}' does not match the required grammar [A-Za-z0-9_-]+_")]
pub struct InvalidPrefix(pub String);

lazy_static::lazy_static! {
    static ref PREFIX_RE: regex::Regex = regex::Regex::new("^[A-Za-z0-9_-]+_$").unwrap();
}

impl NetworkPrefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for NetworkPrefix {
    type Error = InvalidPrefix;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if PREFIX_RE.is_match(s) {
            Ok(NetworkPrefix(Arc::from(s)))
        } else {
            Err(InvalidPrefix(s.to_owned()))
        }
    }
}

impl TryFrom<String> for NetworkPrefix {
    type Error = InvalidPrefix;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        NetworkPrefix::try_from(s.as_str())
    }
}

impl fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkPrefix({})", self.0)
    }
}

/// An opaque checkpoint hash. Treated as bytes everywhere except at the
/// wire boundary, where it arrives and leaves as a JSON string.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ForkHash(Arc<str>);

impl ForkHash {
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        ForkHash(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ForkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ForkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForkHash({})", self.0)
    }
}

impl From<&str> for ForkHash {
    fn from(s: &str) -> Self {
        ForkHash::new(s)
    }
}

impl From<String> for ForkHash {
    fn from(s: String) -> Self {
        ForkHash::new(s)
    }
}

/// The key a Fork is tracked under: either a real checkpoint hash, or the
/// `pending` sentinel for operations that have not yet been bounded by a
/// checkpoint.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ForkKey {
    Pending,
    Hash(ForkHash),
}

impl fmt::Display for ForkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForkKey::Pending => f.write_str("pending"),
            ForkKey::Hash(h) => write!(f, "{}", h),
        }
    }
}

impl fmt::Debug for ForkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForkKey::Pending => f.write_str("ForkKey::Pending"),
            ForkKey::Hash(h) => write!(f, "ForkKey::Hash({:?})", h),
        }
    }
}

impl From<ForkHash> for ForkKey {
    fn from(h: ForkHash) -> Self {
        ForkKey::Hash(h)
    }
}

impl ForkKey {
    pub fn hash(&self) -> Option<&ForkHash> {
        match self {
            ForkKey::Pending => None,
            ForkKey::Hash(h) => Some(h),
        }
    }
}

/// The kind of an `Operation`, per §3 of the data model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Put,
    Del,
    WriteMarker,
}

/// One entry in a fork's operation buffer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub path: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub index: u64,
    pub block_num: BlockNumber,
    pub timestamp: u64,
    pub fork_hash: ForkKey,
}

impl Operation {
    pub fn is_write_marker(&self) -> bool {
        matches!(self.kind, OperationKind::WriteMarker)
    }
}

/// The `(blockNum, timestamp)` pair the Data Transformer needs alongside a
/// single put/del to do its work.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockInfo {
    pub block_num: BlockNumber,
    pub timestamp: u64,
}

/// An attested `(blockNum, hash, prevHash)` triple, per §3.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_num: BlockNumber,
    pub hash: ForkHash,
    pub prev_hash: ForkHash,
    pub timestamp: u64,
}
