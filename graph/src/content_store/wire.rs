//! The wire shape of an operation as returned by a content-store payload.
//! Distinct from `crate::types::Operation` because the payload never
//! carries a `forkHash` (the fetch itself is keyed by hash) and because
//! the wire uses `"put"`/`"del"`/`"write_marker"` tags directly.

use serde::{Deserialize, Serialize};

use crate::types::{BlockNumber, ForkKey, Operation, OperationKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub path: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub index: u64,
    #[serde(rename = "blockNum")]
    pub block_num: BlockNumber,
    #[serde(default)]
    pub timestamp: u64,
}

impl WireOperation {
    pub fn into_operation(self, fork_hash: ForkKey) -> Operation {
        Operation {
            kind: self.kind,
            path: self.path,
            data: self.data,
            index: self.index,
            block_num: self.block_num,
            timestamp: self.timestamp,
            fork_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_put_operation() {
        let json = r#"{"type":"put","path":["balances","alice"],"data":1000,"index":1,"blockNum":100,"timestamp":1}"#;
        let wire: WireOperation = serde_json::from_str(json).unwrap();
        assert_eq!(wire.path, vec!["balances", "alice"]);
        assert_eq!(wire.block_num, 100);
        assert!(matches!(wire.kind, OperationKind::Put));
    }
}
