//! Protocol Adapter (§6): parses inbound WebSocket JSON frames into typed
//! messages and formats outbound replies. The only place the wire's
//! dynamic-JSON shape is allowed to leak into the codebase (§9).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use honeygraph::types::{BlockNumber, ForkHash, OperationKind};

use crate::error::IngestError;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundMessage {
    Identify {
        #[serde(rename = "nodeId")]
        node_id: String,
        network: String,
        #[serde(default)]
        version: Option<String>,
    },
    SyncStatus {
        #[serde(rename = "blockNum")]
        block_num: BlockNumber,
        head: bool,
    },
    Operation {
        index: u64,
        #[serde(rename = "blockNum")]
        block_num: BlockNumber,
        #[serde(rename = "type")]
        kind: OperationKind,
        path: Vec<String>,
        #[serde(default)]
        data: Value,
        #[serde(rename = "forkHash", default)]
        fork_hash: Option<String>,
    },
    WriteMarker {
        index: u64,
        #[serde(rename = "blockNum")]
        block_num: BlockNumber,
        #[serde(rename = "prevCheckpointHash")]
        prev_checkpoint_hash: String,
        #[serde(rename = "forkHash", default)]
        fork_hash: Option<String>,
    },
    #[serde(rename = "sendCheckpoint")]
    SendCheckpoint {
        #[serde(rename = "blockNum")]
        block_num: BlockNumber,
        hash: String,
        #[serde(rename = "prevHash")]
        prev_hash: String,
        timestamp: u64,
    },
    Batch {
        operations: Vec<BatchOperation>,
        #[serde(rename = "requestedRange", default)]
        requested_range: Option<RequestedRange>,
    },
}

#[derive(Debug, Deserialize)]
pub struct BatchOperation {
    pub index: u64,
    #[serde(rename = "blockNum")]
    pub block_num: BlockNumber,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub path: Vec<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct RequestedRange {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Connected {
        #[serde(rename = "nodeId")]
        node_id: String,
        server: String,
        timestamp: u64,
    },
    Ack {
        index: u64,
        success: bool,
    },
    Error {
        error: String,
    },
    RequestMissing {
        from: BlockNumber,
        to: BlockNumber,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("OutboundMessage always serializes")
    }
}

/// Parses one inbound text frame. A malformed frame is `InvalidMessage`
/// per §7 — the caller replies with `error` and keeps the connection open.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, IngestError> {
    serde_json::from_str(text).map_err(|e| IngestError::InvalidMessage(e.to_string()))
}

pub fn fork_hash_or_pending(raw: Option<String>) -> Option<ForkHash> {
    raw.map(ForkHash::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_operation_message() {
        let text = r#"{"kind":"operation","index":1,"blockNum":100,"type":"put","path":["balances","alice"],"data":1000}"#;
        let msg = parse_inbound(text).unwrap();
        match msg {
            InboundMessage::Operation { index, block_num, kind, path, .. } => {
                assert_eq!(index, 1);
                assert_eq!(block_num, 100);
                assert_eq!(kind, OperationKind::Put);
                assert_eq!(path, vec!["balances".to_owned(), "alice".to_owned()]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_a_send_checkpoint_message() {
        let text = r#"{"kind":"sendCheckpoint","blockNum":101,"hash":"H1","prevHash":"H0","timestamp":0}"#;
        assert!(matches!(
            parse_inbound(text).unwrap(),
            InboundMessage::SendCheckpoint { block_num: 101, .. }
        ));
    }

    #[test]
    fn malformed_json_is_invalid_message() {
        assert!(parse_inbound("not json").is_err());
    }

    #[test]
    fn outbound_ack_serializes_with_tag() {
        let msg = OutboundMessage::Ack { index: 1, success: true };
        assert_eq!(msg.to_json(), r#"{"kind":"ack","index":1,"success":true}"#);
    }
}
