//! Checkpoint Validator (§4.8, §8): enforces that a fork's buffer ends in
//! a write marker immediately preceding the checkpoint's height, and that
//! no buffered operation has already crossed it.

use honeygraph::types::{BlockNumber, Checkpoint, OperationKind};

use crate::error::IngestError;
use crate::fork::ForkSnapshot;

/// Validates `checkpoint` against `fork`'s buffered operations. Per §8:
/// the last buffered operation must be a write marker whose `blockNum`
/// equals `checkpoint.block_num - 1`, and no operation may have a
/// `blockNum >= checkpoint.block_num`.
pub fn validate_boundary(checkpoint: &Checkpoint, fork: &ForkSnapshot) -> Result<(), IngestError> {
    if fork.confirmation_disabled {
        return Err(IngestError::InvalidBoundary {
            block_num: checkpoint.block_num,
            reason: "fork's write marker was evicted by the buffer cap and not resubmitted".into(),
        });
    }

    let expected_marker_block: BlockNumber = checkpoint.block_num.saturating_sub(1);

    let last = fork.buffer.last().ok_or_else(|| IngestError::InvalidBoundary {
        block_num: checkpoint.block_num,
        reason: "fork buffer is empty".into(),
    })?;

    if last.kind != OperationKind::WriteMarker {
        return Err(IngestError::InvalidBoundary {
            block_num: checkpoint.block_num,
            reason: "last buffered operation is not a write marker".into(),
        });
    }

    if last.block_num != expected_marker_block {
        return Err(IngestError::InvalidBoundary {
            block_num: checkpoint.block_num,
            reason: format!(
                "write marker blockNum {} does not immediately precede checkpoint blockNum {}",
                last.block_num, checkpoint.block_num
            ),
        });
    }

    if let Some(over) = fork.buffer.iter().find(|op| op.block_num >= checkpoint.block_num) {
        return Err(IngestError::InvalidBoundary {
            block_num: checkpoint.block_num,
            reason: format!(
                "operation at index {} already crosses blockNum {}",
                over.index, checkpoint.block_num
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use honeygraph::types::{ForkHash, ForkKey, Operation};

    use crate::fork::ForkState;

    use super::*;

    fn marker(index: u64, block_num: BlockNumber) -> Operation {
        Operation {
            kind: OperationKind::WriteMarker,
            path: vec![],
            data: serde_json::Value::Null,
            index,
            block_num,
            timestamp: 0,
            fork_hash: ForkKey::Pending,
        }
    }

    fn checkpoint(block_num: BlockNumber) -> Checkpoint {
        Checkpoint {
            block_num,
            hash: ForkHash::from("H1"),
            prev_hash: ForkHash::from("H0"),
            timestamp: 0,
        }
    }

    fn snapshot(buffer: Vec<Operation>) -> ForkSnapshot {
        ForkSnapshot {
            state: ForkState::Open,
            buffer,
            confirmation_disabled: false,
            checkpoint: None,
        }
    }

    #[test]
    fn accepts_a_marker_immediately_preceding_the_checkpoint() {
        let fork = snapshot(vec![marker(2, 99)]);
        assert!(validate_boundary(&checkpoint(100), &fork).is_ok());
    }

    #[test]
    fn rejects_operation_past_the_checkpoint_height() {
        let mut buffer = vec![marker(1, 99)];
        buffer.push(Operation {
            kind: OperationKind::Put,
            path: vec!["balances".into(), "alice".into()],
            data: serde_json::json!(1),
            index: 2,
            block_num: 100,
            timestamp: 0,
            fork_hash: ForkKey::Pending,
        });
        let fork = snapshot(buffer);
        assert!(validate_boundary(&checkpoint(100), &fork).is_err());
    }

    #[test]
    fn rejects_when_confirmation_was_disabled_by_marker_eviction() {
        let mut fork = snapshot(vec![marker(1, 99)]);
        fork.confirmation_disabled = true;
        assert!(validate_boundary(&checkpoint(100), &fork).is_err());
    }
}
