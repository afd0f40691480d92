//! Ingest pipeline core: Protocol Adapter, Fork Tracker, Checkpoint
//! Validator, Recovery Subsystem, and the Ingest Coordinator that wires
//! them together (§4.8).

mod checkpoint;
mod coordinator;
mod error;
mod fork;
mod protocol;
mod recovery;

pub use checkpoint::validate_boundary;
pub use coordinator::IngestCoordinator;
pub use error::IngestError;
pub use fork::{CloseOutcome, Fork, ForkSnapshot, ForkState, ForkTracker};
pub use protocol::{parse_inbound, BatchOperation, InboundMessage, OutboundMessage, RequestedRange};
pub use recovery::{CanonicalSelector, ForkCandidate, MajorityThenLowestHash, RecoverySubsystem};
