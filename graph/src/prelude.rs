//! Common imports shared across the workspace, mirroring the teacher's
//! `graph::prelude` grab-bag so every crate can `use honeygraph::prelude::*`
//! instead of repeating the same handful of re-exports.

pub use anyhow::{anyhow, Context as _, Error};
pub use async_trait::async_trait;
pub use slog::{crit, debug, error, info, o, trace, warn, Logger};
pub use std::sync::Arc;
pub use std::time::Duration;

pub use crate::env::ENV_VARS;
pub use crate::error::{CoreError, ErrorKind};
pub use crate::log::LoggerFactory;
pub use crate::types::{
    BlockInfo, BlockNumber, Checkpoint, ForkHash, ForkKey, NetworkPrefix, Operation,
    OperationKind,
};

pub type Result<T> = std::result::Result<T, Error>;
