//! Logger construction. Every long-lived component takes a `Logger` in its
//! constructor rather than reaching for a process-global instance, the way
//! `FirehoseBlockIngestor::new` takes a `logger: Logger` argument in the
//! teacher. `LoggerFactory` is the one place a component hierarchy is
//! allowed to derive children from a root logger.

use slog::{o, Drain, Logger};

/// Builds per-component child loggers off a single root, so a log line can
/// always be traced back to the network and component that emitted it.
#[derive(Clone)]
pub struct LoggerFactory {
    root: Logger,
}

impl LoggerFactory {
    pub fn new(root: Logger) -> Self {
        LoggerFactory { root }
    }

    pub fn root(&self) -> Logger {
        self.root.clone()
    }

    pub fn component_logger(&self, component: &'static str) -> Logger {
        self.root.new(o!("component" => component))
    }

    pub fn network_logger(&self, component: &'static str, prefix: &str) -> Logger {
        self.root
            .new(o!("component" => component, "network" => prefix.to_owned()))
    }
}

/// A terminal-backed async logger for interactive use, mirroring the
/// teacher's `slog-term` + `slog-async` + `slog-envlogger` stack.
pub fn terminal_logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// A newline-delimited JSON logger for production, where logs are shipped
/// to an external aggregator rather than read by a human in a terminal.
pub fn json_logger() -> Logger {
    let drain = slog_json::Json::new(std::io::stdout())
        .add_default_keys()
        .build()
        .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// A logger that discards everything; used in unit tests that don't want
/// terminal noise.
pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}
