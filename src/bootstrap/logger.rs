//! Injected logging capability for the bootstrapper
//!
//! The bootstrapper does not reach for a global logger. Callers pass an
//! `Option<&dyn BootstrapLogger>`; `None` silences output and a logger that
//! returns an error or unwinds is ignored, so logging never changes control
//! flow.

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use tracing::Level;

use super::Phase;

/// Sink for bootstrap log records
///
/// Implementations should report failures through the returned `Result` and
/// must not panic. An unwinding panic is caught and dropped like an `Err`,
/// but under `panic = "abort"` it still takes the process down.
pub trait BootstrapLogger {
    fn log(&self, level: Level, phase: Phase, message: &str) -> Result<()>;
}

/// Forwards bootstrap records to `tracing` under the `dbready::bootstrap` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl BootstrapLogger for TracingLogger {
    fn log(&self, level: Level, phase: Phase, message: &str) -> Result<()> {
        let phase = phase.to_string();
        match level {
            Level::ERROR => {
                tracing::error!(target: "dbready::bootstrap", phase = %phase, "{}", message)
            }
            Level::WARN => {
                tracing::warn!(target: "dbready::bootstrap", phase = %phase, "{}", message)
            }
            Level::INFO => {
                tracing::info!(target: "dbready::bootstrap", phase = %phase, "{}", message)
            }
            Level::DEBUG => {
                tracing::debug!(target: "dbready::bootstrap", phase = %phase, "{}", message)
            }
            _ => {
                tracing::trace!(target: "dbready::bootstrap", phase = %phase, "{}", message)
            }
        }
        Ok(())
    }
}

/// Best-effort emission: a missing, failing or panicking logger is skipped
pub(crate) fn emit(logger: Option<&dyn BootstrapLogger>, level: Level, phase: Phase, message: &str) {
    if let Some(logger) = logger {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| logger.log(level, phase, message)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;

    struct Recording(RefCell<Vec<(Level, Phase, String)>>);

    impl BootstrapLogger for Recording {
        fn log(&self, level: Level, phase: Phase, message: &str) -> Result<()> {
            self.0.borrow_mut().push((level, phase, message.to_string()));
            Ok(())
        }
    }

    struct Broken;

    impl BootstrapLogger for Broken {
        fn log(&self, _: Level, _: Phase, _: &str) -> Result<()> {
            Err(anyhow!("log sink closed"))
        }
    }

    #[test]
    fn test_emit_records() {
        let logger = Recording(RefCell::new(Vec::new()));
        emit(Some(&logger), Level::INFO, Phase::Connect, "store reachable: true");

        let records = logger.0.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, Level::INFO);
        assert_eq!(records[0].1, Phase::Connect);
        assert_eq!(records[0].2, "store reachable: true");
    }

    #[test]
    fn test_emit_without_logger() {
        emit(None, Level::ERROR, Phase::ApplyPending, "ignored");
    }

    #[test]
    fn test_emit_swallows_logger_errors() {
        emit(Some(&Broken), Level::INFO, Phase::Connect, "ignored");
    }

    struct Panicking;

    impl BootstrapLogger for Panicking {
        fn log(&self, _: Level, _: Phase, _: &str) -> Result<()> {
            panic!("log sink poisoned")
        }
    }

    #[test]
    fn test_emit_contains_logger_panics() {
        emit(Some(&Panicking), Level::ERROR, Phase::ApplyPending, "ignored");
    }

    #[test]
    fn test_tracing_logger_never_fails() {
        let logger = TracingLogger;
        assert!(logger.log(Level::INFO, Phase::OpenScope, "hello").is_ok());
        assert!(logger.log(Level::ERROR, Phase::ApplyPending, "boom").is_ok());
    }
}
