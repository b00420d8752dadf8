//! Global logging for the report pipeline
//!
//! The library never installs a logger itself. A host calls
//! [`init_global_logging`] once; until then every macro is a no-op.

pub mod codes;
pub mod events;
pub mod macros;
pub mod service;

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

pub use codes::Code;
pub use events::{LogEvent, LogLevel};
pub use service::{
    ConsoleLogger, Logger, LoggingService, MemoryLogger, SilentLogger, StructuredLogger,
};

use crate::config::runtime::LoggingPreferences;

// ============================================================================
// GLOBAL STATE
// ============================================================================

static GLOBAL_LOGGER: OnceLock<Arc<LoggingService>> = OnceLock::new();

thread_local! {
    static SCOPED_LOGGER: RefCell<Option<Arc<LoggingService>>> = const { RefCell::new(None) };
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Install the global logger from logging preferences
pub fn init_global_logging(preferences: LoggingPreferences) -> Result<(), String> {
    let service = Arc::new(LoggingService::with_preferences(&preferences));

    GLOBAL_LOGGER
        .set(service.clone())
        .map_err(|_| "Global logger already initialized".to_string())?;

    service.log_success(codes::success::LOGGING_INITIALIZED, "Logging initialized");
    Ok(())
}

/// Run `f` with this thread's events routed to `service` instead of the
/// global logger. Scopes nest; the previous one is restored on exit.
pub fn with_scoped_logger<R>(service: Arc<LoggingService>, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Arc<LoggingService>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            SCOPED_LOGGER.with(|slot| *slot.borrow_mut() = previous);
        }
    }

    let _restore = Restore(SCOPED_LOGGER.with(|slot| slot.replace(Some(service))));
    f()
}

/// The scoped logger of this thread, else the global one
pub fn current_logger() -> Option<Arc<LoggingService>> {
    SCOPED_LOGGER
        .with(|slot| slot.borrow().clone())
        .or_else(|| GLOBAL_LOGGER.get().cloned())
}

// ============================================================================
// MACRO SUPPORT FUNCTIONS
// ============================================================================

fn emit(mut event: LogEvent, context: Vec<(&str, &str)>) {
    if let Some(logger) = current_logger() {
        if !logger.should_log(event.level) {
            return;
        }
        for (key, value) in context {
            event = event.with_context(key, value);
        }
        logger.log_event(event);
    }
}

pub fn log_error_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::error(code, message), context);
}

pub fn log_warning_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::warning(code, message), context);
}

pub fn log_success_with_context(code: Code, message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::success(code, message), context);
}

pub fn log_info_with_context(message: &str, context: Vec<(&str, &str)>) {
    emit(LogEvent::info(message), context);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::service::create_test_service;

    #[test]
    fn test_helpers_do_not_panic_uninitialized() {
        log_error_with_context(codes::system::INTERNAL_ERROR, "test", vec![("k", "v")]);
        log_info_with_context("test", vec![]);
    }

    #[test]
    fn test_scoped_logger_captures_and_restores() {
        let (outer, outer_memory) = create_test_service();
        let (inner, inner_memory) = create_test_service();

        with_scoped_logger(Arc::new(outer), || {
            log_warning_with_context(codes::source::FILE_TOO_LARGE, "outer", vec![]);
            with_scoped_logger(Arc::new(inner), || {
                log_error_with_context(codes::render::FALLBACK_USED, "inner", vec![("k", "v")]);
            });
            log_info_with_context("outer again", vec![]);
        });

        assert_eq!(outer_memory.event_count(), 2);
        assert!(outer_memory.has_warning_with_code(codes::source::FILE_TOO_LARGE));
        assert!(inner_memory.has_error_with_code(codes::render::FALLBACK_USED));
        assert_eq!(inner_memory.get_events()[0].context["k"], "v");
        assert!(SCOPED_LOGGER.with(|slot| slot.borrow().is_none()));
    }
}
