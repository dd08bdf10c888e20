//! Leveled stderr tracing for the dispatch runtime
//!
//! Thread-safe, context-aware debug output. Every record carries the id of
//! the pool worker emitting it so interleaved traces can be told apart.
//!
//! # Environment Variables
//!
//! - `TASKQ_TRACE=1` - enable verbose tracing (level = trace)
//! - `TASKQ_LOG_LEVEL=<level>` - explicit level: 0=off, 1=error, 2=warn,
//!   3=info, 4=debug, 5=trace; overrides `TASKQ_TRACE`
//! - `TASKQ_FLUSH_EPRINT=1` - flush stderr after each record
//! - `TASKQ_TRACE_TIME=1` - include a nanosecond timestamp
//!
//! # Output Format
//!
//! Without timestamp: `[LEVEL] [w<worker>] message`
//! With timestamp:    `[LEVEL] [<ns>] [w<worker>] message`
//!
//! # Usage
//!
//! ```ignore
//! use taskq_core::{tq_debug, tq_trace, tq_warn};
//!
//! tq_trace!("spawning worker #{}", id);
//! tq_warn!("poll({}) failed: {}", socket, err);
//! ```

use crate::env::env_get_bool;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

/// Log levels (matches common conventions)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

// Global configuration (initialized once)
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static TIME_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

// Start time for relative timestamps
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize tracing from environment variables
///
/// Called automatically on first use, but can be called explicitly for
/// deterministic initialization.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    START_TIME.get_or_init(Instant::now);

    FLUSH_ENABLED.store(env_get_bool("TASKQ_FLUSH_EPRINT", false), Ordering::Relaxed);
    TIME_ENABLED.store(env_get_bool("TASKQ_TRACE_TIME", false), Ordering::Relaxed);

    // TASKQ_TRACE=1 turns everything on, TASKQ_LOG_LEVEL takes precedence
    if env_get_bool("TASKQ_TRACE", false) {
        LOG_LEVEL.store(LogLevel::Trace as u8, Ordering::Relaxed);
    }
    if let Ok(val) = std::env::var("TASKQ_LOG_LEVEL") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Warn,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

/// Check if flush is enabled
#[inline]
pub fn flush_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

/// Check if timestamp is enabled
#[inline]
pub fn time_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    TIME_ENABLED.load(Ordering::Relaxed)
}

/// Get current log level
#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically
pub fn set_log_level(level: LogLevel) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Check if a log level is enabled
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= log_level() as u8
}

/// Whether verbose tracing is active
#[inline]
pub fn is_trace_enabled() -> bool {
    level_enabled(LogLevel::Trace)
}

/// Whether debug aids (e.g. naming worker threads after the draining
/// queue's label) should be active
#[inline]
pub fn is_debug_enabled() -> bool {
    cfg!(debug_assertions) || is_trace_enabled()
}

/// Get elapsed nanoseconds since trace initialization
#[inline]
pub fn elapsed_ns() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

// Thread-local for the pool worker id (set by the runtime)
thread_local! {
    static WORKER_ID: std::cell::Cell<Option<u32>> = const { std::cell::Cell::new(None) };
}

/// Set current worker id for this thread (called by the pool)
pub fn set_worker_id(id: u32) {
    WORKER_ID.with(|w| w.set(Some(id)));
}

/// Clear worker id (called when a worker exits)
pub fn clear_worker_id() {
    WORKER_ID.with(|w| w.set(None));
}

/// Get current worker id
#[inline]
pub fn get_worker_id() -> Option<u32> {
    WORKER_ID.with(|w| w.get())
}

/// Internal: leveled print with context
#[doc(hidden)]
pub fn _tq_log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();

    let _ = write!(handle, "{} ", level.prefix());

    if time_enabled() {
        let _ = write!(handle, "[{}] ", elapsed_ns());
    }

    match get_worker_id() {
        Some(id) => {
            let _ = write!(handle, "[w{}] ", id);
        }
        None => {
            let _ = write!(handle, "[w--] ");
        }
    }

    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");

    if flush_enabled() {
        let _ = handle.flush();
    }
}

/// Error level log with context
#[macro_export]
macro_rules! tq_error {
    ($($arg:tt)*) => {{
        $crate::trace::_tq_log_impl(
            $crate::trace::LogLevel::Error,
            format_args!($($arg)*)
        );
    }};
}

/// Warning level log with context
#[macro_export]
macro_rules! tq_warn {
    ($($arg:tt)*) => {{
        $crate::trace::_tq_log_impl(
            $crate::trace::LogLevel::Warn,
            format_args!($($arg)*)
        );
    }};
}

/// Info level log with context
#[macro_export]
macro_rules! tq_info {
    ($($arg:tt)*) => {{
        $crate::trace::_tq_log_impl(
            $crate::trace::LogLevel::Info,
            format_args!($($arg)*)
        );
    }};
}

/// Debug level log with context
#[macro_export]
macro_rules! tq_debug {
    ($($arg:tt)*) => {{
        $crate::trace::_tq_log_impl(
            $crate::trace::LogLevel::Debug,
            format_args!($($arg)*)
        );
    }};
}

/// Trace level log with context
#[macro_export]
macro_rules! tq_trace {
    ($($arg:tt)*) => {{
        $crate::trace::_tq_log_impl(
            $crate::trace::LogLevel::Trace,
            format_args!($($arg)*)
        );
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_from_u8() {
        assert_eq!(LogLevel::from_u8(0), LogLevel::Off);
        assert_eq!(LogLevel::from_u8(1), LogLevel::Error);
        assert_eq!(LogLevel::from_u8(5), LogLevel::Trace);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_worker_context() {
        assert_eq!(get_worker_id(), None);

        set_worker_id(5);
        assert_eq!(get_worker_id(), Some(5));

        clear_worker_id();
        assert_eq!(get_worker_id(), None);
    }

    #[test]
    fn test_elapsed_ns_monotonic() {
        let t1 = elapsed_ns();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let t2 = elapsed_ns();
        assert!(t2 > t1);
    }

    #[test]
    fn test_macros_compile() {
        // Just verify the macros expand - suppress output during test
        set_log_level(LogLevel::Off);

        tq_error!("error {}", "msg");
        tq_warn!("warn");
        tq_info!("info");
        tq_debug!("debug {}", 42);
        tq_trace!("trace");
    }
}
