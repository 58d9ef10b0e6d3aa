//! Leveled stderr logging for fica
//!
//! Every line is written with one locked `write` so lines from concurrent
//! workers never interleave. Each leveled line carries the time since
//! logging started and the name of the emitting thread:
//!
//! ```text
//! [INFO]  +0.004s fica-worker-2: bound to core 2
//! ```
//!
//! # Environment Variables
//!
//! - `FICA_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0..5)
//! - `FICA_LOG_FLUSH=1` - flush stderr after each line
//!
//! # Usage
//!
//! ```ignore
//! use fica_core::{finfo, fwarn};
//!
//! finfo!("worker {} started", id);
//! fwarn!("core {} busy, retrying", core);
//! ```

use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// Log levels, most severe first
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

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "1" => Ok(LogLevel::Error),
            "warn" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static STARTED: OnceLock<Instant> = OnceLock::new();

/// Initialize from the environment. Runs once; later calls are no-ops.
///
/// Called implicitly by the first log line.
pub fn init() {
    let mut first = false;
    STARTED.get_or_init(|| {
        first = true;
        Instant::now()
    });
    if !first {
        return;
    }
    if let Ok(val) = std::env::var("FICA_LOG_LEVEL") {
        let level = val.parse().unwrap_or(LogLevel::Info);
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
    if let Ok(val) = std::env::var("FICA_LOG_FLUSH") {
        let flush = matches!(val.as_str(), "1" | "true" | "yes" | "on");
        FLUSH_ENABLED.store(flush, Ordering::Relaxed);
    }
}

#[inline]
fn started() -> Instant {
    if STARTED.get().is_none() {
        init();
    }
    *STARTED.get_or_init(Instant::now)
}

/// Get current log level
#[inline]
pub fn log_level() -> LogLevel {
    if STARTED.get().is_none() {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically (overrides the environment)
pub fn set_log_level(level: LogLevel) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Set flush mode programmatically
pub fn set_flush_enabled(enabled: bool) {
    init();
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Check if a log level is enabled
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Internal: unleveled line
#[doc(hidden)]
pub fn _println_impl(args: std::fmt::Arguments<'_>) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

/// Internal: leveled line with timestamp and thread tag
#[doc(hidden)]
pub fn _log_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let secs = started().elapsed().as_secs_f64();
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("-");

    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} +{:.3}s {}: ", level.prefix(), secs, name);
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if FLUSH_ENABLED.load(Ordering::Relaxed) {
        let _ = handle.flush();
    }
}

// ============================================================================
// Public Macros
// ============================================================================

/// Plain line to stderr, no prefix, never filtered
#[macro_export]
macro_rules! fprintln {
    () => {{
        $crate::log::_println_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::log::_println_impl(format_args!($($arg)*));
    }};
}

/// Error level log
#[macro_export]
macro_rules! ferror {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Error, format_args!($($arg)*));
    }};
}

/// Warning level log
#[macro_export]
macro_rules! fwarn {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Warn, format_args!($($arg)*));
    }};
}

/// Info level log
#[macro_export]
macro_rules! finfo {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Info, format_args!($($arg)*));
    }};
}

/// Debug level log
#[macro_export]
macro_rules! fdebug {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Debug, format_args!($($arg)*));
    }};
}

/// Trace level log (per-iteration detail)
#[macro_export]
macro_rules! ftrace {
    ($($arg:tt)*) => {{
        $crate::log::_log_impl($crate::log::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_ordered() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("warn".parse(), Ok(LogLevel::Warn));
        assert_eq!(" DEBUG ".parse(), Ok(LogLevel::Debug));
        assert_eq!("5".parse(), Ok(LogLevel::Trace));
        assert_eq!("loud".parse::<LogLevel>(), Err(()));
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_off_filters_everything() {
        // Off is never "enabled", even when it is the current level
        set_log_level(LogLevel::Off);
        assert!(!level_enabled(LogLevel::Off));
        assert!(!level_enabled(LogLevel::Error));
    }

    #[test]
    fn test_macros_compile() {
        set_log_level(LogLevel::Off);

        fprintln!();
        fprintln!("plain {}", 1);
        ferror!("error {}", "msg");
        fwarn!("warn");
        finfo!("info");
        fdebug!("debug");
        ftrace!("trace");
    }
}
