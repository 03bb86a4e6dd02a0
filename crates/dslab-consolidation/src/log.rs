//! Logging facilities.
//!
//! Every record is rendered as `[<time> <LEVEL> <component>] <message>`, where time and component name are taken from
//! the context passed as the first macro argument (anything exposing `time()` and `name()`, usually a
//! [`SimulationContext`](crate::SimulationContext)).

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_record {
    ($level:ident, $label:expr, $color:ident, $ctx:expr, $format:expr $(, $arg:expr)*) => (
        log::log!(
            target: $ctx.name(),
            log::Level::$level,
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(), $crate::log::get_colored($label, $crate::colored::Color::$color), $ctx.name() $(, $arg)*
        )
    );
}

/// Logs a message at the info level.
///
/// ```ignore
/// log_info!(self.ctx, "migration plan contains {} entries", plan.len());
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $msg:expr) => ($crate::__log_record!(Info, "INFO ", Green, $ctx, "{}", $msg));
    ($ctx:expr, $format:expr, $($arg:tt)+) => ($crate::__log_record!(Info, "INFO ", Green, $ctx, $format, $($arg)+));
}

/// Logs a message at the debug level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $msg:expr) => ($crate::__log_record!(Debug, "DEBUG", Blue, $ctx, "{}", $msg));
    ($ctx:expr, $format:expr, $($arg:tt)+) => ($crate::__log_record!(Debug, "DEBUG", Blue, $ctx, $format, $($arg)+));
}

/// Logs a message at the trace level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $msg:expr) => ($crate::__log_record!(Trace, "TRACE", Cyan, $ctx, "{}", $msg));
    ($ctx:expr, $format:expr, $($arg:tt)+) => ($crate::__log_record!(Trace, "TRACE", Cyan, $ctx, $format, $($arg)+));
}

/// Logs a message at the warn level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $msg:expr) => ($crate::__log_record!(Warn, "WARN ", Yellow, $ctx, "{}", $msg));
    ($ctx:expr, $format:expr, $($arg:tt)+) => ($crate::__log_record!(Warn, "WARN ", Yellow, $ctx, $format, $($arg)+));
}

/// Logs a message at the error level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $msg:expr) => ($crate::__log_record!(Error, "ERROR", Red, $ctx, "{}", $msg));
    ($ctx:expr, $format:expr, $($arg:tt)+) => ($crate::__log_record!(Error, "ERROR", Red, $ctx, $format, $($arg)+));
}
