//! Conditional logging macros that check a module-level `ENABLE_LOGS` flag,
//! plus helpers that keep bearer tokens out of log lines.
//!
//! Usage:
//! ```rust,ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! ```

/// Macro for conditional debug logging.
/// Poll loops use this for dropped ticks so a flaky link does not flood the log.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Macro for conditional info logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Macro for conditional warn logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Macro for conditional error logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Masks the value of a `token=` query parameter so stream URLs can be logged.
pub fn redact_token(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let Some(start) = lower.find("token=") else {
        return input.to_string();
    };

    let value_start = start + "token=".len();
    let value_end = input[value_start..]
        .find('&')
        .map(|offset| value_start + offset)
        .unwrap_or(input.len());

    format!(
        "{}<redacted>{}",
        &input[..value_start],
        &input[value_end..]
    )
}
