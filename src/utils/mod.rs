pub mod logging;

pub use logging::redact_token;
