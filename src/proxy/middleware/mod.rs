// Middleware module - Axum middleware

pub mod logging;
pub mod recover;

pub use logging::request_log_middleware;
pub use recover::panic_recovery_middleware;
