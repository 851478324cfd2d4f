// proxy module - secured edge gateway (resource proxy + token exchange)

pub mod config;
pub mod policy;
pub mod server;
pub mod token_exchange;

pub mod common; // CORS, target validation, content gate
pub mod handlers; // API endpoint handlers
pub mod mappers; // Client response construction
pub mod middleware; // Axum middleware
pub mod upstream; // Outbound transport

pub use config::{ProxyConfig, SecurityConfig};
pub use server::{AppState, AxumServer};
