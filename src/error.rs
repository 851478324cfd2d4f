use axum::http::StatusCode;
use thiserror::Error;

/// Startup / process-level errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;

/// Classification of a request-pipeline failure. Every class is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed input
    Validation,
    /// Origin / site / content-type violation
    PolicyDenied,
    /// Fetch failure, network error, malformed upstream payload
    Upstream,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::PolicyDenied => StatusCode::FORBIDDEN,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Request-pipeline errors. The display strings are the client-facing reasons,
/// callers branch on them so they must stay stable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Missing url parameter")]
    MissingUrl,

    #[error("Invalid url parameter")]
    InvalidUrl,

    #[error("Forbidden: Only HTTPS URLs allowed")]
    InsecureScheme,

    #[error("Forbidden: Private network targets not allowed")]
    PrivateTarget,

    #[error("Missing secret")]
    MissingSecret,

    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Forbidden: Cross-Site Request")]
    CrossSite,

    #[error("Forbidden: Invalid Origin")]
    InvalidOrigin,

    #[error("Forbidden: Proxy only allows images or trusted API calls")]
    NotAnImage,

    #[error("Proxy fetch failed: {0}")]
    Fetch(String),

    #[error("{0}")]
    TokenExchange(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MissingUrl
            | GatewayError::InvalidUrl
            | GatewayError::InsecureScheme
            | GatewayError::PrivateTarget
            | GatewayError::MissingSecret
            | GatewayError::InvalidBody => ErrorKind::Validation,
            GatewayError::CrossSite | GatewayError::InvalidOrigin | GatewayError::NotAnImage => {
                ErrorKind::PolicyDenied
            }
            GatewayError::Fetch(_) | GatewayError::TokenExchange(_) => ErrorKind::Upstream,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}
