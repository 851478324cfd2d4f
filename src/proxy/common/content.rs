// Response filter
// Untrusted targets may only ever relay image payloads.

use axum::http::{header, HeaderMap};

use crate::error::GatewayError;
use crate::proxy::common::target::TrustTier;

const IMAGE_PREFIX: &str = "image/";

/// Media types compare case-insensitively
pub fn is_image(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with(IMAGE_PREFIX))
        .unwrap_or(false)
}

/// Post-fetch gate. Trusted responses pass regardless of content type.
pub fn check_response(tier: TrustTier, headers: &HeaderMap) -> Result<(), GatewayError> {
    if tier == TrustTier::Trusted {
        return Ok(());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    if is_image(content_type) {
        Ok(())
    } else {
        Err(GatewayError::NotAnImage)
    }
}
