//! Base64 encode/decode helper for the `X-Payment` / `X-Payment-Response` headers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Errors produced while decoding a base64-wrapped JSON header value.
#[derive(Debug, Error)]
pub enum HeaderCodecError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a serializable value as `base64(json(value))`.
pub fn encode<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(json))
}

/// Decodes a `base64(json(value))` header value back into `T`.
pub fn decode<T: serde::de::DeserializeOwned>(header_value: &str) -> Result<T, HeaderCodecError> {
    let bytes = STANDARD.decode(header_value)?;
    let text = String::from_utf8(bytes)?;
    let value = serde_json::from_str(&text)?;
    Ok(value)
}
