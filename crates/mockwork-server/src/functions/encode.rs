//! `encode`: text to base64 or hex.

use super::FunctionError;
use base64::Engine;

pub(super) fn encode(method: &str, text: &str) -> Result<String, FunctionError> {
    match method {
        "base64" => Ok(base64::engine::general_purpose::STANDARD.encode(text.as_bytes())),
        "hex" => Ok(hex::encode(text.as_bytes())),
        other => Err(FunctionError::Args(format!(
            "encode: unsupported method {other:?}"
        ))),
    }
}
