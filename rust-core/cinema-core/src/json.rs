//! # Request Body Parsing
//!
//! Catalog request bodies are decoded with simd-json. Responses are written
//! with serde_json in [`crate::server::ApiResponse`].

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the bytes are copied into a scratch buffer
/// first. An empty body is treated as an empty object, so a create with no
/// body reports each required field.
///
/// # Errors
///
/// Returns `Error::MalformedBody` if parsing fails
pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut scratch = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}".to_vec()
    } else {
        bytes.to_vec()
    };

    simd_json::from_slice(&mut scratch).map_err(|e| Error::MalformedBody {
        reason: e.to_string(),
    })
}
