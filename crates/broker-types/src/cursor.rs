//! Opaque pagination cursor: base64 of `{"offset": N}`.
//!
//! Decoders must tolerate both standard and URL-safe base64 and treat any
//! parse failure as offset zero rather than propagating an error — a client
//! handed a cursor it didn't mint itself should just restart from the top.

use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CursorPayload {
    offset: u64,
}

/// Encodes an offset into an opaque cursor string.
pub fn encode(offset: u64) -> String {
    let payload = CursorPayload { offset };
    let json = serde_json::to_vec(&payload).expect("CursorPayload always serializes");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
}

/// Decodes a cursor string into its offset, defaulting to `0` on any
/// malformed input (wrong padding, non-JSON body, missing field, ...).
pub fn decode(cursor: Option<&str>) -> u64 {
    let Some(cursor) = cursor else {
        return 0;
    };
    decode_bytes(cursor)
        .and_then(|bytes| serde_json::from_slice::<CursorPayload>(&bytes).ok())
        .map(|payload| payload.offset)
        .unwrap_or(0)
}

fn decode_bytes(cursor: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(cursor)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(cursor))
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(cursor))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(cursor))
        .ok()
}
