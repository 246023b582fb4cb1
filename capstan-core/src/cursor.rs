use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Keyset cursor for the job listing. The encoding is opaque to clients but
/// stable across requests and servers: base64-url of the UTF-8 JSON
/// `{"sortAt": <int>, "id": <string>}`. Cursors are hints, not capabilities;
/// a forged cursor only shifts the caller's own pagination window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub sort_at: i64,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).expect("cursor serialization cannot fail");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Lenient decode: anything that is not a valid cursor is treated as no
    /// cursor at all.
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw.as_bytes()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
