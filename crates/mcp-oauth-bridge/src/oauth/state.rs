//! Enriched `state` codec bridging the two OAuth legs.
//!
//! The broker round-trips the MCP client's identity through the upstream
//! provider by packing it into the outer leg's `state` parameter:
//!
//! ```text
//! mcp_client_id=<id>&mcp_redirect_uri=<pct-encoded>&original_state=<pct-encoded or empty>
//! ```
//!
//! `original_state` is always present, empty when the MCP client supplied
//! no state of its own. Decoding tolerates extra unknown parameters.

/// Decoded enriched state recovered on `/callback`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackState {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    /// Empty string when the MCP client supplied no state.
    pub original_state: String,
}

/// Encode the inner leg's identity into the outer leg's `state` parameter.
#[must_use]
pub fn encode(client_id: &str, redirect_uri: &str, original_state: Option<&str>) -> String {
    format!(
        "mcp_client_id={}&mcp_redirect_uri={}&original_state={}",
        client_id,
        url_encode(redirect_uri),
        url_encode(original_state.unwrap_or_default()),
    )
}

/// Decode an enriched state string.
///
/// Returns `None` when `mcp_client_id` is unrecoverable; everything else is
/// best-effort so a callback with a slightly mangled state still resolves.
#[must_use]
pub fn decode(state: &str) -> Option<CallbackState> {
    let mut client_id = None;
    let mut redirect_uri = None;
    let mut original_state = String::new();

    for pair in state.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "mcp_client_id" => client_id = Some(value.to_owned()),
            "mcp_redirect_uri" => redirect_uri = url_decode(value),
            "original_state" => original_state = url_decode(value).unwrap_or_default(),
            _ => {}
        }
    }

    Some(CallbackState { client_id: client_id?, redirect_uri, original_state })
}

/// Percent-encode a string for use in URL query parameters.
#[must_use]
pub fn url_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    encoded
}

/// Percent-decode a query parameter value. Returns `None` on malformed
/// escapes or invalid UTF-8.
#[must_use]
pub fn url_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b => {
                decoded.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(decoded).ok()
}
