//! Property tests for the enriched-state codec.

use proptest::prelude::*;

use mcp_oauth_bridge::oauth::state;

proptest! {
    /// Encoding and decoding recovers the client id, redirect URI, and
    /// original state exactly, for arbitrary inputs including delimiter
    /// characters and unicode.
    #[test]
    fn roundtrip_recovers_inputs(
        client_id in "client_[0-9]{1,13}_[a-z0-9]{1,16}",
        redirect_uri in "https?://[a-z0-9.]{1,20}(:[0-9]{1,5})?/[a-zA-Z0-9/._-]{0,30}",
        original_state in ".{0,64}",
    ) {
        let encoded = state::encode(&client_id, &redirect_uri, Some(&original_state));
        let decoded = state::decode(&encoded).expect("decode should succeed");

        prop_assert_eq!(decoded.client_id, client_id);
        prop_assert_eq!(decoded.redirect_uri.as_deref(), Some(redirect_uri.as_str()));
        prop_assert_eq!(decoded.original_state, original_state);
    }

    /// Absent state decodes to the empty string, matching the wire format
    /// where `original_state=` is always present.
    #[test]
    fn absent_state_is_empty(
        client_id in "client_[0-9]{1,13}_[a-z0-9]{1,16}",
        redirect_uri in "https?://[a-z0-9.]{1,20}/cb",
    ) {
        let decoded = state::decode(&state::encode(&client_id, &redirect_uri, None)).unwrap();
        prop_assert_eq!(decoded.original_state, "");
    }

    /// Percent-encoding survives its own decoder for arbitrary strings.
    #[test]
    fn url_encode_decode_roundtrip(input in ".{0,128}") {
        let encoded = state::url_encode(&input);
        let decoded = state::url_decode(&encoded);
        prop_assert_eq!(decoded.as_deref(), Some(input.as_str()));
    }
}
