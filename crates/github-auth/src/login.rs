//! Login redirect construction
//!
//! Builds the authorization URL the popup is redirected to, including a
//! fresh random `state` value per request. The provider echoes `state`
//! back on the callback; the gateway generates it but does not validate
//! it on return (see DESIGN.md — the original guarantee is ambiguous, so
//! the behavior is documented rather than changed).

use rand::RngExt;

/// Generate a random 16-hex-character state token.
///
/// 8 random bytes, hex-encoded. Fresh per login request.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build the full authorization URL with all required OAuth parameters.
///
/// `redirect_uri` is derived by the caller from the inbound Host header
/// (`https://<host>/callback`) so the provider sends the browser back to
/// the same deployment that initiated the flow.
pub fn build_authorize_url(
    authorize_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &str,
    state: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}",
        authorize_endpoint,
        client_id,
        urlencoded(redirect_uri),
        urlencoded(scopes),
        state,
    )
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(':', "%3A").replace('/', "%2F").replace(',', "%2C")
}
