//! Result notifier pages
//!
//! The login flow runs in a popup; the CMS admin page that opened it is a
//! separate window. The callback response is therefore not consumed
//! programmatically — it is an HTML page whose script relays the outcome
//! to `window.opener` via postMessage and (on success) closes the popup.
//!
//! Message protocol, in order:
//! 1. `authorizing:<provider>` — handshake so the opener starts listening
//! 2. after ~100ms, `authorization:<provider>:success:<json>` with
//!    `{token, provider}`, then the popup closes
//!
//! On error a single `authorization:<provider>:error:<json>` is posted and
//! the window stays open so the user can read the failure.
//!
//! Tokens and error messages are attacker-influenced text. Every value is
//! embedded as a JSON-escaped JS string literal, with `</` additionally
//! escaped so a value containing `</script>` cannot terminate the script
//! element.

use serde_json::json;

/// Delay between the handshake and the success message. Gives the opener's
/// message listener time to attach after the handshake arrives.
const SUCCESS_DELAY_MS: u32 = 100;

/// Encode a value as a JS string literal safe to splice into a script.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}

fn page(script_body: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Authorizing...</title></head>
<body>
<script>
(function() {{
  if (!window.opener) {{ return; }}
{script_body}
}})();
</script>
</body>
</html>
"#
    )
}

/// Page posting the authorizing handshake, then the success message with
/// the token, then closing the popup.
pub fn success_page(provider: &str, token: &str) -> String {
    let payload = json!({ "token": token, "provider": provider }).to_string();
    let handshake = js_string(&format!("authorizing:{provider}"));
    let message = js_string(&format!("authorization:{provider}:success:{payload}"));
    page(&format!(
        r#"  window.opener.postMessage({handshake}, "*");
  setTimeout(function() {{
    window.opener.postMessage({message}, "*");
    window.close();
  }}, {SUCCESS_DELAY_MS});"#
    ))
}

/// Page posting a single error message. Does not close the popup.
pub fn error_page(provider: &str, message: &str) -> String {
    let payload = json!({ "error": message, "provider": provider }).to_string();
    let message = js_string(&format!("authorization:{provider}:error:{payload}"));
    page(&format!(r#"  window.opener.postMessage({message}, "*");"#))
}
