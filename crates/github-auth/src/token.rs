//! Authorization-code exchange
//!
//! POSTs the code with the client credentials to the token endpoint and
//! extracts the access token. GitHub returns HTTP 200 even for flow
//! errors, signalling failure through an `error` field in the body, so
//! the response shape is validated explicitly rather than trusting the
//! status code.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Token endpoint response with every field optional.
///
/// GitHub sends either `access_token` or `error`/`error_description`,
/// never both. Modelling them as options lets us distinguish a provider
/// error from a well-formed response that merely lacks the token.
#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange an authorization code for an access token.
///
/// The code is single-use per provider contract: a second exchange of the
/// same code fails with a provider error. The gateway's code cache exists
/// to avoid ever making that second call for a code it already exchanged.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    code: &str,
) -> Result<String> {
    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
        ])
        .send()
        .await
        .map_err(|e| Error::Transport(format!("token exchange request failed: {e}")))?;

    let body = response
        .text()
        .await
        .map_err(|e| Error::Transport(format!("reading token response: {e}")))?;

    let parsed: ExchangeResponse = serde_json::from_str(&body)
        .map_err(|e| Error::Transport(format!("invalid token response: {e}")))?;

    if let Some(error) = parsed.error {
        let message = match parsed.error_description {
            Some(description) if !description.is_empty() => format!("{error}: {description}"),
            _ => error,
        };
        return Err(Error::Provider(message));
    }

    parsed.access_token.ok_or(Error::MissingToken)
}
