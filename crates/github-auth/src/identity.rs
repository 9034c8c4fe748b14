//! Identity and org-membership lookups
//!
//! Two chained calls: resolve the bearer token to a username via `/user`,
//! then check `/orgs/{org}/members/{username}`. The membership endpoint is
//! keyed by username rather than token, which is why the identity lookup
//! cannot be skipped; both calls carry the same bearer token.
//!
//! The membership endpoint signals membership purely through its status
//! code (204 No Content). Callers must use a reqwest client with redirects
//! disabled: a 301/302 from the endpoint means not-a-member and must not
//! be followed to some other resource.

use serde::Deserialize;
use tracing::debug;

use crate::constants::USER_AGENT;

/// `/user` response. Only `login` matters to the gateway.
#[derive(Debug, Deserialize)]
struct UserResponse {
    login: Option<String>,
}

/// Resolve a bearer token to the account's login name.
///
/// Returns `None` when the call fails, the response is not parseable, or
/// the `login` field is absent. Failures here are expected for revoked or
/// garbage tokens and are logged at debug only.
pub async fn fetch_login(client: &reqwest::Client, api_base: &str, token: &str) -> Option<String> {
    let response = match client
        .get(format!("{api_base}/user"))
        .bearer_auth(token)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "identity lookup failed");
            return None;
        }
    };

    if !response.status().is_success() {
        debug!(status = %response.status(), "identity endpoint returned non-success");
        return None;
    }

    match response.json::<UserResponse>().await {
        Ok(user) => user.login,
        Err(e) => {
            debug!(error = %e, "identity response did not parse");
            None
        }
    }
}

/// Check whether the token's account belongs to `org`.
///
/// Short-circuits to false when the identity lookup yields no login; no
/// membership call is made in that case. Membership is true only on a
/// 204 from the membership endpoint — every other outcome, including
/// redirects, 404, and transport errors, is not-a-member.
pub async fn is_org_member(
    client: &reqwest::Client,
    api_base: &str,
    token: &str,
    org: &str,
) -> bool {
    let Some(login) = fetch_login(client, api_base, token).await else {
        return false;
    };

    let response = match client
        .get(format!("{api_base}/orgs/{org}/members/{login}"))
        .bearer_auth(token)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, org, login, "membership check failed");
            return false;
        }
    };

    let member = response.status() == reqwest::StatusCode::NO_CONTENT;
    debug!(org, login, member, status = %response.status(), "membership check");
    member
}
