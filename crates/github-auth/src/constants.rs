//! GitHub OAuth endpoints and fixed flow parameters

/// Browser-facing authorization endpoint (login redirect target)
pub const AUTHORIZE_ENDPOINT: &str = "https://github.com/login/oauth/authorize";

/// Token endpoint for the authorization-code exchange
pub const TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";

/// REST API base for identity and membership lookups
pub const API_BASE: &str = "https://api.github.com";

/// Scopes requested on login. The CMS needs repository write access and
/// the user's identity.
pub const SCOPES: &str = "repo,user";

/// GitHub rejects API requests without a User-Agent header.
pub const USER_AGENT: &str = "cms-auth-gateway";

/// Provider name embedded in the notifier message protocol
pub const PROVIDER: &str = "github";
