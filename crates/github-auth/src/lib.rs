//! GitHub OAuth client library
//!
//! Provides the provider-specific pieces of the gateway's login flow:
//! authorization URL construction, authorization-code exchange, and the
//! two-step org-membership check. This crate is a standalone library with
//! no dependency on the gateway binary — it can be tested and used
//! independently.
//!
//! Login flow:
//! 1. Gateway calls `login::generate_state()` + `login::build_authorize_url()`
//!    and redirects the popup to GitHub
//! 2. GitHub redirects back with an authorization code
//! 3. Gateway calls `token::exchange_code()` to obtain the access token
//! 4. Upload requests present that token; the gateway calls
//!    `identity::is_org_member()` before relaying anything downstream

pub mod constants;
pub mod error;
pub mod identity;
pub mod login;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use identity::{fetch_login, is_org_member};
pub use login::{build_authorize_url, generate_state};
pub use token::exchange_code;
