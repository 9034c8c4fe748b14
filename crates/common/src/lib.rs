//! Common types for the CMS auth gateway

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
