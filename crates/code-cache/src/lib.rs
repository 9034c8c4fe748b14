//! Single-use authorization-code deduplication cache
//!
//! Authorization codes are single-use on the provider side: exchanging a
//! code a second time fails. Browsers and flaky networks can deliver the
//! callback twice, so the gateway remembers each code it has already
//! exchanged, mapped to the token it received, for a short retention
//! window. A duplicate submission within the window gets the cached token
//! instead of a doomed second exchange.
//!
//! The cache is an explicit service object injected into the callback
//! handler; a background task sweeps expired entries for the process
//! lifetime. Process restart clears the cache, which is acceptable because
//! codes expire provider-side within minutes anyway.

mod cache;
mod sweep;

pub use cache::CodeCache;
pub use sweep::spawn_sweep_task;

use std::time::Duration;

/// How long an exchanged code stays in the cache.
pub const RETENTION: Duration = Duration::from_secs(5 * 60);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
