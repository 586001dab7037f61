// File: src/platforms/identity/mod.rs

use async_trait::async_trait;
use chatplays_common::models::Identity;
use crate::Error;

pub mod atproto;

pub use atproto::AtprotoIdentityResolver;

/// Looks up display details for a participant id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` means nothing was found; the caller will try again on a
    /// later message instead of caching the miss.
    async fn resolve(&self, participant_id: &str) -> Result<Option<Identity>, Error>;
}
