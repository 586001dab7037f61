pub mod identity_cache;
pub mod message_cache;

pub use identity_cache::{IdentityCache, IdentityCacheEntry, InFlightGuard, IDENTITY_TTL_MINUTES};
pub use message_cache::ChatHistory;
