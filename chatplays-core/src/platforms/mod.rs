// File: src/platforms/mod.rs
//
// Everything that talks to the outside world: where chat comes from, where
// button presses go, and where identities are looked up.

pub mod executors;
pub mod firehose;
pub mod identity;

pub use executors::CommandExecutor;
pub use identity::IdentityResolver;
