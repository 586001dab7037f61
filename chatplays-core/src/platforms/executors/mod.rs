// File: src/platforms/executors/mod.rs

use async_trait::async_trait;
use chatplays_common::models::Button;
use crate::Error;

pub mod emulator_bridge;
pub mod keyboard;

pub use emulator_bridge::EmulatorBridgeExecutor;
pub use keyboard::{KeyMap, KeySink, KeyboardExecutor, XdotoolKeySink};

/// Presses buttons on whatever is running the game. The queue only ever sees
/// this trait, never a concrete back-end.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Presses `buttons` together for `duration_ms`. Resolves once the press
    /// is over or has failed.
    async fn execute(&self, buttons: &[Button], duration_ms: u64) -> Result<(), Error>;
}
