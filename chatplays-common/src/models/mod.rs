// File: chatplays-common/src/models/mod.rs
pub mod chat;
pub mod command;
pub mod identity;
pub mod queue;
pub mod snapshot;

pub use chat::{ChatMessage, InboundChat};
pub use command::{Button, ParsedCommand, PressDuration};
pub use identity::{Identity, short_participant_id};
pub use queue::{QueueItem, QueueStatus};
pub use snapshot::{OverlaySnapshot, SpamAbility};
