pub mod activity_tracker;
pub mod chat_service;
pub mod command_parser;
pub mod command_queue;

pub use activity_tracker::ActivityTracker;
pub use chat_service::{ChatPlaysService, PipelineConfig, PipelineState};
pub use command_parser::{parse_command, CommandSyntax};
pub use command_queue::{Claim, CommandQueue};
