// src/lib.rs

pub mod cache;
pub mod clock;
pub mod eventbus;
pub mod http;
pub mod platforms;
pub mod services;
pub mod test_utils;

pub use chatplays_common::error::Error;
pub use chatplays_common::models;
pub use http::{DefaultHttpClient, HttpClient};
pub use services::chat_service::{ChatPlaysService, PipelineConfig};
