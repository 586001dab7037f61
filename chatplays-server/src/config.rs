//! chatplays-server/src/config.rs
//!
//! Command line / environment configuration. A `.env` file is loaded before
//! parsing, so every flag can also come from there.

use std::net::SocketAddr;
use std::time::Duration;
use clap::{Parser, ValueEnum};

use chatplays_core::platforms::executors::emulator_bridge::DEFAULT_SOCKET_TIMEOUT;
use chatplays_core::platforms::identity::atproto::{DEFAULT_PLC_DIRECTORY, DEFAULT_PROFILE_SERVICE};
use chatplays_core::PipelineConfig;

pub const DEFAULT_JETSTREAM_URL: &str = "wss://jetstream2.us-east.bsky.network/subscribe";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Synthesized key presses on this machine
    Keyboard,
    /// `press` lines over TCP to an emulator script
    Bridge,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "chatplays")]
#[command(author, version, about = "Chat plays: stream chat drives an emulator controller")]
pub struct Args {
    /// DID of the streamer whose chat is read
    #[arg(long, env = "CHATPLAYS_STREAMER")]
    pub streamer: String,

    /// Jetstream subscribe endpoint
    #[arg(long, env = "CHATPLAYS_JETSTREAM_URL", default_value = DEFAULT_JETSTREAM_URL)]
    pub jetstream_url: String,

    /// How commands reach the game
    #[arg(long, value_enum, env = "CHATPLAYS_EXECUTOR", default_value_t = ExecutorKind::Keyboard)]
    pub executor: ExecutorKind,

    /// host:port of the emulator bridge
    #[arg(long, env = "CHATPLAYS_BRIDGE_ADDR", default_value = "127.0.0.1:55355")]
    pub bridge_addr: String,

    #[arg(long, env = "CHATPLAYS_SOCKET_TIMEOUT_MS", default_value_t = DEFAULT_SOCKET_TIMEOUT.as_millis() as u64)]
    pub socket_timeout_ms: u64,

    /// Key map overrides, e.g. `a=k,b=j`
    #[arg(long, env = "CHATPLAYS_KEYMAP")]
    pub keymap: Option<String>,

    #[arg(long, env = "CHATPLAYS_XDOTOOL", default_value = "xdotool")]
    pub xdotool: String,

    /// Pause after each dispatched command
    #[arg(long, env = "CHATPLAYS_COMMAND_DELAY_MS", default_value_t = 200)]
    pub command_delay_ms: u64,

    /// Spacing between the presses of an `xN` command
    #[arg(long, env = "CHATPLAYS_REPEAT_DELAY_MS", default_value_t = 500)]
    pub repeat_delay_ms: u64,

    #[arg(long, env = "CHATPLAYS_CHAT_CAPACITY", default_value_t = 40)]
    pub chat_capacity: usize,

    #[arg(long, env = "CHATPLAYS_QUEUE_CAPACITY", default_value_t = 25)]
    pub queue_capacity: usize,

    /// Where the overlay page and its API are served
    #[arg(long, env = "CHATPLAYS_OVERLAY_ADDR", default_value = "127.0.0.1:3000")]
    pub overlay_addr: SocketAddr,

    #[arg(long, env = "CHATPLAYS_PLC_DIRECTORY", default_value = DEFAULT_PLC_DIRECTORY)]
    pub plc_directory: String,

    #[arg(long, env = "CHATPLAYS_PROFILE_SERVICE", default_value = DEFAULT_PROFILE_SERVICE)]
    pub profile_service: String,
}

impl Args {
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            streamer: Some(self.streamer.clone()),
            chat_capacity: self.chat_capacity,
            queue_capacity: self.queue_capacity,
            command_delay: Duration::from_millis(self.command_delay_ms),
            repeat_delay: Duration::from_millis(self.repeat_delay_ms),
            ..PipelineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_pipeline() {
        let args = Args::try_parse_from(["chatplays", "--streamer", "did:plc:streamer"]).unwrap();
        assert_eq!(args.executor, ExecutorKind::Keyboard);
        assert_eq!(args.socket_timeout(), Duration::from_secs(5));

        let config = args.pipeline_config();
        let defaults = PipelineConfig::default();
        assert_eq!(config.streamer.as_deref(), Some("did:plc:streamer"));
        assert_eq!(config.chat_capacity, defaults.chat_capacity);
        assert_eq!(config.queue_capacity, defaults.queue_capacity);
        assert_eq!(config.command_delay, defaults.command_delay);
        assert_eq!(config.repeat_delay, defaults.repeat_delay);
    }

    #[test]
    fn bridge_settings() {
        let args = Args::try_parse_from([
            "chatplays",
            "--streamer", "did:plc:s",
            "--executor", "bridge",
            "--bridge-addr", "10.0.0.2:9000",
            "--socket-timeout-ms", "250",
        ])
        .unwrap();
        assert_eq!(args.executor, ExecutorKind::Bridge);
        assert_eq!(args.bridge_addr, "10.0.0.2:9000");
        assert_eq!(args.socket_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Args::try_parse_from(["chatplays", "--streamer", "s", "--queue-capacity", "lots"]).is_err());
        assert!(Args::try_parse_from(["chatplays", "--streamer", "s", "--executor", "gamepad"]).is_err());
        assert!(Args::try_parse_from(["chatplays", "--streamer", "s", "--overlay-addr", "nowhere"]).is_err());
    }
}
