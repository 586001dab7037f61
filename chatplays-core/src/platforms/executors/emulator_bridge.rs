//! Line protocol to a scripted emulator bridge.
//!
//! One TCP connection per command. For every button a line
//! `press <button> <durationMs>\n` is written, then the write half is shut
//! down. The whole exchange runs under a single socket timeout.

use std::time::Duration;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use chatplays_common::models::Button;
use crate::Error;
use super::CommandExecutor;

pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EmulatorBridgeExecutor {
    addr: String,
    socket_timeout: Duration,
}

impl EmulatorBridgeExecutor {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, socket_timeout: Duration) -> Self {
        self.socket_timeout = socket_timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn send(&self, buttons: &[Button], duration_ms: u64) -> Result<(), Error> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        for button in buttons {
            stream.write_all(press_line(*button, duration_ms).as_bytes()).await?;
        }
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

pub fn press_line(button: Button, duration_ms: u64) -> String {
    format!("press {} {}\n", button, duration_ms)
}

#[async_trait]
impl CommandExecutor for EmulatorBridgeExecutor {
    async fn execute(&self, buttons: &[Button], duration_ms: u64) -> Result<(), Error> {
        debug!("bridge {} <- {:?} {}ms", self.addr, buttons, duration_ms);
        timeout(self.socket_timeout, self.send(buttons, duration_ms)).await?
    }
}
