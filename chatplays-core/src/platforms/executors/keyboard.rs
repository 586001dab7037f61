//! Local keyboard injection.
//!
//! Each controller button maps to a key name the emulator listens for. A press
//! is "all keys down, hold, all keys up in reverse order". The actual key
//! events go through a [`KeySink`]; the default one shells out to `xdotool`.

use std::collections::HashMap;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use chatplays_common::models::Button;
use crate::Error;
use super::CommandExecutor;

#[async_trait]
pub trait KeySink: Send + Sync {
    async fn key_down(&self, key: &str) -> Result<(), Error>;
    async fn key_up(&self, key: &str) -> Result<(), Error>;
}

/// Sends key events with `xdotool keydown|keyup <key>`.
#[derive(Debug, Clone)]
pub struct XdotoolKeySink {
    program: String,
}

impl XdotoolKeySink {
    pub fn new() -> Self {
        Self { program: "xdotool".to_string() }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    async fn run(&self, action: &str, key: &str) -> Result<(), Error> {
        let status = Command::new(&self.program)
            .arg(action)
            .arg(key)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Dispatch(format!("{} {} {} exited with {}", self.program, action, key, status)))
        }
    }
}

impl Default for XdotoolKeySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySink for XdotoolKeySink {
    async fn key_down(&self, key: &str) -> Result<(), Error> {
        self.run("keydown", key).await
    }

    async fn key_up(&self, key: &str) -> Result<(), Error> {
        self.run("keyup", key).await
    }
}

/// Button → key name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap(HashMap<Button, String>);

impl KeyMap {
    pub fn key_for(&self, button: Button) -> Option<&str> {
        self.0.get(&button).map(String::as_str)
    }

    /// Applies `button=key` pairs separated by commas, e.g. `a=k,b=j`.
    pub fn with_overrides(mut self, overrides: &str) -> Result<Self, Error> {
        for pair in overrides.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (button, key) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("key map entry '{}' is not button=key", pair)))?;
            let button = Button::from_token(&button.trim().to_lowercase())
                .ok_or_else(|| Error::Config(format!("unknown button '{}' in key map", button.trim())))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Config(format!("empty key for '{}' in key map", button)));
            }
            self.0.insert(button, key.to_string());
        }
        Ok(self)
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let keys = [
            (Button::Up, "Up"),
            (Button::Down, "Down"),
            (Button::Left, "Left"),
            (Button::Right, "Right"),
            (Button::A, "x"),
            (Button::B, "z"),
            (Button::Start, "Return"),
            (Button::Select, "BackSpace"),
            (Button::L, "a"),
            (Button::R, "s"),
        ];
        Self(keys.into_iter().map(|(b, k)| (b, k.to_string())).collect())
    }
}

pub struct KeyboardExecutor<S: KeySink = XdotoolKeySink> {
    sink: S,
    keymap: KeyMap,
}

impl<S: KeySink> KeyboardExecutor<S> {
    pub fn new(sink: S, keymap: KeyMap) -> Self {
        Self { sink, keymap }
    }

    async fn release_all(&self, keys: &[&str]) {
        for key in keys.iter().rev() {
            if let Err(e) = self.sink.key_up(key).await {
                warn!("failed to release key '{}': {}", key, e);
            }
        }
    }
}

#[async_trait]
impl<S: KeySink> CommandExecutor for KeyboardExecutor<S> {
    async fn execute(&self, buttons: &[Button], duration_ms: u64) -> Result<(), Error> {
        let keys = buttons
            .iter()
            .map(|b| {
                self.keymap
                    .key_for(*b)
                    .ok_or_else(|| Error::Dispatch(format!("no key mapped for '{}'", b)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut pressed = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Err(e) = self.sink.key_down(key).await {
                self.release_all(&pressed).await;
                return Err(e);
            }
            pressed.push(*key);
        }

        debug!("holding {:?} for {}ms", pressed, duration_ms);
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;

        let mut result = Ok(());
        for key in pressed.iter().rev() {
            if let Err(e) = self.sink.key_up(key).await {
                warn!("failed to release key '{}': {}", key, e);
                result = Err(e);
            }
        }
        result
    }
}
