// File: chatplays-common/src/models/command.rs

use std::fmt;
use serde::{Deserialize, Serialize};

/// Press length for a plain command.
pub const SHORT_PRESS_MS: u64 = 150;
/// Press length when the command ends with the hold marker (`-`).
pub const LONG_PRESS_MS: u64 = 600;

/// The fixed controller vocabulary chat can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
    L,
    R,
}

impl Button {
    pub const ALL: [Button; 10] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
        Button::L,
        Button::R,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Button::Up => "up",
            Button::Down => "down",
            Button::Left => "left",
            Button::Right => "right",
            Button::A => "a",
            Button::B => "b",
            Button::Start => "start",
            Button::Select => "select",
            Button::L => "l",
            Button::R => "r",
        }
    }

    /// Looks up a lowercase token. Anything outside the vocabulary is `None`.
    pub fn from_token(token: &str) -> Option<Button> {
        Button::ALL.iter().copied().find(|b| b.as_str() == token)
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressDuration {
    Short,
    Long,
}

impl PressDuration {
    pub fn as_millis(&self) -> u64 {
        match self {
            PressDuration::Short => SHORT_PRESS_MS,
            PressDuration::Long => LONG_PRESS_MS,
        }
    }
}

/// A chat line that made it through the command grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCommand {
    pub buttons: Vec<Button>,
    pub duration: PressDuration,
    /// Canonical form, e.g. `b+right-`. This is what the queue stores.
    pub normalized: String,
    pub repeat_count: u32,
}

impl ParsedCommand {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis()
    }

    pub fn is_repeated(&self) -> bool {
        self.repeat_count > 1
    }
}
