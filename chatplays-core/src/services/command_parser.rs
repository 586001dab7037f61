//! Chat text → controller command.
//!
//! Grammar, checked in this order:
//!
//! ```text
//! <base> x<N>     repeat suffix (only when allowed), 2 <= N <= 100
//! <combo>-        trailing '-' holds the buttons longer
//! <btn>[+<btn>]   one or two buttons from the fixed vocabulary
//! ```
//!
//! Parsing never fails loudly: anything that doesn't fit is `None`.

use once_cell::sync::Lazy;
use regex::Regex;

use chatplays_common::models::{Button, ParsedCommand, PressDuration};

pub const MIN_REPEAT: u32 = 2;
pub const MAX_REPEAT: u32 = 100;
/// Most buttons a single command may press together.
pub const MAX_COMBO: usize = 2;

const HOLD_SUFFIX: char = '-';
const COMBO_SEPARATOR: char = '+';

static REPEAT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*\S)\s+x(\d+)$").expect("repeat suffix pattern is valid"));

/// First parsing stage. The base of a `Repeated` is always a plain command,
/// so repeat syntax can never nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSyntax {
    Plain(ParsedCommand),
    Repeated { base: ParsedCommand, count: u32 },
}

impl CommandSyntax {
    pub fn into_command(self) -> ParsedCommand {
        match self {
            CommandSyntax::Plain(command) => command,
            CommandSyntax::Repeated { base, count } => ParsedCommand {
                repeat_count: count,
                ..base
            },
        }
    }
}

/// Parses `raw` into a command, or `None` if it isn't one.
pub fn parse_command(raw: &str, allow_repeat_suffix: bool) -> Option<ParsedCommand> {
    parse_syntax(raw, allow_repeat_suffix).map(CommandSyntax::into_command)
}

pub fn parse_syntax(raw: &str, allow_repeat_suffix: bool) -> Option<CommandSyntax> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    if allow_repeat_suffix {
        if let Some(caps) = REPEAT_SUFFIX.captures(&text) {
            let count: u32 = caps[2].parse().ok()?;
            if !(MIN_REPEAT..=MAX_REPEAT).contains(&count) {
                return None;
            }
            let base = parse_plain(&caps[1])?;
            return Some(CommandSyntax::Repeated { base, count });
        }
    }

    parse_plain(&text).map(CommandSyntax::Plain)
}

/// Hold suffix and combo parsing. Input is already trimmed and lowercased.
fn parse_plain(text: &str) -> Option<ParsedCommand> {
    let (body, duration) = match text.strip_suffix(HOLD_SUFFIX) {
        Some(rest) => (rest, PressDuration::Long),
        None => (text, PressDuration::Short),
    };

    let mut buttons = Vec::with_capacity(MAX_COMBO);
    for part in body.split(COMBO_SEPARATOR) {
        if buttons.len() == MAX_COMBO {
            return None;
        }
        buttons.push(Button::from_token(part.trim())?);
    }

    let mut normalized = buttons
        .iter()
        .map(Button::as_str)
        .collect::<Vec<_>>()
        .join("+");
    if duration == PressDuration::Long {
        normalized.push(HOLD_SUFFIX);
    }

    Some(ParsedCommand {
        buttons,
        duration,
        normalized,
        repeat_count: 1,
    })
}
