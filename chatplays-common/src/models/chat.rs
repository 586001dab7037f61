// File: chatplays-common/src/models/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Identity, short_participant_id};

/// A chat record as delivered by the firehose, before anything is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundChat {
    pub participant_id: String,
    /// Whose stream the record was posted to, when the source says so.
    pub streamer: Option<String>,
    pub text: String,
    /// Identity fields the record carried itself, if any.
    pub hint: Option<Identity>,
}

impl InboundChat {
    pub fn new(participant_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            streamer: None,
            text: text.into(),
            hint: None,
        }
    }

    pub fn with_streamer(mut self, streamer: impl Into<String>) -> Self {
        self.streamer = Some(streamer.into());
        self
    }

    pub fn with_hint(mut self, hint: Identity) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Records that don't name a streamer are never considered part of a stream.
    pub fn belongs_to_stream(&self, streamer: &str) -> bool {
        self.streamer.as_deref() == Some(streamer)
    }
}

/// One line of the overlay's chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub participant_id: String,
    pub display_user: String,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
    pub text: String,
    pub is_command: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        id: String,
        participant_id: &str,
        text: &str,
        is_command: bool,
        created_at: DateTime<Utc>,
        identity: Option<&Identity>,
    ) -> Self {
        let mut message = Self {
            id,
            participant_id: participant_id.to_string(),
            display_user: short_participant_id(participant_id),
            handle: None,
            avatar_url: None,
            text: text.to_string(),
            is_command,
            created_at,
        };
        if let Some(identity) = identity {
            message.apply_identity(identity);
        }
        message
    }

    /// Recomputes display fields from `identity` alone: display name, then
    /// handle, then the shortened id. Returns whether anything changed.
    pub fn apply_identity(&mut self, identity: &Identity) -> bool {
        if identity.participant_id != self.participant_id {
            return false;
        }
        let handle = identity.handle.clone();
        let avatar_url = identity.avatar_url.clone();
        let display_user = identity
            .display_name
            .clone()
            .or_else(|| handle.clone())
            .unwrap_or_else(|| short_participant_id(&self.participant_id));

        let changed = handle != self.handle
            || avatar_url != self.avatar_url
            || display_user != self.display_user;
        if changed {
            self.handle = handle;
            self.avatar_url = avatar_url;
            self.display_user = display_user;
        }
        changed
    }
}
