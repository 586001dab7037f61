// File: chatplays-common/src/models/queue.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Identity, short_participant_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Active,
    Done,
    Error,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Done | QueueStatus::Error)
    }
}

/// A command waiting for, undergoing, or finished with dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub participant_id: String,
    pub display_user: String,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
    /// Normalized command text; re-parsed at dispatch time.
    pub command: String,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(
        id: String,
        participant_id: &str,
        command: &str,
        created_at: DateTime<Utc>,
        identity: Option<&Identity>,
    ) -> Self {
        let mut item = Self {
            id,
            participant_id: participant_id.to_string(),
            display_user: short_participant_id(participant_id),
            handle: None,
            avatar_url: None,
            command: command.to_string(),
            status: QueueStatus::Queued,
            created_at,
        };
        if let Some(identity) = identity {
            item.apply_identity(identity);
        }
        item
    }

    /// Queue rows show the identity's handle, falling back to the shortened id.
    pub fn apply_identity(&mut self, identity: &Identity) -> bool {
        if identity.participant_id != self.participant_id {
            return false;
        }
        let handle = identity.handle.clone();
        let avatar_url = identity.avatar_url.clone();
        let display_user = handle
            .clone()
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
