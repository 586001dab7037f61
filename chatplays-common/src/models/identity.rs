// File: chatplays-common/src/models/identity.rs

use serde::{Deserialize, Serialize};

/// Number of characters kept when a raw participant id has to stand in for a name.
const SHORT_ID_LEN: usize = 8;

/// Display identity for a chat participant, as far as it is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub participant_id: String,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            ..Default::default()
        }
    }

    /// True when no display field is set at all.
    pub fn is_empty(&self) -> bool {
        self.handle.is_none() && self.display_name.is_none() && self.avatar_url.is_none()
    }

    /// Fields set on `self` win; missing ones fall back to `older`.
    pub fn merged_over(self, older: &Identity) -> Identity {
        Identity {
            participant_id: self.participant_id,
            handle: self.handle.or_else(|| older.handle.clone()),
            display_name: self.display_name.or_else(|| older.display_name.clone()),
            avatar_url: self.avatar_url.or_else(|| older.avatar_url.clone()),
        }
    }
}

/// Shortened raw id, e.g. `did:plc:abcdefghijk` becomes `abcdefgh`.
pub fn short_participant_id(participant_id: &str) -> String {
    let bare = match participant_id.strip_prefix("did:") {
        Some(rest) => rest.split_once(':').map(|(_, id)| id).unwrap_or(rest),
        None => participant_id,
    };
    bare.chars().take(SHORT_ID_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_strips_did_method() {
        assert_eq!(short_participant_id("did:plc:abcdefghijklmnop"), "abcdefgh");
        assert_eq!(short_participant_id("did:web:example.com"), "example.");
        assert_eq!(short_participant_id("viewer42"), "viewer42");
        assert_eq!(short_participant_id("abc"), "abc");
    }

    #[test]
    fn merge_keeps_older_fields_when_missing() {
        let older = Identity {
            participant_id: "did:plc:x".into(),
            handle: Some("old.bsky.social".into()),
            display_name: Some("Old".into()),
            avatar_url: None,
        };
        let newer = Identity {
            participant_id: "did:plc:x".into(),
            handle: None,
            display_name: Some("New".into()),
            avatar_url: Some("https://cdn/x".into()),
        };
        let merged = newer.merged_over(&older);
        assert_eq!(merged.handle.as_deref(), Some("old.bsky.social"));
        assert_eq!(merged.display_name.as_deref(), Some("New"));
        assert_eq!(merged.avatar_url.as_deref(), Some("https://cdn/x"));
    }
}
