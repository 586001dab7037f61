// File: chatplays-common/src/models/snapshot.rs

use serde::{Deserialize, Serialize};

use super::chat::ChatMessage;
use super::queue::{QueueItem, QueueStatus};

/// State of the repeat-suffix gate as shown on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamAbility {
    pub enabled: bool,
    pub unique_chatters: usize,
    pub threshold: usize,
    pub window_minutes: i64,
}

/// Everything the overlay renders, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySnapshot {
    pub chat: Vec<ChatMessage>,
    pub queue: Vec<QueueItem>,
    pub active_command_id: Option<String>,
    pub spam_ability: SpamAbility,
}

impl OverlaySnapshot {
    pub fn active_count(&self) -> usize {
        self.queue
            .iter()
            .filter(|item| item.status == QueueStatus::Active)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_overlay_field_names() {
        let snapshot = OverlaySnapshot {
            chat: vec![],
            queue: vec![],
            active_command_id: None,
            spam_ability: SpamAbility {
                enabled: true,
                unique_chatters: 1,
                threshold: 3,
                window_minutes: 10,
            },
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("activeCommandId").unwrap().is_null());
        let spam = value.get("spamAbility").unwrap();
        assert_eq!(spam["uniqueChatters"], 1);
        assert_eq!(spam["windowMinutes"], 10);
        assert_eq!(spam["enabled"], true);
    }
}
