//! Jetstream chat records → [`InboundChat`].
//!
//! A Jetstream commit looks like:
//!
//! ```json
//! { "did": "did:plc:author", "kind": "commit",
//!   "commit": { "operation": "create", "collection": "place.stream.chat.message",
//!               "record": { "text": "up", "streamer": "did:plc:streamer" } } }
//! ```
//!
//! Only creates in the chat collection are turned into records; everything else
//! (identity/account events, deletes, other collections) is ignored.

use serde_json::Value;

use chatplays_common::models::{Identity, InboundChat};

pub const CHAT_COLLECTION: &str = "place.stream.chat.message";

/// Field names that may carry the message body, tried in order.
const TEXT_FIELDS: [&str; 4] = ["text", "message", "body", "content"];
const HINT_CONTAINERS: [&str; 2] = ["author", "chatProfile"];

pub fn from_jetstream(event: &Value) -> Option<InboundChat> {
    if event.get("kind").and_then(Value::as_str) != Some("commit") {
        return None;
    }
    let commit = event.get("commit")?;
    if commit.get("operation").and_then(Value::as_str) != Some("create") {
        return None;
    }
    if commit.get("collection").and_then(Value::as_str) != Some(CHAT_COLLECTION) {
        return None;
    }

    let participant_id = event.get("did").and_then(Value::as_str)?;
    let record = commit.get("record")?;
    let text = extract_text(record)?;

    Some(InboundChat {
        participant_id: participant_id.to_string(),
        streamer: string_field(record, "streamer"),
        text,
        hint: extract_hint(participant_id, record),
    })
}

/// First non-empty string among the known body fields.
pub fn extract_text(record: &Value) -> Option<String> {
    TEXT_FIELDS
        .iter()
        .filter_map(|field| record.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(String::from)
}

/// Identity fields embedded in the record, either at the top level or
/// inside an `author` / `chatProfile` object.
pub fn extract_hint(participant_id: &str, record: &Value) -> Option<Identity> {
    let sources = std::iter::once(record)
        .chain(HINT_CONTAINERS.iter().filter_map(|key| record.get(*key)))
        .filter(|v| v.is_object());

    let mut hint = Identity::new(participant_id);
    for source in sources {
        hint.handle = hint.handle.or_else(|| string_field(source, "handle"));
        hint.display_name = hint.display_name.or_else(|| string_field(source, "displayName"));
        hint.avatar_url = hint
            .avatar_url
            .or_else(|| string_field(source, "avatarUrl"))
            .or_else(|| string_field(source, "avatar"));
    }
    (!hint.is_empty()).then_some(hint)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit(record: Value) -> Value {
        json!({
            "did": "did:plc:author",
            "time_us": 1725911162329308u64,
            "kind": "commit",
            "commit": {
                "rev": "3l3qo2vutsw2b",
                "operation": "create",
                "collection": CHAT_COLLECTION,
                "rkey": "3l3qo2vuowo2b",
                "record": record,
                "cid": "bafyreia"
            }
        })
    }

    #[test]
    fn maps_chat_commit() {
        let event = commit(json!({
            "$type": CHAT_COLLECTION,
            "text": " a+b ",
            "streamer": "did:plc:streamer",
            "createdAt": "2024-09-09T19:46:02.102Z"
        }));
        let chat = from_jetstream(&event).expect("chat record");
        assert_eq!(chat.participant_id, "did:plc:author");
        assert_eq!(chat.text, "a+b");
        assert!(chat.belongs_to_stream("did:plc:streamer"));
        assert_eq!(chat.hint, None);
    }

    #[test]
    fn text_falls_back_through_field_names() {
        assert_eq!(extract_text(&json!({"message": "up"})).as_deref(), Some("up"));
        assert_eq!(extract_text(&json!({"text": "", "body": "down"})).as_deref(), Some("down"));
        assert_eq!(extract_text(&json!({"content": "start"})).as_deref(), Some("start"));
        assert_eq!(extract_text(&json!({"text": 5})), None);
        assert_eq!(extract_text(&json!({})), None);
    }

    #[test]
    fn ignores_non_chat_events() {
        let mut delete = commit(json!({"text": "up"}));
        delete["commit"]["operation"] = json!("delete");
        assert!(from_jetstream(&delete).is_none());

        let mut other = commit(json!({"text": "up"}));
        other["commit"]["collection"] = json!("app.bsky.feed.post");
        assert!(from_jetstream(&other).is_none());

        let identity = json!({"did": "did:plc:author", "kind": "identity", "identity": {}});
        assert!(from_jetstream(&identity).is_none());

        assert!(from_jetstream(&commit(json!({"streamer": "did:plc:s"}))).is_none());
    }

    #[test]
    fn picks_up_embedded_identity() {
        let event = commit(json!({
            "text": "left",
            "streamer": "did:plc:streamer",
            "chatProfile": { "handle": "bob.test", "avatar": "https://img/bob" },
            "displayName": "Bob"
        }));
        let hint = from_jetstream(&event).unwrap().hint.expect("hint");
        assert_eq!(hint.participant_id, "did:plc:author");
        assert_eq!(hint.handle.as_deref(), Some("bob.test"));
        assert_eq!(hint.display_name.as_deref(), Some("Bob"));
        assert_eq!(hint.avatar_url.as_deref(), Some("https://img/bob"));
    }
}
