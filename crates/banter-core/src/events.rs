use serde::{Deserialize, Serialize};

use crate::ids::ConversationKey;

/// Engine lifecycle events surfaced to an operator (logging, dashboards).
/// Emitted over a broadcast channel; dropped when nobody listens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "cycle_start")]
    CycleStart { key: ConversationKey },

    #[serde(rename = "reply_emitted")]
    ReplyEmitted {
        key: ConversationKey,
        reply_chars: usize,
        history_len: usize,
    },

    #[serde(rename = "cycle_failed")]
    CycleFailed {
        key: ConversationKey,
        error_kind: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tagged_by_type() {
        let event = ChatEvent::ReplyEmitted {
            key: ConversationKey::from_raw("console"),
            reply_chars: 12,
            history_len: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reply_emitted");
        assert_eq!(json["key"], "console");
        assert_eq!(json["history_len"], 4);
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        let key = ConversationKey::from_raw("console");
        let events = vec![
            ChatEvent::CycleStart { key: key.clone() },
            ChatEvent::ReplyEmitted {
                key: key.clone(),
                reply_chars: 3,
                history_len: 2,
            },
            ChatEvent::CycleFailed {
                key,
                error_kind: "timeout".into(),
            },
        ];
        for event in &events {
            let json = serde_json::to_string(event).unwrap();
            let parsed: ChatEvent = serde_json::from_str(&json).unwrap();
            let json2 = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, json2);
        }
    }
}
