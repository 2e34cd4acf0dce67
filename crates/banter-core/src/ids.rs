use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key addressing one persisted conversation document.
///
/// Keys come from the chat platform (a channel or session id), never
/// generated here. Each key owns an independent transcript; the engine
/// serializes cycles per key.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConversationKey {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_preserves_value() {
        let key = ConversationKey::from_raw("channel-392164092959260674");
        assert_eq!(key.as_str(), "channel-392164092959260674");
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let key = ConversationKey::from_raw("console");
        let s = key.to_string();
        let parsed: ConversationKey = s.parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let key = ConversationKey::from_raw("console");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#""console""#);
        let parsed: ConversationKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }
}
