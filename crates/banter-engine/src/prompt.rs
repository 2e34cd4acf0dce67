use banter_core::ids::ConversationKey;
use banter_store::{ConversationRepo, StoreError};

/// Built-in persona used until an admin sets a different one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly member of a small chat \
channel. Messages arrive prefixed with the speaker's display name. Speak casually, \
keep replies short, and stay in the flow of the conversation.";

/// Get-or-initialize the system prompt for a conversation.
///
/// Exactly one write happens per cold document; later calls only read.
/// Two concurrent first resolves may both see the field absent and both
/// write the default. Both writes are identical, so the race is benign
/// and intentionally left in place until the store grows conditional
/// writes.
pub fn resolve(repo: &ConversationRepo, key: &ConversationKey) -> Result<String, StoreError> {
    if let Some(prompt) = repo.system_prompt(key)? {
        return Ok(prompt);
    }

    repo.set_system_prompt(key, DEFAULT_SYSTEM_PROMPT)?;
    Ok(DEFAULT_SYSTEM_PROMPT.to_string())
}
