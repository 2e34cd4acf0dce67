use banter_core::ids::ConversationKey;

use crate::error::EngineError;
use crate::prompt;
use crate::session::SessionEngine;

/// Admin controls: unconditional overwrites of the persisted document,
/// serialized against in-flight session cycles via the per-key lock.
impl SessionEngine {
    /// Reset the transcript to empty. The document itself stays.
    pub async fn clear_history(&self, key: &ConversationKey) -> Result<(), EngineError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        self.repo().set_history(key, &[])?;
        Ok(())
    }

    /// Replace the persona and clear the transcript: a new persona
    /// invalidates context generated under the old one.
    pub async fn set_system_prompt(
        &self,
        key: &ConversationKey,
        text: &str,
    ) -> Result<(), EngineError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        self.repo().set_system_prompt(key, text)?;
        self.repo().set_history(key, &[])?;
        Ok(())
    }

    /// Current persona text, materializing the default on a cold document.
    pub async fn system_prompt(&self, key: &ConversationKey) -> Result<String, EngineError> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        Ok(prompt::resolve(self.repo(), key)?)
    }

    /// Back to the built-in persona, clearing the transcript.
    pub async fn reset_system_prompt(&self, key: &ConversationKey) -> Result<(), EngineError> {
        self.set_system_prompt(key, prompt::DEFAULT_SYSTEM_PROMPT).await
    }
}
