use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use banter_core::ids::ConversationKey;
use banter_core::turns::Turn;

use crate::database::Database;
use crate::error::StoreError;

/// Field-level access to persisted conversation documents.
///
/// Each setter is a single atomic upsert that replaces one field in full;
/// there is no cross-field or cross-call atomicity. Rows materialize
/// lazily on first write; reads of absent rows return `None`. Concurrency
/// correctness is built above this layer, in the engine.
pub struct ConversationRepo {
    db: Database,
}

impl ConversationRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Read the stored transcript. `None` when the document does not exist yet.
    #[instrument(skip(self), fields(key = %key))]
    pub fn history(&self, key: &ConversationKey) -> Result<Option<Vec<Turn>>, StoreError> {
        self.db.with_conn(|conn| {
            // Only the no-rows case is "absent"; real failures propagate.
            let raw: Option<String> = conn
                .query_row(
                    "SELECT history FROM conversations WHERE key = ?1",
                    [key.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            match raw {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
    }

    /// Replace the stored transcript, creating the document if needed.
    #[instrument(skip(self, turns), fields(key = %key, len = turns.len()))]
    pub fn set_history(&self, key: &ConversationKey, turns: &[Turn]) -> Result<(), StoreError> {
        let json = serde_json::to_string(turns)?;
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO conversations (key, history, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     history = excluded.history,
                     updated_at = excluded.updated_at",
                rusqlite::params![key.as_str(), json, now],
            )?;
            Ok(())
        })
    }

    /// Read the stored system prompt. `None` when the document does not
    /// exist or the field was never written.
    #[instrument(skip(self), fields(key = %key))]
    pub fn system_prompt(&self, key: &ConversationKey) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            let prompt: Option<Option<String>> = conn
                .query_row(
                    "SELECT system_prompt FROM conversations WHERE key = ?1",
                    [key.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(prompt.flatten())
        })
    }

    /// Replace the stored system prompt, creating the document if needed.
    #[instrument(skip(self, prompt), fields(key = %key))]
    pub fn set_system_prompt(
        &self,
        key: &ConversationKey,
        prompt: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO conversations (key, system_prompt, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     system_prompt = excluded.system_prompt,
                     updated_at = excluded.updated_at",
                rusqlite::params![key.as_str(), prompt, now],
            )?;
            Ok(())
        })
    }

}
