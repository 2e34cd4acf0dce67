use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{instrument, warn};

use banter_core::client::CompletionClient;
use banter_core::events::ChatEvent;
use banter_core::ids::ConversationKey;
use banter_core::ledger::{Ledger, MAX_HISTORY};
use banter_core::turns::Turn;
use banter_store::{ConversationRepo, Database};

use crate::error::EngineError;
use crate::prompt;

/// Fixed reply for over-length input. A terminal short-circuit, not an error.
pub const REFUSAL_REPLY: &str =
    "That's a bit much for me to take in at once. Could you keep it to 1028 characters?";

const MAX_MESSAGE_CHARS: usize = 1028;

/// Configuration for the session engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// The designated conversation channel. Everything else is ignored.
    pub channel: String,
    /// Transcript bound applied after every successful cycle.
    pub max_history: usize,
    /// Entry-gate limit on inbound message length, in characters.
    pub max_message_chars: usize,
}

impl EngineConfig {
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            max_history: MAX_HISTORY,
            max_message_chars: MAX_MESSAGE_CHARS,
        }
    }
}

/// One inbound chat event, as handed over by the platform gateway.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub author_display_name: String,
    pub author_is_bot: bool,
    pub channel: String,
    pub content: String,
}

/// What a handled event produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Gate rejected the event: no reply, no store access.
    Ignored,
    /// Over-length input: the fixed refusal, nothing persisted.
    Refused(&'static str),
    /// A full cycle ran; reply text to emit.
    Replied(String),
}

/// Orchestrates one session cycle per inbound message:
/// gate → load → generate → append + trim → persist → reply.
///
/// Cycles on the same conversation key are serialized through a per-key
/// queue, so a slow completion call cannot lose another cycle's turns.
pub struct SessionEngine {
    client: Arc<dyn CompletionClient>,
    repo: ConversationRepo,
    config: EngineConfig,
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl SessionEngine {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        db: Database,
        config: EngineConfig,
        event_tx: broadcast::Sender<ChatEvent>,
    ) -> Self {
        Self {
            client,
            repo: ConversationRepo::new(db),
            config,
            locks: DashMap::new(),
            event_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn repo(&self) -> &ConversationRepo {
        &self.repo
    }

    /// At most one in-flight cycle per key; later cycles wait here.
    /// Admin operations go through the same lock.
    pub(crate) fn lock_for(&self, key: &ConversationKey) -> Arc<Mutex<()>> {
        self.locks.entry(key.clone()).or_default().clone()
    }

    pub(crate) fn send_event(&self, event: ChatEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("no event receivers — event dropped");
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// Gate rejections resolve before any store access. A store or
    /// completion failure aborts the cycle with nothing persisted.
    #[instrument(skip(self, msg), fields(channel = %msg.channel, author = %msg.author_display_name))]
    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<Outcome, EngineError> {
        // Entry gate: self-feedback, wrong channel, over-length.
        if msg.author_is_bot {
            return Ok(Outcome::Ignored);
        }
        if msg.channel != self.config.channel {
            return Ok(Outcome::Ignored);
        }
        if msg.content.chars().count() > self.config.max_message_chars {
            return Ok(Outcome::Refused(REFUSAL_REPLY));
        }

        let key = ConversationKey::from_raw(&msg.channel);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        self.send_event(ChatEvent::CycleStart { key: key.clone() });

        match self.run_cycle(&key, msg).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.send_event(ChatEvent::CycleFailed {
                    key,
                    error_kind: e.error_kind().to_string(),
                });
                Err(e)
            }
        }
    }

    /// The locked portion of a cycle: load → generate → persist.
    async fn run_cycle(
        &self,
        key: &ConversationKey,
        msg: &InboundMessage,
    ) -> Result<Outcome, EngineError> {
        let system_prompt = prompt::resolve(&self.repo, key)?;
        let mut ledger = Ledger::from_stored(self.repo.history(key)?);

        let new_turn = Turn::user(format!("{}: {}", msg.author_display_name, msg.content));

        // Nothing is appended until the completion succeeds.
        let reply = self
            .client
            .complete(&system_prompt, ledger.turns(), &new_turn)
            .await?;

        ledger.push(new_turn);
        ledger.push(Turn::assistant(reply.clone()));
        ledger.trim(self.config.max_history);

        self.repo.set_history(key, ledger.turns())?;

        self.send_event(ChatEvent::ReplyEmitted {
            key: key.clone(),
            reply_chars: reply.chars().count(),
            history_len: ledger.len(),
        });

        Ok(Outcome::Replied(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use banter_core::errors::CompletionError;
    use banter_llm::{MockClient, MockCompletion};

    fn engine_with(completions: Vec<MockCompletion>) -> (Arc<SessionEngine>, Arc<MockClient>) {
        let client = Arc::new(MockClient::new(completions));
        let (event_tx, _) = broadcast::channel(64);
        let engine = SessionEngine::new(
            client.clone(),
            Database::in_memory().unwrap(),
            EngineConfig::for_channel("console"),
            event_tx,
        );
        (Arc::new(engine), client)
    }

    fn message(content: &str) -> InboundMessage {
        InboundMessage {
            author_display_name: "Twilight".into(),
            author_is_bot: false,
            channel: "console".into(),
            content: content.into(),
        }
    }

    fn key() -> ConversationKey {
        ConversationKey::from_raw("console")
    }

    #[tokio::test]
    async fn successful_cycle_replies_and_persists_pair() {
        let (engine, client) = engine_with(vec![MockCompletion::text("hello there")]);

        let outcome = engine.handle_message(&message("hi")).await.unwrap();
        assert_eq!(outcome, Outcome::Replied("hello there".into()));
        assert_eq!(client.call_count(), 1);

        let stored = engine.repo().history(&key()).unwrap().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "Twilight: hi");
        assert_eq!(stored[1].content, "hello there");
    }

    #[tokio::test]
    async fn bot_author_is_silently_ignored() {
        let (engine, client) = engine_with(vec![MockCompletion::text("never")]);

        let mut msg = message("hi");
        msg.author_is_bot = true;

        let outcome = engine.handle_message(&msg).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(client.call_count(), 0);
        // No writes happened: not even a lazily materialized document
        assert!(engine.repo().history(&key()).unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_channel_is_silently_ignored() {
        let (engine, client) = engine_with(vec![MockCompletion::text("never")]);

        let mut msg = message("hi");
        msg.channel = "elsewhere".into();

        let outcome = engine.handle_message(&msg).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(client.call_count(), 0);
        assert!(engine.repo().history(&key()).unwrap().is_none());
    }

    #[tokio::test]
    async fn over_length_input_gets_fixed_refusal() {
        let (engine, client) = engine_with(vec![MockCompletion::text("never")]);

        let outcome = engine
            .handle_message(&message(&"a".repeat(1029)))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Refused(REFUSAL_REPLY));
        assert_eq!(client.call_count(), 0);
        assert!(engine.repo().history(&key()).unwrap().is_none());
    }

    #[tokio::test]
    async fn boundary_length_input_is_accepted() {
        let (engine, _) = engine_with(vec![MockCompletion::text("ok")]);

        let outcome = engine
            .handle_message(&message(&"a".repeat(1028)))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Replied(_)));
    }

    #[tokio::test]
    async fn length_gate_counts_chars_not_bytes() {
        let (engine, _) = engine_with(vec![MockCompletion::text("ok")]);

        // 1028 three-byte characters: over the byte count, within the gate
        let outcome = engine
            .handle_message(&message(&"ꙮ".repeat(1028)))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Replied(_)));
    }

    #[tokio::test]
    async fn transcript_is_trimmed_to_bound() {
        let (engine, _) = engine_with(vec![MockCompletion::text("reply")]);

        let preloaded: Vec<Turn> = (0..MAX_HISTORY)
            .map(|i| Turn::user(format!("old {i}")))
            .collect();
        engine.repo().set_history(&key(), &preloaded).unwrap();

        let _ = engine.handle_message(&message("new")).await.unwrap();

        let stored = engine.repo().history(&key()).unwrap().unwrap();
        assert_eq!(stored.len(), MAX_HISTORY);
        // Two oldest dropped, tail is the new pair
        assert_eq!(stored[0].content, "old 2");
        assert_eq!(stored[18].content, "Twilight: new");
        assert_eq!(stored[19].content, "reply");
    }

    #[tokio::test]
    async fn completion_failure_persists_nothing() {
        let (engine, _) = engine_with(vec![
            MockCompletion::Error(CompletionError::Timeout(Duration::from_secs(60))),
            MockCompletion::text("second try"),
        ]);

        let before = vec![Turn::user("kept"), Turn::assistant("kept too")];
        engine.repo().set_history(&key(), &before).unwrap();

        let err = engine.handle_message(&message("doomed")).await.unwrap_err();
        assert_eq!(err.error_kind(), "timeout");

        // Transcript untouched by the failed cycle
        let stored = engine.repo().history(&key()).unwrap().unwrap();
        assert_eq!(stored, before);

        // The next cycle starts from the same state and succeeds
        let outcome = engine.handle_message(&message("retry")).await.unwrap();
        assert_eq!(outcome, Outcome::Replied("second try".into()));
        assert_eq!(engine.repo().history(&key()).unwrap().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn cycle_failure_emits_operator_event() {
        let client = Arc::new(MockClient::new(vec![MockCompletion::Error(
            CompletionError::RateLimited { retry_after: None },
        )]));
        let (event_tx, mut event_rx) = broadcast::channel(64);
        let engine = SessionEngine::new(
            client,
            Database::in_memory().unwrap(),
            EngineConfig::for_channel("console"),
            event_tx,
        );

        let _ = engine.handle_message(&message("hi")).await;

        let mut kinds = Vec::new();
        while let Ok(event) = event_rx.try_recv() {
            if let ChatEvent::CycleFailed { error_kind, .. } = event {
                kinds.push(error_kind);
            }
        }
        assert_eq!(kinds, vec!["rate_limited".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cycles_do_not_lose_updates() {
        // First completion stalls long enough for the second message to
        // arrive while the first cycle is mid-flight.
        let (engine, client) = engine_with(vec![
            MockCompletion::delayed(Duration::from_millis(50), MockCompletion::text("reply one")),
            MockCompletion::text("reply two"),
        ]);

        let e1 = engine.clone();
        let e2 = engine.clone();
        let first = tokio::spawn(async move { e1.handle_message(&message("one")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = tokio::spawn(async move { e2.handle_message(&message("two")).await });

        let r1 = first.await.unwrap().unwrap();
        let r2 = second.await.unwrap().unwrap();
        assert!(matches!(r1, Outcome::Replied(_)));
        assert!(matches!(r2, Outcome::Replied(_)));
        assert_eq!(client.call_count(), 2);

        // Both turn pairs landed; the second cycle saw the first's state.
        let stored = engine.repo().history(&key()).unwrap().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0].content, "Twilight: one");
        assert_eq!(stored[1].content, "reply one");
        assert_eq!(stored[2].content, "Twilight: two");
        assert_eq!(stored[3].content, "reply two");
    }

    #[tokio::test]
    async fn first_cycle_materializes_default_prompt() {
        let (engine, _) = engine_with(vec![MockCompletion::text("hi")]);

        let _ = engine.handle_message(&message("hello")).await.unwrap();

        assert_eq!(
            engine.repo().system_prompt(&key()).unwrap().as_deref(),
            Some(crate::prompt::DEFAULT_SYSTEM_PROMPT)
        );
    }
}
