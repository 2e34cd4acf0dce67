use async_trait::async_trait;

use crate::errors::CompletionError;
use crate::turns::Turn;

/// Fixed sampling parameters sent with every completion request.
/// Injected into the client rather than hard-coded so tests can swap in
/// a fake client with known settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SamplingConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.9,
            max_tokens: 256,
            top_p: 1.0,
            frequency_penalty: 0.3,
            presence_penalty: 0.3,
        }
    }
}

/// Trait implemented by completion backends (hosted service, mock).
///
/// `complete` builds a request as system prompt + history in order + the
/// new turn, and returns the first completion's text. Callers must not
/// append the turn pair to the transcript until it succeeds.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        new_turn: &Turn,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_defaults_match_service_contract() {
        let cfg = SamplingConfig::default();
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert_eq!(cfg.temperature, 0.9);
        assert_eq!(cfg.max_tokens, 256);
        assert_eq!(cfg.top_p, 1.0);
        assert_eq!(cfg.frequency_penalty, 0.3);
        assert_eq!(cfg.presence_penalty, 0.3);
    }

    #[test]
    fn sampling_serde_roundtrip() {
        let cfg = SamplingConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: SamplingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model, cfg.model);
        assert_eq!(parsed.max_tokens, cfg.max_tokens);
    }
}
