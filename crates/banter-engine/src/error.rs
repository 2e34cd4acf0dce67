use banter_core::errors::CompletionError;
use banter_store::StoreError;

/// A failed session cycle. Aborts that cycle only, never the process;
/// nothing is persisted on the failing path.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Short classification string for logging and operator events.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Completion(e) => e.error_kind(),
            Self::Store(_) => "store_unavailable",
        }
    }
}
