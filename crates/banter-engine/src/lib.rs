pub mod admin;
pub mod error;
pub mod prompt;
pub mod session;

pub use error::EngineError;
pub use session::{EngineConfig, InboundMessage, Outcome, SessionEngine, REFUSAL_REPLY};
