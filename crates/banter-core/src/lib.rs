pub mod client;
pub mod errors;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod turns;

pub use client::{CompletionClient, SamplingConfig};
pub use errors::CompletionError;
pub use ids::ConversationKey;
pub use ledger::{Ledger, MAX_HISTORY};
pub use turns::{Role, Turn};
