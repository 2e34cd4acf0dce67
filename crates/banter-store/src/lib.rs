pub mod conversations;
pub mod database;
pub mod error;
pub mod schema;

pub use conversations::ConversationRepo;
pub use database::Database;
pub use error::StoreError;
