pub mod mock;
pub mod openai;

pub use mock::{MockClient, MockCompletion};
pub use openai::OpenAiClient;
