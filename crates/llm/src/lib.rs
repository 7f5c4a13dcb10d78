mod client;
mod genai_client;
mod mock;
mod prompt;
mod response;
mod types;

pub use ::genai::adapter::AdapterKind;
pub use client::{JudgmentClient, OfflineJudgmentClient};
pub use freightguard_core::JudgmentError;
pub use genai_client::GenAIJudgmentClient;
pub use mock::MockJudgmentClient;
pub use prompt::build_judgment_prompt;
pub use response::{parse_judgment_response, ParseError};
pub use types::{HistoricalSummary, JudgmentRequest};
