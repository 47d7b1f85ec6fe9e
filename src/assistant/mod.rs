// ABOUTME: Natural-language query assistant over the loaded sales database
// ABOUTME: Prompting, model access, read-only execution, and session history

pub mod history;
pub mod llm;
pub mod prompt;
pub mod query;

use anyhow::Result;
use std::fmt;

use crate::config::{Secrets, TargetConfig, OPENAI_API};

pub use history::{HistoryEntry, QueryHistory};
pub use llm::{OpenAiClient, DEFAULT_MODEL};
pub use prompt::{build_prompt, extract_sql};
pub use query::{run_read_only_query, QueryResult};

/// Configuration for the assistant binary
#[derive(Clone)]
pub struct AssistantConfig {
    pub target: TargetConfig,
    pub openai_api_key: String,
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("target", &self.target)
            .field("openai_api_key", &"***")
            .finish()
    }
}

impl AssistantConfig {
    pub fn from_secrets(secrets: &Secrets) -> Result<Self> {
        Ok(Self {
            target: TargetConfig::from_secrets(secrets)?,
            openai_api_key: secrets.require(OPENAI_API)?.to_string(),
        })
    }
}
