pub mod config;
pub mod gateway;
pub mod gemini;
pub mod prompts;
pub mod provider;

pub use config::ProviderConfig;
pub use gateway::AiGateway;
pub use gemini::GeminiProvider;
pub use prompts::{build_summary_prompt, build_task_prompt, PromptCatalog, SUMMARY_PROMPT};
pub use provider::{
    ContentPart, GenerateRequest, GenerateResponse, GenerationOptions, ModelProvider,
    ProviderFailure, SpeechOptions,
};
