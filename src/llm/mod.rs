//! LLM 层：聊天客户端（OpenAI 兼容 / DeepSeek / Mock）、章节生成器（Chat 适配 / 本地模板 / 脚本）

pub mod deepseek;
pub mod local;
pub mod message;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use deepseek::{create_deepseek_client, deepseek_model, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use local::TemplateGenerator;
pub use message::{Message, Role};
pub use mock::{MockLlmClient, ScriptedGenerator};
pub use openai::{OpenAiClient, TokenUsage};
pub use prompt::{ChatGenerator, SYSTEM_PERSONA};
pub use traits::{GenerationRequest, LlmClient, LlmError, TextGenerator};

/// 按配置与环境变量选择生成后端
///
/// provider 为 template 时直接使用本地模板；否则有 DeepSeek Key（或 provider=deepseek 且有 OpenAI Key）走 DeepSeek，
/// 有 OpenAI Key 走 OpenAI；都没有时退回本地模板。
pub fn create_generator(cfg: &AppConfig) -> Arc<dyn TextGenerator> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "template" || provider == "local" {
        tracing::info!("Using local template generator");
        return Arc::new(TemplateGenerator::new());
    }

    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    let deepseek = if use_deepseek {
        create_deepseek_client(&cfg.llm)
    } else {
        None
    };

    let client: Arc<dyn LlmClient> = if let Some(client) = deepseek {
        tracing::info!("Using DeepSeek LLM ({})", deepseek_model(&cfg.llm));
        Arc::new(client)
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set, falling back to local template generator");
        return Arc::new(TemplateGenerator::new());
    };

    Arc::new(ChatGenerator::new(client))
}
