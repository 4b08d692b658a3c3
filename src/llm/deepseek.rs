//! DeepSeek 写作后端：OpenAI 兼容接口，模型与地址来自 `[llm]` / `[llm.deepseek]`

use crate::config::LlmSection;
use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 章节写作所用模型：`[llm.deepseek].model` 优先；`[llm].model` 仅在是 deepseek 系模型时采用
pub fn deepseek_model(llm: &LlmSection) -> String {
    if let Some(model) = &llm.deepseek.model {
        return model.clone();
    }
    if llm.model.starts_with("deepseek") {
        return llm.model.clone();
    }
    DEEPSEEK_CHAT.to_string()
}

/// 凭 `DEEPSEEK_API_KEY`（或兼容的 `OPENAI_API_KEY`）创建客户端；都未设置时返回 None
pub fn create_deepseek_client(llm: &LlmSection) -> Option<OpenAiClient> {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok()?;
    let base_url = llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
    Some(OpenAiClient::new(
        Some(base_url),
        &deepseek_model(llm),
        Some(api_key.as_str()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_model_wins() {
        let mut llm = LlmSection::default();
        llm.deepseek.model = Some(DEEPSEEK_REASONER.to_string());
        assert_eq!(deepseek_model(&llm), DEEPSEEK_REASONER);
    }

    #[test]
    fn test_foreign_top_level_model_is_ignored() {
        let mut llm = LlmSection::default();
        assert_eq!(deepseek_model(&llm), DEEPSEEK_CHAT);
        llm.model = "gpt-4o-mini".to_string();
        assert_eq!(deepseek_model(&llm), DEEPSEEK_CHAT);
    }
}
