//! 提示词渲染与聊天适配
//!
//! 把世界观 / 角色渲染为上下文文本，把 GenerationRequest 渲染为 system + user 两条消息，
//! 并由 ChatGenerator 把任意 LlmClient 适配为 TextGenerator。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{GenerationRequest, LlmClient, LlmError, Message, TextGenerator};
use crate::story::{Character, WorldSetting};

pub const SYSTEM_PERSONA: &str = "你是一个专业的修仙小说作家，擅长创作传统修仙小说。";

/// 世界观摘要：境界、门派、法术体系
pub fn world_context(world: &WorldSetting) -> String {
    let sects: Vec<String> = world
        .sects
        .iter()
        .map(|s| format!("{}（{}，{}）", s.name, s.alignment, s.specialty))
        .collect();
    let abilities: Vec<String> = world
        .ability_system
        .iter()
        .map(|(kind, items)| format!("{kind}：{}", items.join("、")))
        .collect();
    format!(
        "- 修炼等级：{}\n- 门派信息：{}\n- 法术体系：{}",
        world.cultivation_levels.join(" → "),
        sects.join("；"),
        abilities.join("；")
    )
}

/// 角色信息（JSON，键为角色名）
pub fn character_context(characters: &[Character]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = characters
        .iter()
        .filter_map(|c| serde_json::to_value(c).ok().map(|v| (c.name.clone(), v)))
        .collect();
    serde_json::to_string_pretty(&map).unwrap_or_default()
}

/// 章节正文提示词
pub fn render_chapter_prompt(request: &GenerationRequest) -> String {
    let outline = serde_json::to_string_pretty(&request.outline_context).unwrap_or_default();
    format!(
        "请根据以下大纲写出第{number}章的完整内容：\n\n\
         章节大纲：\n{outline}\n\n\
         角色信息：\n{characters}\n\n\
         世界观背景：\n{world}\n\n\
         上一章内容摘要：\n{continuity}\n\n\
         写作要求：\n\
         1. 字数：约{words}字，不超过{max}字\n\
         2. 结构：起承转合，有紧张感和悬念\n\
         3. 使用中文全角标点符号，段落开头使用全角空格缩进\n\
         4. 保持故事连贯性，推进主线剧情，刻画角色成长\n\n\
         请直接输出章节正文内容，不需要额外说明。",
        number = request.chapter_number(),
        characters = request.character_context,
        world = request.world_context,
        continuity = request.continuity_excerpt,
        words = request.outline_context.target_word_count,
        max = request.max_length,
    )
}

/// 聊天客户端到章节生成器的适配
pub struct ChatGenerator {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl ChatGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            system_prompt: SYSTEM_PERSONA.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.client.token_usage()
    }
}

#[async_trait]
impl TextGenerator for ChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(render_chapter_prompt(request)),
        ];
        let text = self.client.complete(&messages).await?;
        Ok(text.chars().take(request.max_length).collect())
    }

    fn name(&self) -> &str {
        "chat"
    }
}
