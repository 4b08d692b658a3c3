//! 本地模板生成器（离线、确定性）
//!
//! 不调用任何服务：用章节大纲填充固定段落模板，适合演示与离线跑通整条流水线。同一请求总是得到同一正文。

use async_trait::async_trait;

use crate::llm::{GenerationRequest, LlmError, TextGenerator};

const OPENINGS: &[&str] = &[
    "晨光熹微，青云山脉在薄雾中若隐若现，如同仙境一般。",
    "夜色如墨，山风穿过松林，带来阵阵清冷的灵气。",
    "烈日当空，演武场上剑气纵横，弟子们的呼喝声此起彼伏。",
];

const CLOSINGS: &[&str] = &[
    "这一刻，林逸知道，自己的修仙之路才刚刚开始……",
    "他深吸一口气，眼中的光芒愈发坚定。",
    "远处钟声响起，新的考验正在等待着他。",
];

#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    fn render(request: &GenerationRequest) -> String {
        let outline = &request.outline_context;
        let pick = outline.chapter_number as usize;
        let mut paragraphs = vec![
            outline.title.clone(),
            String::new(),
            format!("　　{}", OPENINGS[pick % OPENINGS.len()]),
        ];
        if request.continuity_excerpt.chars().count() > 20 {
            paragraphs.push("　　前事未了，余波犹在，林逸心中仍回想着先前发生的一切。".to_string());
        }
        for event in &outline.main_events {
            paragraphs.push(format!("　　{event}。林逸凝神静气，将每一个细节都记在心里。"));
        }
        if !outline.character_development.is_empty() {
            paragraphs.push(format!("　　{}。", outline.character_development));
        }
        for conflict in &outline.conflicts {
            paragraphs.push(format!("　　{conflict}如阴云般笼罩，却也磨砺着他的道心。"));
        }
        paragraphs.push(format!("　　{}", CLOSINGS[pick % CLOSINGS.len()]));
        paragraphs.join("\n")
    }
}

#[async_trait]
impl TextGenerator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let text: String = Self::render(request)
            .chars()
            .take(request.max_length)
            .collect();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "template"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::ChapterOutline;

    fn request(chapter: u32) -> GenerationRequest {
        GenerationRequest {
            outline_context: ChapterOutline {
                chapter_number: chapter,
                title: format!("第{chapter}章 拜入青云门相关情节"),
                main_events: vec!["拜入青云门的具体展开".into(), "角色互动".into()],
                character_development: "主角在入门期的成长".into(),
                plot_progression: String::new(),
                progress_marker: String::new(),
                conflicts: vec!["门内竞争".into()],
                target_word_count: 3000,
            },
            world_context: String::new(),
            character_context: String::new(),
            continuity_excerpt: "故事开始".into(),
            max_length: 5000,
        }
    }

    #[tokio::test]
    async fn test_template_output_is_deterministic() {
        let generator = TemplateGenerator::new();
        let a = generator.generate(&request(12)).await.unwrap();
        let b = generator.generate(&request(12)).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("第12章 拜入青云门相关情节"));
        assert!(a.contains("门内竞争"));
    }

    #[tokio::test]
    async fn test_template_output_respects_max_length() {
        let mut req = request(1);
        req.max_length = 30;
        let text = TemplateGenerator::new().generate(&req).await.unwrap();
        assert_eq!(text.chars().count(), 30);
    }
}
