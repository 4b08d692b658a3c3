//! 文本生成抽象
//!
//! 两层 trait：LlmClient 面向聊天补全后端（OpenAI 兼容 / DeepSeek / Mock），
//! TextGenerator 面向生成驱动（输入结构化的章节请求，输出正文）。ChatGenerator 把前者适配成后者。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::Message;
use crate::story::ChapterOutline;

/// 生成协作方的失败类型；对流水线而言全部等价于「本章未产出」
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    /// 超时（毫秒）
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Rate limited, retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },
}

/// 单章生成请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub outline_context: ChapterOutline,
    /// 渲染后的世界观摘要
    pub world_context: String,
    /// 渲染后的角色信息
    pub character_context: String,
    /// 上一章末尾节选；第一章为「故事开始」
    pub continuity_excerpt: String,
    /// 正文最大字符数
    pub max_length: usize,
}

impl GenerationRequest {
    pub fn chapter_number(&self) -> u32 {
        self.outline_context.chapter_number
    }
}

/// 聊天补全客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 累计 token 使用：(prompt, completion, total)；默认 (0, 0, 0)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 章节正文生成器（生成驱动唯一依赖的协作方）
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;

    /// 日志用名称
    fn name(&self) -> &str {
        "generator"
    }
}
