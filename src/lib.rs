//! Tianshu - 长篇修仙小说分阶段生成流水线
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、项目状态、生成监管
//! - **llm**: 生成后端（OpenAI 兼容 / DeepSeek / 本地模板 / 测试脚本）
//! - **observability**: 日志初始化
//! - **store**: 项目状态持久化（内存 / JSON 目录 / SQLite）
//! - **story**: 阶段规划、大纲扩写、逐章生成、进度报告

pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod store;
pub mod story;

pub use crate::core::{NovelError, ProjectStatus};
pub use crate::store::{create_store, ContinuityStore};
pub use crate::story::{GenerationDriver, ProgressReporter, Project, ProjectSeed};
