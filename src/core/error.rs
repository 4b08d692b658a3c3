//! 流水线错误类型
//!
//! 与生成驱动配合：配置与范围错误立即返回给调用方；生成失败在驱动边界转换为「本章未产出」，
//! 项目保持可从同一章重试。

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

/// 规划、扩写、生成、持久化过程中可能出现的错误
#[derive(Error, Debug)]
pub enum NovelError {
    /// 规划输入非法（仅对本次 plan 调用致命）
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// 请求的章节号没有对应的阶段分配
    #[error("Chapter {chapter} is out of range (planned chapters: {planned})")]
    OutOfRange { chapter: u32, planned: u32 },

    /// 所有计划章节均已生成，属正常终止条件
    #[error("All {planned} planned chapters have been generated")]
    SequenceExhausted { planned: u32 },

    /// 持久化状态破坏了连续章节不变式；该项目停止写入直到人工修复
    #[error("Sequence violation in project {project_id}: {detail}")]
    SequenceViolation { project_id: String, detail: String },

    /// 文本生成协作方失败 / 超时 / 取消，可安全重试
    #[error("Generation of chapter {chapter} failed: {source}")]
    GenerationFailure {
        chapter: u32,
        #[source]
        source: LlmError,
    },

    #[error("Project not found: {0}")]
    NotFound(String),

    /// 同一项目已有一次 advance 在进行中
    #[error("Project {0} already has a generation in flight")]
    ProjectBusy(String),

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl NovelError {
    /// 是否可以原样重试（生成失败、并发拒绝）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NovelError::GenerationFailure { .. } | NovelError::ProjectBusy(_)
        )
    }
}

impl From<StoreError> for NovelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => NovelError::NotFound(id),
            StoreError::SequenceViolation { project_id, detail } => {
                NovelError::SequenceViolation { project_id, detail }
            }
            other => NovelError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failure_is_retryable() {
        let err = NovelError::GenerationFailure {
            chapter: 3,
            source: LlmError::Timeout(30),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_configuration_errors_are_not_retryable() {
        assert!(!NovelError::InvalidConfiguration("x".into()).is_retryable());
        assert!(!NovelError::SequenceExhausted { planned: 10 }.is_retryable());
        assert!(!NovelError::OutOfRange { chapter: 11, planned: 10 }.is_retryable());
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: NovelError = StoreError::NotFound("demo".into()).into();
        match err {
            NovelError::NotFound(id) => assert_eq!(id, "demo"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_store_sequence_violation_keeps_detail() {
        let err: NovelError = StoreError::SequenceViolation {
            project_id: "demo".into(),
            detail: "expected chapter 3, got 5".into(),
        }
        .into();
        assert!(matches!(err, NovelError::SequenceViolation { .. }));
        assert!(err.to_string().contains("expected chapter 3"));
    }

    #[test]
    fn test_other_store_errors_are_wrapped() {
        let err: NovelError = StoreError::VersionMismatch {
            expected: 1,
            found: 7,
        }
        .into();
        assert!(matches!(err, NovelError::Storage(StoreError::VersionMismatch { .. })));
    }
}
