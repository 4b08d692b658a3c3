//! 项目状态存储抽象层
//!
//! 统一的持久化接口，支持内存、JSON 目录、SQLite 三种实现。所有实现共享同一份版本化文档格式、
//! 同一套加载校验与追加规则；append_chapter 在每个项目上串行执行。

pub mod json;
pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::config::AppConfig;
use crate::story::{Chapter, Project};

pub use json::JsonDirStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// 当前文档格式版本
pub const SCHEMA_VERSION: u32 = 1;

/// 存储层错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(String),

    /// 追加的章节号不连续，或已存数据破坏了章节 / 游标不变式
    #[error("Sequence violation in project {project_id}: {detail}")]
    SequenceViolation { project_id: String, detail: String },

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid project id: {0:?}")]
    InvalidId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// 持久化的项目文档（带格式版本）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDocument {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub project: Project,
}

impl ProjectDocument {
    pub fn new(project: Project) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            project,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 解析并校验：先比对版本，再反序列化，最后检查章节 / 大纲 / 游标不变式
    pub fn parse(raw: &str) -> Result<Project, StoreError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let found = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0) as u32;
        if found != SCHEMA_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
        let document: ProjectDocument = serde_json::from_value(value)?;
        let project = document.project;
        project
            .validate()
            .map_err(|detail| StoreError::SequenceViolation {
                project_id: project.id.clone(),
                detail,
            })?;
        Ok(project)
    }
}

/// 项目状态存储接口
#[async_trait]
pub trait ContinuityStore: Send + Sync {
    /// 读取项目；不存在返回 NotFound，数据损坏返回 SequenceViolation / VersionMismatch
    async fn load(&self, project_id: &str) -> Result<Project, StoreError>;

    /// 整体写入（创建或覆盖）；不允许丢弃已存章节
    async fn save(&self, project: &Project) -> Result<(), StoreError>;

    /// 原子追加一章：章节号必须等于游标 + 1，返回新游标
    async fn append_chapter(&self, project_id: &str, chapter: Chapter) -> Result<u32, StoreError>;

    /// 全部项目 ID（升序）
    async fn list_projects(&self) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, project_id: &str) -> Result<bool, StoreError> {
        match self.load(project_id).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// 覆盖写入前的检查：自身不变式成立，且不丢弃已存章节
pub(crate) fn check_save(existing: Option<&Project>, incoming: &Project) -> Result<(), StoreError> {
    incoming
        .validate()
        .map_err(|detail| StoreError::SequenceViolation {
            project_id: incoming.id.clone(),
            detail,
        })?;
    if let Some(existing) = existing {
        if incoming.cursor() < existing.cursor() {
            return Err(StoreError::SequenceViolation {
                project_id: incoming.id.clone(),
                detail: format!(
                    "save would drop chapters {}..={}",
                    incoming.cursor() + 1,
                    existing.cursor()
                ),
            });
        }
    }
    Ok(())
}

/// 追加规则：委托给 Project，失败转为 SequenceViolation
pub(crate) fn apply_append(project: &mut Project, chapter: Chapter) -> Result<u32, StoreError> {
    project
        .push_chapter(chapter)
        .map_err(|detail| StoreError::SequenceViolation {
            project_id: project.id.clone(),
            detail,
        })
}

/// 项目 ID 会成为目录名 / 主键：拒绝空串、路径分隔符与 `..`
pub(crate) fn check_id(project_id: &str) -> Result<(), StoreError> {
    let bad = project_id.is_empty()
        || project_id.contains(|c| c == '/' || c == '\\')
        || project_id == "."
        || project_id.contains("..");
    if bad {
        return Err(StoreError::InvalidId(project_id.to_string()));
    }
    Ok(())
}

/// 按项目 ID 分配的异步互斥锁（串行化同一项目的读改写）
#[derive(Debug, Default)]
pub struct ProjectLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(project_id.to_string()).or_default())
        };
        mutex.lock_owned().await
    }
}

/// 按配置创建存储后端；未知 backend 记录警告并使用 JSON 目录
pub fn create_store(cfg: &AppConfig) -> Result<Arc<dyn ContinuityStore>, StoreError> {
    let path = cfg.storage_path();
    match cfg.storage.backend.to_lowercase().as_str() {
        "memory" => {
            tracing::info!("Using in-memory project store");
            Ok(Arc::new(MemoryStore::new()))
        }
        "sqlite" => {
            tracing::info!("Using SQLite project store at {}", path.display());
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        "json" => {
            tracing::info!("Using JSON project store at {}", path.display());
            Ok(Arc::new(JsonDirStore::new(path)))
        }
        other => {
            tracing::warn!(
                "Unknown storage backend {:?}, using JSON project store at {}",
                other,
                path.display()
            );
            Ok(Arc::new(JsonDirStore::new(path)))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::story::{
        default_phase_templates, Chapter, OutlineExpander, PhasePlanner, Project,
    };

    /// 已规划 target 章、尚未生成的项目
    pub fn planned_project(id: &str, target: u32) -> Project {
        let phases = PhasePlanner::plan(target, &default_phase_templates()).unwrap();
        let outline = OutlineExpander::default().expand(&phases).unwrap();
        let mut project = Project::new(id, "修仙传说");
        project.install_plan(phases, outline);
        project
    }

    pub fn chapter_for(project: &Project, number: u32) -> Chapter {
        Chapter {
            outline: project.outline_for(number).unwrap().clone(),
            content: format!("　　第{number}章正文，林逸踏上修仙之路。"),
            word_count: 16,
            key_plot_points: vec!["修仙相关情节".into()],
            character_changes: vec![],
            next_chapter_setup: String::new(),
            summary: format!("第{number}章摘要"),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_document_roundtrip_validates() {
        let mut project = planned_project("demo", 10);
        let ch1 = chapter_for(&project, 1);
        apply_append(&mut project, ch1).unwrap();
        let raw = ProjectDocument::new(project.clone()).to_json().unwrap();
        assert_eq!(ProjectDocument::parse(&raw).unwrap(), project);
    }

    #[test]
    fn test_document_with_other_version_is_rejected() {
        let mut value =
            serde_json::to_value(ProjectDocument::new(planned_project("demo", 4))).unwrap();
        value["schema_version"] = serde_json::json!(2);
        let err = ProjectDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_document_with_unknown_field_is_rejected() {
        let mut value =
            serde_json::to_value(ProjectDocument::new(planned_project("demo", 4))).unwrap();
        value["project"]["mood"] = serde_json::json!("happy");
        let err = ProjectDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn test_document_with_unknown_nested_field_is_rejected() {
        let mut clean =
            serde_json::to_value(ProjectDocument::new(planned_project("demo", 4))).unwrap();
        clean["project"]["world"] =
            serde_json::to_value(crate::story::default_world()).unwrap();
        for pointer in ["/project/phases/0/progression", "/project/world/sects/0"] {
            let mut value = clean.clone();
            value
                .pointer_mut(pointer)
                .and_then(|v| v.as_object_mut())
                .unwrap()
                .insert("rumour".into(), serde_json::json!("x"));
            let err = ProjectDocument::parse(&value.to_string()).unwrap_err();
            assert!(matches!(err, StoreError::Json(_)), "{pointer}");
        }
    }

    #[test]
    fn test_document_with_broken_cursor_is_sequence_violation() {
        let mut value =
            serde_json::to_value(ProjectDocument::new(planned_project("demo", 4))).unwrap();
        value["project"]["cursor"] = serde_json::json!(3);
        let err = ProjectDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, StoreError::SequenceViolation { .. }));
    }

    #[test]
    fn test_document_with_huge_phase_is_sequence_violation() {
        let mut value =
            serde_json::to_value(ProjectDocument::new(planned_project("demo", 4))).unwrap();
        value["project"]["phases"][0]["chapter_count"] = serde_json::json!(u32::MAX);
        let err = ProjectDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, StoreError::SequenceViolation { .. }));
    }

    #[test]
    fn test_check_save_refuses_to_drop_chapters() {
        let fresh = planned_project("demo", 4);
        let mut advanced = fresh.clone();
        let ch1 = chapter_for(&advanced, 1);
        apply_append(&mut advanced, ch1).unwrap();
        assert!(check_save(Some(&fresh), &advanced).is_ok());
        assert!(matches!(
            check_save(Some(&advanced), &fresh),
            Err(StoreError::SequenceViolation { .. })
        ));
    }

    #[test]
    fn test_check_id() {
        assert!(check_id("novel_1").is_ok());
        assert!(check_id("").is_err());
        assert!(check_id("../etc").is_err());
        assert!(check_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_project_locks_serialize_same_id() {
        let locks = Arc::new(ProjectLocks::new());
        let guard = locks.lock("a").await;
        let other = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock("a").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!other.is_finished());
        let _b = locks.lock("b").await;
        drop(guard);
        other.await.unwrap();
    }
}
