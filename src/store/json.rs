//! JSON 目录存储
//!
//! 布局：`{root}/{project_id}/project_state.json`（版本化文档，先写临时文件再 rename）
//! 与 `{root}/{project_id}/chapters/chapter_NNN.txt`（正文导出，尽力而为）。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::store::{
    apply_append, check_id, check_save, ContinuityStore, ProjectDocument, ProjectLocks, StoreError,
};
use crate::story::{Chapter, Project};

const STATE_FILE: &str = "project_state.json";
const CHAPTERS_DIR: &str = "chapters";

pub struct JsonDirStore {
    root: PathBuf,
    locks: ProjectLocks,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: ProjectLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    fn state_path(&self, project_id: &str) -> PathBuf {
        self.project_dir(project_id).join(STATE_FILE)
    }

    /// 导出文件路径：chapters/chapter_001.txt
    pub fn chapter_path(&self, project_id: &str, chapter: u32) -> PathBuf {
        self.project_dir(project_id)
            .join(CHAPTERS_DIR)
            .join(format!("chapter_{chapter:03}.txt"))
    }

    async fn read(&self, project_id: &str) -> Result<Project, StoreError> {
        check_id(project_id)?;
        let raw = match fs::read_to_string(self.state_path(project_id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(project_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        ProjectDocument::parse(&raw)
    }

    async fn read_optional(&self, project_id: &str) -> Result<Option<Project>, StoreError> {
        match self.read(project_id).await {
            Ok(project) => Ok(Some(project)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, project: &Project) -> Result<(), StoreError> {
        let dir = self.project_dir(&project.id);
        fs::create_dir_all(&dir).await?;
        let raw = ProjectDocument::new(project.clone()).to_json()?;
        let tmp = dir.join(format!("{STATE_FILE}.tmp"));
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, self.state_path(&project.id)).await?;
        Ok(())
    }

    async fn export_chapter(&self, project_id: &str, chapter: &Chapter) -> std::io::Result<()> {
        let path = self.chapter_path(project_id, chapter.number());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = format!("{}\n\n{}\n", chapter.outline.title, chapter.content);
        fs::write(path, text).await
    }
}

#[async_trait]
impl ContinuityStore for JsonDirStore {
    async fn load(&self, project_id: &str) -> Result<Project, StoreError> {
        self.read(project_id).await
    }

    async fn save(&self, project: &Project) -> Result<(), StoreError> {
        check_id(&project.id)?;
        let _guard = self.locks.lock(&project.id).await;
        let existing = self.read_optional(&project.id).await?;
        check_save(existing.as_ref(), project)?;
        self.write(project).await
    }

    async fn append_chapter(&self, project_id: &str, chapter: Chapter) -> Result<u32, StoreError> {
        check_id(project_id)?;
        let _guard = self.locks.lock(project_id).await;
        let mut project = self.read(project_id).await?;
        let cursor = apply_append(&mut project, chapter)?;
        self.write(&project).await?;

        if let Some(chapter) = project.last_chapter() {
            if let Err(e) = self.export_chapter(project_id, chapter).await {
                tracing::warn!(
                    "Failed to export chapter {} of {}: {}",
                    chapter.number(),
                    project_id,
                    e
                );
            }
        }
        Ok(cursor)
    }

    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if fs::try_exists(entry.path().join(STATE_FILE)).await? {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
