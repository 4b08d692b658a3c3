//! 内存存储（进程内，测试与一次性运行使用）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{apply_append, check_save, ContinuityStore, StoreError};
use crate::story::{Chapter, Project};

#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContinuityStore for MemoryStore {
    async fn load(&self, project_id: &str) -> Result<Project, StoreError> {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))
    }

    async fn save(&self, project: &Project) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        check_save(projects.get(&project.id), project)?;
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn append_chapter(&self, project_id: &str, chapter: Chapter) -> Result<u32, StoreError> {
        let mut projects = self.projects.write().await;
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))?;
        // 先在副本上追加，失败时原项目不变
        let mut updated = project.clone();
        let cursor = apply_append(&mut updated, chapter)?;
        *project = updated;
        Ok(cursor)
    }

    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.projects.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{chapter_for, planned_project};

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.load("nope").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_append_enforces_sequence() {
        let store = MemoryStore::new();
        let project = planned_project("demo", 5);
        store.save(&project).await.unwrap();

        assert_eq!(
            store
                .append_chapter("demo", chapter_for(&project, 1))
                .await
                .unwrap(),
            1
        );
        let err = store
            .append_chapter("demo", chapter_for(&project, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SequenceViolation { .. }));

        let loaded = store.load("demo").await.unwrap();
        assert_eq!(loaded.cursor(), 1);
        assert_eq!(loaded.chapters().len(), 1);
    }

    #[tokio::test]
    async fn test_list_projects_sorted() {
        let store = MemoryStore::new();
        store.save(&planned_project("b", 4)).await.unwrap();
        store.save(&planned_project("a", 4)).await.unwrap();
        assert_eq!(store.list_projects().await.unwrap(), vec!["a", "b"]);
    }
}
