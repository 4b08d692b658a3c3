//! SQLite 存储（rusqlite）
//!
//! 连接放在 `Arc<Mutex<Connection>>` 后，所有访问经 spawn_blocking 在阻塞线程池执行。
//! projects 表存版本化文档；chapters 表按 (project_id, chapter_number) 主键存正文，追加在同一事务内完成。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::store::{
    apply_append, check_id, check_save, ContinuityStore, ProjectDocument, StoreError,
};
use crate::story::{Chapter, Project};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件并建表
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS projects (
                 id TEXT PRIMARY KEY,
                 schema_version INTEGER NOT NULL,
                 document TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS chapters (
                 project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                 chapter_number INTEGER NOT NULL,
                 title TEXT NOT NULL,
                 content TEXT NOT NULL,
                 word_count INTEGER NOT NULL,
                 created_at TEXT NOT NULL,
                 PRIMARY KEY (project_id, chapter_number)
             );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程上持锁执行 f
    async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("connection lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// 某章正文（chapters 表）
    pub async fn chapter_text(
        &self,
        project_id: &str,
        chapter: u32,
    ) -> Result<Option<String>, StoreError> {
        let id = project_id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT content FROM chapters WHERE project_id = ?1 AND chapter_number = ?2",
                    params![id, chapter],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }
}

fn read_document(conn: &Connection, project_id: &str) -> Result<Option<Project>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT document FROM projects WHERE id = ?1",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|raw| ProjectDocument::parse(&raw)).transpose()
}

fn write_document(conn: &Connection, project: &Project) -> Result<(), StoreError> {
    let document = ProjectDocument::new(project.clone());
    conn.execute(
        "INSERT INTO projects (id, schema_version, document, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             schema_version = excluded.schema_version,
             document = excluded.document,
             updated_at = excluded.updated_at",
        params![
            project.id,
            document.schema_version,
            document.to_json()?,
            Utc::now()
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ContinuityStore for SqliteStore {
    async fn load(&self, project_id: &str) -> Result<Project, StoreError> {
        check_id(project_id)?;
        let id = project_id.to_string();
        self.call(move |conn| read_document(conn, &id)?.ok_or(StoreError::NotFound(id)))
            .await
    }

    async fn save(&self, project: &Project) -> Result<(), StoreError> {
        check_id(&project.id)?;
        let project = project.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let existing = read_document(&tx, &project.id)?;
            check_save(existing.as_ref(), &project)?;
            write_document(&tx, &project)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn append_chapter(&self, project_id: &str, chapter: Chapter) -> Result<u32, StoreError> {
        check_id(project_id)?;
        let id = project_id.to_string();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let mut project = read_document(&tx, &id)?.ok_or_else(|| StoreError::NotFound(id.clone()))?;
            let number = chapter.number();
            let title = chapter.outline.title.clone();
            let content = chapter.content.clone();
            let word_count = chapter.word_count;
            let created_at = chapter.created_at;

            let cursor = apply_append(&mut project, chapter)?;
            tx.execute(
                "INSERT INTO chapters (project_id, chapter_number, title, content, word_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, number, title, content, word_count, created_at],
            )?;
            write_document(&tx, &project)?;
            tx.commit()?;
            Ok(cursor)
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM projects ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }
}
