//! 项目生成状态
//!
//! 状态不单独持久化，而是由游标与大纲长度投影得到：NotStarted → InProgress → Complete。

use serde::Serialize;

use crate::story::Project;

/// 项目所处阶段（由 cursor 与大纲长度推导）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProjectStatus {
    /// 尚未生成任何章节
    NotStarted,
    /// 已生成部分章节
    InProgress,
    /// 游标已到达大纲末尾
    Complete,
}

impl ProjectStatus {
    pub fn of(project: &Project) -> Self {
        let planned = project.planned_chapters();
        if planned > 0 && project.cursor >= planned {
            ProjectStatus::Complete
        } else if project.cursor == 0 {
            ProjectStatus::NotStarted
        } else {
            ProjectStatus::InProgress
        }
    }

    pub fn is_complete(self) -> bool {
        self == ProjectStatus::Complete
    }
}
