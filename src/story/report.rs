//! 进度报告（只读投影，不修改项目）

use serde::Serialize;

use crate::core::ProjectStatus;
use crate::story::types::{LogEntry, PhasePlan, Project};

/// 报告中保留的最近日志条数
pub const RECENT_LOG_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub name: String,
    pub ordinal: usize,
    pub first_chapter: u32,
    pub last_chapter: Option<u32>,
    pub theme: String,
}

impl From<&PhasePlan> for PhaseSummary {
    fn from(phase: &PhasePlan) -> Self {
        Self {
            name: phase.name.clone(),
            ordinal: phase.ordinal,
            first_chapter: phase.first_chapter,
            last_chapter: phase.last_chapter(),
            theme: phase.theme.clone(),
        }
    }
}

/// 故事元素计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryElements {
    pub characters: usize,
    pub sects: usize,
    pub regions: usize,
    pub cultivation_levels: usize,
    pub artifacts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestChapter {
    pub number: u32,
    pub title: String,
    pub summary: String,
    pub key_plot_points: Vec<String>,
    pub next_chapter_setup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub project_id: String,
    pub title: String,
    pub status: ProjectStatus,
    pub cursor: u32,
    pub planned_chapters: u32,
    /// 一位小数的百分比，如 "16.7%"
    pub completion_rate: String,
    pub current_phase: Option<PhaseSummary>,
    pub total_words: u64,
    pub average_words: u64,
    pub estimated_total_words: u64,
    pub remaining_words: u64,
    pub story_elements: StoryElements,
    pub latest_chapter: Option<LatestChapter>,
    pub recent_log: Vec<LogEntry>,
}

pub struct ProgressReporter;

impl ProgressReporter {
    pub fn report(project: &Project) -> ProgressReport {
        let cursor = project.cursor();
        let planned = project.planned_chapters();
        let total_words: u64 = project.chapters().iter().map(|c| c.word_count as u64).sum();
        let estimated_total_words: u64 = project
            .outline()
            .iter()
            .map(|o| o.target_word_count as u64)
            .sum();
        let remaining_words: u64 = project
            .outline()
            .iter()
            .skip(cursor as usize)
            .map(|o| o.target_word_count as u64)
            .sum();
        let log = project.log();

        ProgressReport {
            project_id: project.id.clone(),
            title: project.title.clone(),
            status: ProjectStatus::of(project),
            cursor,
            planned_chapters: planned,
            completion_rate: completion_rate(cursor, planned),
            current_phase: Self::current_phase(project.phases(), cursor).map(PhaseSummary::from),
            total_words,
            average_words: if cursor == 0 {
                0
            } else {
                total_words / cursor as u64
            },
            estimated_total_words,
            remaining_words,
            story_elements: StoryElements {
                characters: project.characters.len(),
                sects: project.world.sects.len(),
                regions: project.world.regions.len(),
                cultivation_levels: project.world.cultivation_levels.len(),
                artifacts: project.world.artifacts.len(),
            },
            latest_chapter: project.last_chapter().map(|c| LatestChapter {
                number: c.number(),
                title: c.outline.title.clone(),
                summary: c.summary.clone(),
                key_plot_points: c.key_plot_points.clone(),
                next_chapter_setup: c.next_chapter_setup.clone(),
            }),
            recent_log: log[log.len().saturating_sub(RECENT_LOG_WINDOW)..].to_vec(),
        }
    }

    /// 游标所在阶段：cursor 为 0 时取第一阶段，超出全部阶段时取最后一个
    pub fn current_phase(phases: &[PhasePlan], cursor: u32) -> Option<&PhasePlan> {
        if cursor == 0 {
            return phases.first();
        }
        phases
            .iter()
            .find(|p| p.contains(cursor))
            .or_else(|| phases.last())
    }
}

fn completion_rate(cursor: u32, planned: u32) -> String {
    if planned == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", cursor as f64 * 100.0 / planned as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::{default_phase_templates, OutlineExpander, PhasePlanner};

    fn planned(target: u32) -> Project {
        let phases = PhasePlanner::plan(target, &default_phase_templates()).unwrap();
        let outline = OutlineExpander::default().expand(&phases).unwrap();
        let mut project = Project::new("demo", "修仙传说");
        project.install_plan(phases, outline);
        project
    }

    #[test]
    fn test_current_phase_lookup() {
        let project = planned(300);
        let phases = project.phases();
        assert_eq!(ProgressReporter::current_phase(phases, 0).unwrap().name, "入门期");
        assert_eq!(ProgressReporter::current_phase(phases, 25).unwrap().name, "入门期");
        assert_eq!(ProgressReporter::current_phase(phases, 50).unwrap().name, "入门期");
        assert_eq!(ProgressReporter::current_phase(phases, 51).unwrap().name, "成长期");
        assert_eq!(ProgressReporter::current_phase(phases, 300).unwrap().name, "巅峰期");
        assert!(ProgressReporter::current_phase(&[], 3).is_none());
    }

    #[test]
    fn test_completion_rate_one_decimal() {
        assert_eq!(completion_rate(1, 6), "16.7%");
        assert_eq!(completion_rate(0, 300), "0.0%");
        assert_eq!(completion_rate(300, 300), "100.0%");
        assert_eq!(completion_rate(0, 0), "0.0%");
    }

    #[test]
    fn test_report_on_fresh_project() {
        let project = planned(10);
        let report = ProgressReporter::report(&project);
        assert_eq!(report.status, ProjectStatus::NotStarted);
        assert_eq!(report.completion_rate, "0.0%");
        assert_eq!(report.average_words, 0);
        assert_eq!(report.estimated_total_words, 30_000);
        assert_eq!(report.remaining_words, 30_000);
        assert!(report.latest_chapter.is_none());
        assert_eq!(report.current_phase.unwrap().name, "入门期");
    }

    #[test]
    fn test_remaining_words_counts_unwritten_outline() {
        let mut project = planned(10);
        for n in 1..=5 {
            let mut chapter = crate::store::test_support::chapter_for(&project, n);
            chapter.word_count = 6000;
            project.push_chapter(chapter).unwrap();
        }
        let report = ProgressReporter::report(&project);
        assert_eq!(report.total_words, 30_000);
        assert_eq!(report.estimated_total_words, 30_000);
        assert_eq!(report.remaining_words, 15_000);
    }

    #[test]
    fn test_recent_log_is_trailing_window() {
        let mut project = planned(10);
        for i in 0..15 {
            project.record("规划", format!("步骤{i}"));
        }
        let report = ProgressReporter::report(&project);
        assert_eq!(report.recent_log.len(), RECENT_LOG_WINDOW);
        assert_eq!(report.recent_log[0].details, "步骤5");
        assert_eq!(report.recent_log[9].details, "步骤14");
    }
}
