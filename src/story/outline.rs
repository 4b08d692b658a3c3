//! 大纲扩写器
//!
//! 先按阶段 / 关键事件 / 章节做通用合成，再按章节号查表覆盖开篇章节。覆盖表是数据而非分支，新增覆盖只需追加条目。

use crate::core::NovelError;
use crate::story::types::{ChapterOutline, PhasePlan};

/// 每章目标字数（配置常量，不做计算）
pub const DEFAULT_WORD_COUNT_TARGET: u32 = 3000;

/// 手写的开篇大纲（按章节号查表）
#[derive(Debug, Clone, Copy)]
pub struct OutlineOverride {
    pub chapter_number: u32,
    pub title: &'static str,
    pub main_events: &'static [&'static str],
    pub character_development: &'static str,
    pub plot_progression: &'static str,
    pub progress_marker: &'static str,
    pub conflicts: &'static [&'static str],
}

impl OutlineOverride {
    fn apply(&self, target_word_count: u32) -> ChapterOutline {
        ChapterOutline {
            chapter_number: self.chapter_number,
            title: self.title.to_string(),
            main_events: self.main_events.iter().map(|s| s.to_string()).collect(),
            character_development: self.character_development.to_string(),
            plot_progression: self.plot_progression.to_string(),
            progress_marker: self.progress_marker.to_string(),
            conflicts: self.conflicts.iter().map(|s| s.to_string()).collect(),
            target_word_count,
        }
    }
}

pub const OUTLINE_OVERRIDES: &[OutlineOverride] = &[
    OutlineOverride {
        chapter_number: 1,
        title: "第一章 山村少年",
        main_events: &[
            "介绍主角林逸的出身和现状",
            "展现山村的贫困生活",
            "意外发现修仙传承",
            "决心踏上修仙之路",
        ],
        character_development: "从普通山村少年到有志修仙者的转变",
        plot_progression: "故事开端，为后续修仙之路做铺垫",
        progress_marker: "尚未开始修炼，但获得修仙机缘",
        conflicts: &["内心的渴望与现实的差距", "对未知世界的恐惧"],
    },
    OutlineOverride {
        chapter_number: 2,
        title: "第二章 初修练气",
        main_events: &[
            "暗中修炼《基础练气法》",
            "第一次将灵气引入体内",
            "青云门长老王青松到访山村",
            "被发现极品五行灵根，获得入门考核机会",
        ],
        character_development: "逐渐适应修仙者的身份，从隐忍到坚定",
        plot_progression: "建立修仙世界观，为拜入青云门做准备",
        progress_marker: "踏入练气期门槛",
        conflicts: &["修炼的困难", "隐瞒修炼与被发现的紧张"],
    },
];

/// 大纲扩写器
#[derive(Debug, Clone)]
pub struct OutlineExpander {
    word_count_target: u32,
    overrides: &'static [OutlineOverride],
}

impl Default for OutlineExpander {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_COUNT_TARGET)
    }
}

impl OutlineExpander {
    pub fn new(word_count_target: u32) -> Self {
        Self {
            word_count_target,
            overrides: OUTLINE_OVERRIDES,
        }
    }

    pub fn with_overrides(mut self, overrides: &'static [OutlineOverride]) -> Self {
        self.overrides = overrides;
        self
    }

    /// 为 1..=总章节数 的每一章生成一条大纲
    pub fn expand(&self, phases: &[PhasePlan]) -> Result<Vec<ChapterOutline>, NovelError> {
        let planned = planned_total(phases)?;
        let mut outlines = (1..=planned)
            .map(|n| self.expand_chapter(phases, n))
            .collect::<Result<Vec<_>, _>>()?;

        for entry in self.overrides {
            if let Some(slot) = entry
                .chapter_number
                .checked_sub(1)
                .and_then(|i| outlines.get_mut(i as usize))
            {
                *slot = entry.apply(self.word_count_target);
            }
        }
        Ok(outlines)
    }

    /// 通用合成单章大纲（不含覆盖）
    pub fn expand_chapter(
        &self,
        phases: &[PhasePlan],
        chapter: u32,
    ) -> Result<ChapterOutline, NovelError> {
        let planned = planned_total(phases)?;
        let phase = phases
            .iter()
            .find(|p| p.contains(chapter))
            .ok_or(NovelError::OutOfRange { chapter, planned })?;

        let outline = match phase.event_for(chapter) {
            Some(event) => ChapterOutline {
                chapter_number: chapter,
                title: format!("第{chapter}章 {event}相关情节"),
                main_events: vec![
                    format!("{event}的具体展开"),
                    "角色互动".to_string(),
                    "剧情推进".to_string(),
                ],
                character_development: format!("主角在{}的成长", phase.name),
                plot_progression: format!("推进{event}相关剧情"),
                progress_marker: phase.progression.marker(),
                conflicts: phase.conflicts.clone(),
                target_word_count: self.word_count_target,
            },
            // 整除余数：不归属任何关键事件，按阶段主题合成
            None => {
                let theme = if phase.theme.is_empty() {
                    phase.name.as_str()
                } else {
                    phase.theme.as_str()
                };
                ChapterOutline {
                    chapter_number: chapter,
                    title: format!("第{chapter}章 {}", phase.name),
                    main_events: vec![
                        format!("{theme}相关情节"),
                        "角色互动".to_string(),
                        "剧情推进".to_string(),
                    ],
                    character_development: format!("主角在{}的成长", phase.name),
                    plot_progression: format!("承接{}主线", phase.name),
                    progress_marker: phase.progression.marker(),
                    conflicts: phase.conflicts.clone(),
                    target_word_count: self.word_count_target,
                }
            }
        };
        Ok(outline)
    }
}

/// 各阶段章节数之和；溢出 u32 时视为非法规划
fn planned_total(phases: &[PhasePlan]) -> Result<u32, NovelError> {
    phases.iter().try_fold(0u32, |total, phase| {
        total.checked_add(phase.chapter_count).ok_or_else(|| {
            NovelError::InvalidConfiguration(format!(
                "phase {} chapter count {} overflows the chapter range",
                phase.name, phase.chapter_count
            ))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::planner::{default_phase_templates, PhasePlanner, PhaseTemplate};

    #[test]
    fn test_expand_is_dense_and_complete() {
        for target in [4, 7, 10, 33, 300] {
            let phases = PhasePlanner::plan(target, &default_phase_templates()).unwrap();
            let outlines = OutlineExpander::default().expand(&phases).unwrap();
            assert_eq!(outlines.len() as u32, target);
            for (i, o) in outlines.iter().enumerate() {
                assert_eq!(o.chapter_number, i as u32 + 1);
            }
        }
    }

    #[test]
    fn test_expand_is_idempotent() {
        let phases = PhasePlanner::plan(120, &default_phase_templates()).unwrap();
        let expander = OutlineExpander::default();
        assert_eq!(expander.expand(&phases).unwrap(), expander.expand(&phases).unwrap());
    }

    #[test]
    fn test_first_two_chapters_use_overrides() {
        let phases = PhasePlanner::plan(300, &default_phase_templates()).unwrap();
        let outlines = OutlineExpander::default().expand(&phases).unwrap();
        assert_eq!(outlines[0].title, "第一章 山村少年");
        assert_eq!(outlines[1].title, "第二章 初修练气");
        assert_eq!(outlines[2].title, "第3章 获得传承相关情节");
        assert_eq!(outlines[0].target_word_count, DEFAULT_WORD_COUNT_TARGET);
    }

    #[test]
    fn test_generic_outline_carries_phase_marker_and_conflicts() {
        let phases = PhasePlanner::plan(300, &default_phase_templates()).unwrap();
        let outlines = OutlineExpander::new(2500).expand(&phases).unwrap();
        let ch60 = &outlines[59];
        assert_eq!(ch60.title, "第60章 门派试炼相关情节");
        assert_eq!(ch60.progress_marker, "修为提升-筑基初期向金丹初期发展");
        assert_eq!(ch60.conflicts, vec!["生死历练", "情感纠葛", "宗门危机"]);
        assert_eq!(ch60.target_word_count, 2500);
    }

    #[test]
    fn test_unslotted_tail_gets_phase_level_outline() {
        let templates = vec![PhaseTemplate::new("入门期", 1.0, vec!["获得传承", "拜入青云门"])
            .with_theme("初入修仙世界")];
        let phases = PhasePlanner::plan(5, &templates).unwrap();
        let outlines = OutlineExpander::default().with_overrides(&[]).expand(&phases).unwrap();
        assert_eq!(outlines.len(), 5);
        assert_eq!(outlines[3].title, "第4章 拜入青云门相关情节");
        assert_eq!(outlines[4].title, "第5章 入门期");
        assert_eq!(outlines[4].main_events[0], "初入修仙世界相关情节");
    }

    #[test]
    fn test_chapter_without_phase_is_out_of_range() {
        let phases = PhasePlanner::plan(10, &default_phase_templates()).unwrap();
        let err = OutlineExpander::default().expand_chapter(&phases, 11).unwrap_err();
        assert!(matches!(err, NovelError::OutOfRange { chapter: 11, planned: 10 }));
    }

    #[test]
    fn test_gap_between_phases_is_out_of_range() {
        let mut phases = PhasePlanner::plan(10, &default_phase_templates()).unwrap();
        phases[1].first_chapter += 1;
        let err = OutlineExpander::default().expand(&phases).unwrap_err();
        assert!(matches!(err, NovelError::OutOfRange { .. }));
    }

    #[test]
    fn test_overflowing_phase_counts_are_invalid() {
        let mut phases = PhasePlanner::plan(10, &default_phase_templates()).unwrap();
        phases[0].chapter_count = u32::MAX;
        let err = OutlineExpander::default().expand(&phases).unwrap_err();
        assert!(matches!(err, NovelError::InvalidConfiguration(_)));
    }
}
