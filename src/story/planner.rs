//! 阶段规划器
//!
//! 按权重把目标章节数切分为有序阶段：每阶段分到 floor(target * weight) 章，取整余数全部补给最后一个阶段，
//! 保证总和恰好等于 target。阶段内再按关键事件整除切片，余下章节不参与事件枚举。

use serde::{Deserialize, Serialize};

use crate::core::NovelError;
use crate::story::types::{PhasePlan, ProgressionRange};

/// 浮点乘法的表示误差容忍（1/6 * 300 = 49.999…）
const WEIGHT_EPSILON: f64 = 1e-9;

/// 阶段模板：名称、比例权重、关键事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseTemplate {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub theme: String,
    pub key_events: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    pub progression: ProgressionRange,
}

impl PhaseTemplate {
    pub fn new(name: impl Into<String>, weight: f64, key_events: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            weight,
            theme: String::new(),
            key_events: key_events.into_iter().map(String::from).collect(),
            conflicts: Vec::new(),
            progression: ProgressionRange::new("", ""),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<&str>) -> Self {
        self.conflicts = conflicts.into_iter().map(String::from).collect();
        self
    }

    pub fn with_progression(mut self, progression: ProgressionRange) -> Self {
        self.progression = progression;
        self
    }
}

/// 默认四阶段：入门 / 成长 / 崛起 / 巅峰（300 章时为 50/100/100/50）
pub fn default_phase_templates() -> Vec<PhaseTemplate> {
    vec![
        PhaseTemplate::new(
            "入门期",
            1.0 / 6.0,
            vec!["获得传承", "拜入青云门", "初次修炼", "同门交往", "小试身手"],
        )
        .with_theme("获得机缘，初入修仙世界")
        .with_conflicts(vec!["资质怀疑", "门内竞争", "基础挑战"])
        .with_progression(ProgressionRange::new("凡人", "练气大圆满")),
        PhaseTemplate::new(
            "成长期",
            1.0 / 3.0,
            vec!["门派试炼", "秘境探险", "结识盟友", "初恋情愫", "强敌出现"],
        )
        .with_theme("历练成长，结识伙伴")
        .with_conflicts(vec!["生死历练", "情感纠葛", "宗门危机"])
        .with_progression(ProgressionRange::new("筑基初期", "金丹初期")),
        PhaseTemplate::new(
            "崛起期",
            1.0 / 3.0,
            vec!["名震一方", "跨域冒险", "强者对决", "门派大战", "身世揭秘"],
        )
        .with_theme("声名鹊起，面临大敌")
        .with_conflicts(vec!["正邪对立", "权力斗争", "命运抉择"])
        .with_progression(ProgressionRange::new("金丹中期", "元婴后期")),
        PhaseTemplate::new(
            "巅峰期",
            1.0 / 6.0,
            vec!["魔道复苏", "最终决战", "牺牲拯救", "大道圆满", "飞升成仙"],
        )
        .with_theme("巅峰对决，拯救世界")
        .with_conflicts(vec!["存亡之战", "道心考验", "终极选择"])
        .with_progression(ProgressionRange::new("化神期", "真仙")),
    ]
}

/// 阶段规划器（纯计算，无副作用）
pub struct PhasePlanner;

impl PhasePlanner {
    pub fn plan(
        target_chapters: u32,
        templates: &[PhaseTemplate],
    ) -> Result<Vec<PhasePlan>, NovelError> {
        if templates.is_empty() {
            return Err(NovelError::InvalidConfiguration(
                "at least one phase template is required".to_string(),
            ));
        }
        if (target_chapters as usize) < templates.len() {
            return Err(NovelError::InvalidConfiguration(format!(
                "target of {target_chapters} chapters is fewer than {} phases",
                templates.len()
            )));
        }
        if let Some(bad) = templates
            .iter()
            .find(|t| !t.weight.is_finite() || t.weight < 0.0)
        {
            return Err(NovelError::InvalidConfiguration(format!(
                "phase {} has invalid weight {}",
                bad.name, bad.weight
            )));
        }

        let mut counts: Vec<u32> = templates
            .iter()
            .map(|t| (target_chapters as f64 * t.weight + WEIGHT_EPSILON).floor() as u32)
            .collect();
        let allocated: u64 = counts.iter().map(|&c| c as u64).sum();
        if allocated > target_chapters as u64 {
            return Err(NovelError::InvalidConfiguration(format!(
                "phase weights allocate {allocated} chapters, more than the target {target_chapters}"
            )));
        }
        if let Some(last) = counts.last_mut() {
            *last += target_chapters - allocated as u32;
        }

        let mut first_chapter = 1;
        let plans = templates
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(ordinal, (template, chapter_count))| {
                let events = template.key_events.len() as u32;
                let (chapters_per_event, unslotted) = if events == 0 {
                    (0, chapter_count)
                } else {
                    (chapter_count / events, chapter_count % events)
                };
                let plan = PhasePlan {
                    name: template.name.clone(),
                    ordinal,
                    chapter_count,
                    first_chapter,
                    theme: template.theme.clone(),
                    key_events: template.key_events.clone(),
                    conflicts: template.conflicts.clone(),
                    progression: template.progression.clone(),
                    chapters_per_event,
                    unslotted,
                };
                first_chapter += chapter_count;
                plan
            })
            .collect();

        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted(weights: &[f64]) -> Vec<PhaseTemplate> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &w)| PhaseTemplate::new(format!("阶段{i}"), w, vec!["事件"]))
            .collect()
    }

    fn counts(plans: &[PhasePlan]) -> Vec<u32> {
        plans.iter().map(|p| p.chapter_count).collect()
    }

    #[test]
    fn test_plan_ten_chapters_by_weight() {
        let plans = PhasePlanner::plan(10, &weighted(&[0.5, 0.3, 0.2])).unwrap();
        assert_eq!(counts(&plans), vec![5, 3, 2]);
        assert_eq!(plans[1].first_chapter, 6);
        assert_eq!(plans[2].first_chapter, 9);
    }

    #[test]
    fn test_default_templates_for_three_hundred() {
        let plans = PhasePlanner::plan(300, &default_phase_templates()).unwrap();
        assert_eq!(counts(&plans), vec![50, 100, 100, 50]);
        assert!(plans.iter().all(|p| p.chapters_per_event == p.chapter_count / 5));
    }

    #[test]
    fn test_remainder_goes_to_last_phase() {
        let plans = PhasePlanner::plan(10, &weighted(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0])).unwrap();
        assert_eq!(counts(&plans), vec![3, 3, 4]);
    }

    #[test]
    fn test_sum_always_equals_target() {
        let templates = default_phase_templates();
        for target in 4..=400 {
            let plans = PhasePlanner::plan(target, &templates).unwrap();
            assert_eq!(plans.iter().map(|p| p.chapter_count).sum::<u32>(), target);
            let mut next = 1;
            for plan in &plans {
                assert_eq!(plan.first_chapter, next);
                next += plan.chapter_count;
            }
        }
    }

    #[test]
    fn test_event_rounding_loss_is_bounded() {
        let templates = vec![PhaseTemplate::new("入门期", 1.0, vec!["a", "b", "c"])];
        let plans = PhasePlanner::plan(11, &templates).unwrap();
        assert_eq!(plans[0].chapters_per_event, 3);
        assert_eq!(plans[0].unslotted, 2);
        assert!(plans[0].unslotted < 3);
    }

    #[test]
    fn test_target_smaller_than_phase_count_is_rejected() {
        let err = PhasePlanner::plan(2, &weighted(&[0.5, 0.3, 0.2])).unwrap_err();
        assert!(matches!(err, NovelError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let err = PhasePlanner::plan(10, &weighted(&[1.2, -0.2])).unwrap_err();
        assert!(matches!(err, NovelError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_overallocating_weights_are_rejected() {
        let err = PhasePlanner::plan(10, &weighted(&[0.8, 0.8])).unwrap_err();
        assert!(matches!(err, NovelError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_templates_are_rejected() {
        assert!(PhasePlanner::plan(10, &[]).is_err());
    }
}
