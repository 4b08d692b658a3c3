//! 小说项目数据模型
//!
//! Project 由 ContinuityStore 独占；字段仅在 crate 内可写，外部通过驱动 / 规划器 / 扩写器的调用改变它。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 修为进度区间（阶段起止境界）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressionRange {
    pub start: String,
    pub end: String,
}

impl ProgressionRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// 大纲里的进度标记，如「修为提升-凡人向练气大圆满发展」
    pub fn marker(&self) -> String {
        format!("修为提升-{}向{}发展", self.start, self.end)
    }
}

/// 阶段规划结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasePlan {
    pub name: String,
    /// 0 起的序号
    pub ordinal: usize,
    pub chapter_count: u32,
    /// 本阶段第一章（含）；chapter_count 为 0 时等于下一阶段起点
    pub first_chapter: u32,
    pub theme: String,
    pub key_events: Vec<String>,
    pub conflicts: Vec<String>,
    pub progression: ProgressionRange,
    /// 每个关键事件分到的章节数（整除）
    pub chapters_per_event: u32,
    /// 整除余下、未分配给任何关键事件的章节数（< key_events.len()）
    pub unslotted: u32,
}

impl PhasePlan {
    /// 本阶段最后一章（含）；空阶段返回 None
    pub fn last_chapter(&self) -> Option<u32> {
        self.chapter_count
            .checked_sub(1)
            .and_then(|span| self.first_chapter.checked_add(span))
    }

    pub fn contains(&self, chapter: u32) -> bool {
        self.last_chapter()
            .is_some_and(|last| chapter >= self.first_chapter && chapter <= last)
    }

    /// 章节在本阶段内分到的关键事件；余数章节返回 None
    pub fn event_for(&self, chapter: u32) -> Option<&str> {
        if !self.contains(chapter) || self.chapters_per_event == 0 {
            return None;
        }
        let index = ((chapter - self.first_chapter) / self.chapters_per_event) as usize;
        self.key_events.get(index).map(String::as_str)
    }
}

/// 章节大纲
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChapterOutline {
    pub chapter_number: u32,
    pub title: String,
    pub main_events: Vec<String>,
    pub character_development: String,
    pub plot_progression: String,
    pub progress_marker: String,
    pub conflicts: Vec<String>,
    pub target_word_count: u32,
}

/// 已生成章节（含其大纲副本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chapter {
    pub outline: ChapterOutline,
    pub content: String,
    pub word_count: u32,
    pub key_plot_points: Vec<String>,
    pub character_changes: Vec<String>,
    pub next_chapter_setup: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl Chapter {
    pub fn number(&self) -> u32 {
        self.outline.chapter_number
    }
}

/// 生成日志条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub step: String,
    pub details: String,
}

impl LogEntry {
    pub fn now(step: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            step: step.into(),
            details: details.into(),
        }
    }
}

/// 门派势力
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sect {
    pub name: String,
    /// 正派 / 邪派 / 中立
    pub alignment: String,
    pub specialty: String,
    pub location: String,
    pub strength: String,
}

/// 地域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub name: String,
    pub kind: String,
    pub features: Vec<String>,
    pub dangers: Vec<String>,
    pub landmarks: Vec<String>,
}

/// 法宝
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artifact {
    pub name: String,
    pub grade: String,
    pub description: String,
}

/// 世界观设定
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldSetting {
    /// 修炼境界，从低到高
    pub cultivation_levels: Vec<String>,
    pub sects: Vec<Sect>,
    pub regions: Vec<Region>,
    /// 法术体系：类别 -> 条目（五行、特殊道路、修炼资源…）
    pub ability_system: std::collections::BTreeMap<String, Vec<String>>,
    pub artifacts: Vec<Artifact>,
    pub background_story: String,
}

/// 角色间关系边
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub relation: String,
    pub target: String,
}

/// 角色设定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Character {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub cultivation_level: String,
    pub personality: String,
    pub background: String,
    pub relationships: Vec<Relationship>,
    pub abilities: Vec<String>,
    pub goals: String,
    /// 主角 / 导师 / 反派…
    pub role: String,
}

/// 小说项目：世界观、角色、阶段、大纲、章节历史与游标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub world: WorldSetting,
    pub characters: Vec<Character>,
    pub(crate) cursor: u32,
    pub(crate) phases: Vec<PhasePlan>,
    pub(crate) outline: Vec<ChapterOutline>,
    pub(crate) chapters: Vec<Chapter>,
    pub(crate) log: Vec<LogEntry>,
    /// 写入被挂起的原因；随文档持久化，reconcile 后清除
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) halted: Option<String>,
}

impl Project {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: Utc::now(),
            world: WorldSetting::default(),
            characters: Vec::new(),
            cursor: 0,
            phases: Vec::new(),
            outline: Vec::new(),
            chapters: Vec::new(),
            log: Vec::new(),
            halted: None,
        }
    }

    /// 生成随机项目 ID（novel_<uuid>）
    pub fn generate_id() -> String {
        format!("novel_{}", uuid::Uuid::new_v4())
    }

    pub fn with_world(mut self, world: WorldSetting) -> Self {
        self.world = world;
        self
    }

    pub fn with_characters(mut self, characters: Vec<Character>) -> Self {
        self.characters = characters;
        self
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn phases(&self) -> &[PhasePlan] {
        &self.phases
    }

    pub fn outline(&self) -> &[ChapterOutline] {
        &self.outline
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn planned_chapters(&self) -> u32 {
        self.outline.len() as u32
    }

    /// 按章节号（1 起）取大纲
    pub fn outline_for(&self, chapter: u32) -> Option<&ChapterOutline> {
        chapter
            .checked_sub(1)
            .and_then(|i| self.outline.get(i as usize))
    }

    pub fn last_chapter(&self) -> Option<&Chapter> {
        self.chapters.last()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// 替换阶段与大纲（规划 / 重新规划时使用）
    pub(crate) fn install_plan(&mut self, phases: Vec<PhasePlan>, outline: Vec<ChapterOutline>) {
        self.phases = phases;
        self.outline = outline;
    }

    pub(crate) fn record(&mut self, step: impl Into<String>, details: impl Into<String>) {
        self.log.push(LogEntry::now(step, details));
    }

    /// 追加章节并推进游标；不满足连续性时返回说明
    pub(crate) fn push_chapter(&mut self, chapter: Chapter) -> Result<u32, String> {
        let expected = self.cursor + 1;
        if chapter.number() != expected {
            return Err(format!(
                "expected chapter {expected}, got {}",
                chapter.number()
            ));
        }
        if chapter.number() > self.planned_chapters() {
            return Err(format!(
                "chapter {} exceeds planned {}",
                chapter.number(),
                self.planned_chapters()
            ));
        }
        let details = format!(
            "第{}章内容生成完成，共{}字",
            chapter.number(),
            chapter.word_count
        );
        self.chapters.push(chapter);
        self.cursor = expected;
        self.record("内容生成", details);
        Ok(self.cursor)
    }

    /// 角色按名字更新或追加（不删除）
    pub(crate) fn upsert_character(&mut self, character: Character) {
        match self.characters.iter_mut().find(|c| c.name == character.name) {
            Some(existing) => *existing = character,
            None => self.characters.push(character),
        }
    }

    /// 校验持久化不变式：游标、章节连续、大纲稠密、阶段连续且总和等于大纲长度
    pub fn validate(&self) -> Result<(), String> {
        if self.cursor as usize != self.chapters.len() {
            return Err(format!(
                "cursor {} does not match {} stored chapters",
                self.cursor,
                self.chapters.len()
            ));
        }
        for (i, chapter) in self.chapters.iter().enumerate() {
            if chapter.number() != i as u32 + 1 {
                return Err(format!(
                    "chapter at position {} has number {}",
                    i,
                    chapter.number()
                ));
            }
        }
        for (i, outline) in self.outline.iter().enumerate() {
            if outline.chapter_number != i as u32 + 1 {
                return Err(format!(
                    "outline at position {} has number {}",
                    i, outline.chapter_number
                ));
            }
        }
        if self.cursor > self.planned_chapters() {
            return Err(format!(
                "cursor {} beyond planned {}",
                self.cursor,
                self.planned_chapters()
            ));
        }
        if !self.phases.is_empty() {
            let mut next = 1;
            for phase in &self.phases {
                if phase.first_chapter != next {
                    return Err(format!(
                        "phase {} starts at {}, expected {}",
                        phase.name, phase.first_chapter, next
                    ));
                }
                next = next.checked_add(phase.chapter_count).ok_or_else(|| {
                    format!(
                        "phase {} chapter count {} overflows the chapter range",
                        phase.name, phase.chapter_count
                    )
                })?;
            }
            if next - 1 != self.planned_chapters() {
                return Err(format!(
                    "phases cover {} chapters but outline has {}",
                    next - 1,
                    self.planned_chapters()
                ));
            }
        }
        Ok(())
    }
}
