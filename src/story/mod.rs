//! 故事流水线：阶段规划 → 大纲扩写 → 逐章生成 → 进度报告

pub mod driver;
pub mod extract;
pub mod outline;
pub mod planner;
pub mod report;
pub mod types;
pub mod world;

pub use driver::{
    BatchReport, BatchStop, DriverOptions, GenerationDriver, ProjectSeed, StepOutcome,
    STORY_START_SENTINEL,
};
pub use extract::{count_words, derive_metadata, ChapterMetadata};
pub use outline::{OutlineExpander, OutlineOverride, DEFAULT_WORD_COUNT_TARGET, OUTLINE_OVERRIDES};
pub use planner::{default_phase_templates, PhasePlanner, PhaseTemplate};
pub use report::{ProgressReport, ProgressReporter};
pub use types::{
    Artifact, Chapter, ChapterOutline, Character, LogEntry, PhasePlan, ProgressionRange, Project,
    Region, Relationship, Sect, WorldSetting,
};
pub use world::{default_cast, default_world, merge_world};
