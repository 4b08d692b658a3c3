//! 生成驱动
//!
//! 每次 advance 只推进一章：取下一章大纲与上一章末尾节选，调用生成器（受超时与取消令牌约束），
//! 推导元数据，再经存储原子追加。生成失败不写入任何东西，游标不变，可原样重试。
//! 同一项目同一时刻只允许一次写操作；存储报告 SequenceViolation 的项目被挂起，直到 reconcile。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{GenerationSupervisor, InFlightGuard, NovelError};
use crate::llm::prompt::{character_context, world_context};
use crate::llm::{GenerationRequest, LlmError, TextGenerator};
use crate::store::ContinuityStore;
use crate::story::extract::{count_words, derive_metadata};
use crate::story::outline::{OutlineExpander, DEFAULT_WORD_COUNT_TARGET};
use crate::story::planner::{default_phase_templates, PhasePlanner, PhaseTemplate};
use crate::story::report::{ProgressReport, ProgressReporter};
use crate::story::types::{Chapter, ChapterOutline, Character, Project, WorldSetting};
use crate::story::world::{default_cast, default_world, merge_world};

/// 第一章的连续性节选
pub const STORY_START_SENTINEL: &str = "故事开始";

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// 单章生成超时
    pub timeout: Duration,
    /// 传给下一章的上一章末尾字符数
    pub continuity_chars: usize,
    pub max_length: usize,
    pub word_count_target: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            continuity_chars: 500,
            max_length: 3000,
            word_count_target: DEFAULT_WORD_COUNT_TARGET,
        }
    }
}

impl DriverOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            timeout: cfg.request_timeout(),
            continuity_chars: cfg.generation.continuity_chars,
            max_length: cfg.generation.max_length,
            word_count_target: cfg.generation.word_count_target,
        }
    }
}

/// 新项目的初始输入
#[derive(Debug, Clone)]
pub struct ProjectSeed {
    pub id: String,
    pub title: String,
    pub target_chapters: u32,
    pub world: WorldSetting,
    pub characters: Vec<Character>,
    pub templates: Vec<PhaseTemplate>,
}

impl ProjectSeed {
    /// 默认世界观、角色与四阶段模板
    pub fn new(id: impl Into<String>, title: impl Into<String>, target_chapters: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            target_chapters,
            world: default_world(),
            characters: default_cast(),
            templates: default_phase_templates(),
        }
    }

    pub fn with_world(mut self, world: WorldSetting) -> Self {
        self.world = world;
        self
    }

    pub fn with_characters(mut self, characters: Vec<Character>) -> Self {
        self.characters = characters;
        self
    }

    pub fn with_templates(mut self, templates: Vec<PhaseTemplate>) -> Self {
        self.templates = templates;
        self
    }
}

/// 单步结果：产出一章，或本章未产出（项目未变，可重试）
#[derive(Debug)]
pub enum StepOutcome {
    Generated(Chapter),
    NotProduced { chapter_number: u32, reason: LlmError },
}

impl StepOutcome {
    pub fn chapter(&self) -> Option<&Chapter> {
        match self {
            StepOutcome::Generated(chapter) => Some(chapter),
            StepOutcome::NotProduced { .. } => None,
        }
    }
}

/// 批量停止的位置与原因
#[derive(Debug)]
pub struct BatchStop {
    /// 停止时正在尝试的章节号（无法确定时为 None）
    pub chapter_number: Option<u32>,
    pub error: NovelError,
}

#[derive(Debug)]
pub struct BatchReport {
    pub requested: u32,
    pub chapters: Vec<Chapter>,
    pub stopped: Option<BatchStop>,
}

impl BatchReport {
    pub fn generated(&self) -> usize {
        self.chapters.len()
    }
}

pub struct GenerationDriver {
    store: Arc<dyn ContinuityStore>,
    generator: Arc<dyn TextGenerator>,
    supervisor: Arc<GenerationSupervisor>,
    options: DriverOptions,
}

impl GenerationDriver {
    pub fn new(store: Arc<dyn ContinuityStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            generator,
            supervisor: Arc::new(GenerationSupervisor::new()),
            options: DriverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_supervisor(mut self, supervisor: Arc<GenerationSupervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    pub fn supervisor(&self) -> &Arc<GenerationSupervisor> {
        &self.supervisor
    }

    pub fn store(&self) -> &Arc<dyn ContinuityStore> {
        &self.store
    }

    /// 规划、扩写并保存新项目
    pub async fn initialize(&self, seed: ProjectSeed) -> Result<Project, NovelError> {
        let _guard = self.begin(&seed.id)?;
        if self.store.exists(&seed.id).await? {
            return Err(NovelError::InvalidConfiguration(format!(
                "project {} already exists",
                seed.id
            )));
        }

        let phases = PhasePlanner::plan(seed.target_chapters, &seed.templates)?;
        let outline = self.expander().expand(&phases)?;

        let mut project = Project::new(seed.id, seed.title)
            .with_world(seed.world)
            .with_characters(seed.characters);
        project.record("世界观设定", "创建了完整的修仙世界观");
        project.record(
            "角色设定",
            format!("创建了{}个主要角色", project.characters.len()),
        );
        project.record(
            "大纲规划",
            format!("{}个阶段，共{}章大纲", phases.len(), outline.len()),
        );
        project.install_plan(phases, outline);

        self.store.save(&project).await?;
        tracing::info!(
            "Initialized project {} ({} chapters planned)",
            project.id,
            project.planned_chapters()
        );
        Ok(project)
    }

    /// 按新的目标章节数重新规划；已生成章节及其大纲保持不变
    pub async fn replan(
        &self,
        project_id: &str,
        target_chapters: u32,
        templates: &[PhaseTemplate],
    ) -> Result<Project, NovelError> {
        let _guard = self.begin(project_id)?;
        let mut project = self.load_writable(project_id).await?;
        if target_chapters < project.cursor() {
            return Err(NovelError::InvalidConfiguration(format!(
                "target of {target_chapters} chapters is below the {} already generated",
                project.cursor()
            )));
        }

        let phases = PhasePlanner::plan(target_chapters, templates)?;
        let mut outline = self.expander().expand(&phases)?;
        for (slot, chapter) in outline.iter_mut().zip(project.chapters()) {
            *slot = chapter.outline.clone();
        }
        project.install_plan(phases, outline);
        project.record("重新规划", format!("目标调整为{target_chapters}章"));

        self.save(&project).await?;
        tracing::info!("Replanned project {} to {} chapters", project_id, target_chapters);
        Ok(project)
    }

    /// 修订世界观（只增改，不删除）
    pub async fn amend_world(
        &self,
        project_id: &str,
        amendment: WorldSetting,
    ) -> Result<Project, NovelError> {
        let _guard = self.begin(project_id)?;
        let mut project = self.load_writable(project_id).await?;
        merge_world(&mut project.world, amendment);
        project.record("世界观修订", "更新了世界观设定");
        self.save(&project).await?;
        Ok(project)
    }

    /// 按名字更新或新增角色
    pub async fn upsert_character(
        &self,
        project_id: &str,
        character: Character,
    ) -> Result<Project, NovelError> {
        let _guard = self.begin(project_id)?;
        let mut project = self.load_writable(project_id).await?;
        let name = character.name.clone();
        project.upsert_character(character);
        project.record("角色设定", format!("更新角色：{name}"));
        self.save(&project).await?;
        Ok(project)
    }

    /// 重新校验已存状态；通过则解除挂起（含持久化的挂起标记）
    pub async fn reconcile(&self, project_id: &str) -> Result<Project, NovelError> {
        let _guard = self.begin(project_id)?;
        let mut project = self.load(project_id).await?;
        if let Some(reason) = project.halted.take() {
            project.record("状态校验", format!("解除挂起：{reason}"));
            self.save(&project).await?;
        }
        if self.supervisor.release(project_id) {
            tracing::info!("Project {} reconciled, writes resumed", project_id);
        }
        Ok(project)
    }

    pub async fn report(&self, project_id: &str) -> Result<ProgressReport, NovelError> {
        let project = self.store.load(project_id).await?;
        Ok(ProgressReporter::report(&project))
    }

    /// 推进一章（使用监管者派生的取消令牌）
    pub async fn advance(&self, project_id: &str) -> Result<StepOutcome, NovelError> {
        let token = self.supervisor.child_token();
        self.advance_with_token(project_id, &token).await
    }

    pub async fn advance_with_token(
        &self,
        project_id: &str,
        token: &CancellationToken,
    ) -> Result<StepOutcome, NovelError> {
        let _guard = self.begin(project_id)?;
        let project = self.load_writable(project_id).await?;

        let next = project.cursor() + 1;
        let outline = project
            .outline_for(next)
            .cloned()
            .ok_or(NovelError::SequenceExhausted {
                planned: project.planned_chapters(),
            })?;

        let request = self.build_request(&project, outline.clone());
        let content = match self.call_generator(&request, token).await {
            Ok(content) => content,
            Err(reason) => {
                tracing::warn!(
                    "Chapter {} of {} not produced ({}): {}",
                    next,
                    project_id,
                    self.generator.name(),
                    reason
                );
                return Ok(StepOutcome::NotProduced {
                    chapter_number: next,
                    reason,
                });
            }
        };

        let chapter = compose_chapter(outline, content);
        let cursor = match self.store.append_chapter(project_id, chapter.clone()).await {
            Ok(cursor) => cursor,
            Err(e) => return Err(self.store_failure(project_id, e.into()).await),
        };
        tracing::info!(
            "Chapter {} of {} committed ({} words), cursor {}",
            chapter.number(),
            project_id,
            chapter.word_count,
            cursor
        );
        Ok(StepOutcome::Generated(chapter))
    }

    /// 连续推进最多 count 章；遇到第一个失败即停止，不向上抛错
    pub async fn advance_batch(&self, project_id: &str, count: u32) -> BatchReport {
        let mut report = BatchReport {
            requested: count,
            chapters: Vec::new(),
            stopped: None,
        };
        for _ in 0..count {
            match self.advance(project_id).await {
                Ok(StepOutcome::Generated(chapter)) => report.chapters.push(chapter),
                Ok(StepOutcome::NotProduced {
                    chapter_number,
                    reason,
                }) => {
                    report.stopped = Some(BatchStop {
                        chapter_number: Some(chapter_number),
                        error: NovelError::GenerationFailure {
                            chapter: chapter_number,
                            source: reason,
                        },
                    });
                    break;
                }
                Err(error) => {
                    let chapter_number = match &error {
                        NovelError::SequenceExhausted { planned } => Some(planned + 1),
                        _ => report.chapters.last().map(|c| c.number() + 1),
                    };
                    report.stopped = Some(BatchStop {
                        chapter_number,
                        error,
                    });
                    break;
                }
            }
        }
        tracing::info!(
            "Batch for {} finished: {}/{} chapters",
            project_id,
            report.generated(),
            count
        );
        report
    }

    fn expander(&self) -> OutlineExpander {
        OutlineExpander::new(self.options.word_count_target)
    }

    fn begin(&self, project_id: &str) -> Result<InFlightGuard, NovelError> {
        self.supervisor
            .try_begin(project_id)
            .ok_or_else(|| NovelError::ProjectBusy(project_id.to_string()))
    }

    fn ensure_writable(&self, project_id: &str) -> Result<(), NovelError> {
        if self.supervisor.is_halted(project_id) {
            return Err(NovelError::SequenceViolation {
                project_id: project_id.to_string(),
                detail: "writes halted until reconcile".to_string(),
            });
        }
        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<Project, NovelError> {
        match self.store.load(project_id).await {
            Ok(project) => Ok(project),
            Err(e) => Err(self.store_failure(project_id, e.into()).await),
        }
    }

    /// 写操作前的加载：进程内挂起与文档内挂起标记都拒绝写入
    async fn load_writable(&self, project_id: &str) -> Result<Project, NovelError> {
        self.ensure_writable(project_id)?;
        let project = self.load(project_id).await?;
        if let Some(reason) = project.halt_reason() {
            self.supervisor.halt(project_id);
            return Err(NovelError::SequenceViolation {
                project_id: project_id.to_string(),
                detail: format!("writes halted until reconcile: {reason}"),
            });
        }
        Ok(project)
    }

    async fn save(&self, project: &Project) -> Result<(), NovelError> {
        match self.store.save(project).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.store_failure(&project.id, e.into()).await),
        }
    }

    /// 存储错误出口：不变式被破坏时挂起该项目，并尽量把挂起标记写回文档
    async fn store_failure(&self, project_id: &str, error: NovelError) -> NovelError {
        if let NovelError::SequenceViolation { detail, .. } = &error {
            tracing::error!(
                "Sequence violation in {}: {}; halting writes",
                project_id,
                detail
            );
            self.supervisor.halt(project_id);
            self.persist_halt(project_id, detail).await;
        }
        error
    }

    async fn persist_halt(&self, project_id: &str, detail: &str) {
        // 文档本身无法加载时不写标记，下次加载会再次报告同一违规
        let Ok(mut project) = self.store.load(project_id).await else {
            return;
        };
        if project.halted.is_some() {
            return;
        }
        project.halted = Some(detail.to_string());
        project.record("写入挂起", detail);
        if let Err(e) = self.store.save(&project).await {
            tracing::warn!("Failed to persist halt marker for {}: {}", project_id, e);
        }
    }

    fn build_request(&self, project: &Project, outline: ChapterOutline) -> GenerationRequest {
        let continuity_excerpt = match project.last_chapter() {
            Some(previous) if project.cursor() > 0 => {
                tail_chars(&previous.content, self.options.continuity_chars).to_string()
            }
            _ => STORY_START_SENTINEL.to_string(),
        };
        GenerationRequest {
            outline_context: outline,
            world_context: world_context(&project.world),
            character_context: character_context(&project.characters),
            continuity_excerpt,
            max_length: self.options.max_length,
        }
    }

    async fn call_generator(
        &self,
        request: &GenerationRequest,
        token: &CancellationToken,
    ) -> Result<String, LlmError> {
        let timeout = self.options.timeout;
        let text = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(LlmError::Cancelled),
            result = tokio::time::timeout(timeout, self.generator.generate(request)) => {
                match result {
                    Ok(inner) => inner?,
                    Err(_) => return Err(LlmError::Timeout(timeout.as_millis() as u64)),
                }
            }
        };
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

fn compose_chapter(outline: ChapterOutline, content: String) -> Chapter {
    let metadata = derive_metadata(outline.chapter_number, &content);
    Chapter {
        word_count: count_words(&content),
        outline,
        content,
        key_plot_points: metadata.key_plot_points,
        character_changes: metadata.character_changes,
        next_chapter_setup: metadata.next_chapter_setup,
        summary: metadata.summary,
        created_at: Utc::now(),
    }
}

/// 末尾 n 个字符（按 char 计，不切断多字节字符）
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}
