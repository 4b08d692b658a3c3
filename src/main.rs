//! Tianshu 命令行
//!
//! ```bash
//! tianshu init <project> [--target N] [--title T]
//! tianshu next <project>
//! tianshu batch <project> [--count N]
//! tianshu report <project>
//! tianshu reconcile <project>
//! tianshu list
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tianshu::config::load_config;
use tianshu::llm::create_generator;
use tianshu::store::create_store;
use tianshu::story::{DriverOptions, GenerationDriver, ProjectSeed, StepOutcome};

#[derive(Parser)]
#[command(name = "tianshu")]
#[command(version, about = "Staged long-form xianxia novel generator")]
pub struct Cli {
    /// Extra config file layered over config/default.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan phases and expand the outline for a new project
    Init {
        project: String,
        /// Target chapter count (defaults to generation.target_chapters)
        #[arg(short, long)]
        target: Option<u32>,
        #[arg(long, default_value = "修仙传说")]
        title: String,
    },
    /// Generate the next chapter
    Next { project: String },
    /// Generate up to N chapters, stopping at the first failure
    Batch {
        project: String,
        /// Chapters to attempt (defaults to generation.batch_size)
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },
    /// Print the progress report as JSON
    Report { project: String },
    /// Re-validate stored state and lift a halt
    Reconcile { project: String },
    /// List stored projects
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tianshu::observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config).context("Failed to load config")?;
    let store = create_store(&cfg).context("Failed to open project store")?;
    let driver = Arc::new(
        GenerationDriver::new(store, create_generator(&cfg))
            .with_options(DriverOptions::from_config(&cfg)),
    );

    // Ctrl+C 取消在途生成，已提交章节不受影响
    {
        let supervisor = Arc::clone(driver.supervisor());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling in-flight generation");
                supervisor.cancel();
            }
        });
    }

    match cli.command {
        Command::Init {
            project,
            target,
            title,
        } => {
            let target = target.unwrap_or(cfg.generation.target_chapters);
            let created = driver
                .initialize(ProjectSeed::new(project.as_str(), title, target))
                .await
                .with_context(|| format!("Failed to initialize {project}"))?;
            println!(
                "created {} with {} phases and {} planned chapters",
                created.id,
                created.phases().len(),
                created.planned_chapters()
            );
        }
        Command::Next { project } => match driver.advance(&project).await? {
            StepOutcome::Generated(chapter) => {
                println!("{} ({} 字)", chapter.outline.title, chapter.word_count)
            }
            StepOutcome::NotProduced {
                chapter_number,
                reason,
            } => println!("chapter {chapter_number} not produced: {reason}"),
        },
        Command::Batch { project, count } => {
            let count = count.unwrap_or(cfg.generation.batch_size);
            let report = driver.advance_batch(&project, count).await;
            for chapter in &report.chapters {
                println!("{} ({} 字)", chapter.outline.title, chapter.word_count);
            }
            if let Some(stop) = &report.stopped {
                println!(
                    "stopped after {}/{} chapters: {}",
                    report.generated(),
                    report.requested,
                    stop.error
                );
            }
        }
        Command::Report { project } => {
            let report = driver.report(&project).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reconcile { project } => {
            let reconciled = driver.reconcile(&project).await?;
            println!(
                "{} is consistent at chapter {}",
                reconciled.id,
                reconciled.cursor()
            );
        }
        Command::List => {
            for id in driver.store().list_projects().await? {
                println!("{id}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_parses_target_and_title() {
        let cli = Cli::try_parse_from(["tianshu", "init", "novel", "--target", "12", "--title", "问道"])
            .unwrap();
        match cli.command {
            Command::Init {
                project,
                target,
                title,
            } => {
                assert_eq!(project, "novel");
                assert_eq!(target, Some(12));
                assert_eq!(title, "问道");
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn test_batch_count_defaults_to_config() {
        let cli = Cli::try_parse_from(["tianshu", "batch", "novel"]).unwrap();
        assert!(matches!(cli.command, Command::Batch { count: None, .. }));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_missing_project_is_rejected() {
        assert!(Cli::try_parse_from(["tianshu", "next"]).is_err());
        assert!(Cli::try_parse_from(["tianshu", "batch", "novel", "-n", "many"]).is_err());
    }
}
