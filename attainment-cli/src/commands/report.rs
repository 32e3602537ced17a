//! `attainment report`: run the pipeline and render every derived table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use attainment_engine::storage::{TursoAttainmentProjection, TursoCatalogStore};
use attainment_engine::{
    AttainmentProjection, AttainmentReport, JsonReportEmitter, LessonId, ReportEmitter,
    emit_report, run_from_source, run_lesson_from_source,
};
use clap::Args;
use tracing::{info, warn};

use super::open_store;
use crate::config::{AttainmentConfig, ReportFormat};
use crate::render::TableReportEmitter;

/// Report arguments.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Only report this lesson
    #[arg(long)]
    pub lesson: Option<i64>,

    /// Output format (overrides report.format)
    #[arg(long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write to this file instead of stdout (overrides report.output)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Replace the stored derived tables with this run
    #[arg(long)]
    pub persist: bool,
}

/// Run report command.
pub async fn run(args: ReportArgs, config: &AttainmentConfig) -> Result<()> {
    let persist = args.persist || config.report.persist;
    if persist && args.lesson.is_some() {
        bail!("--persist replaces every derived row and cannot be combined with --lesson");
    }

    let store = open_store(&config.database).await?;
    let report = compute(&store, args.lesson.map(LessonId)).await?;

    if persist {
        TursoAttainmentProjection::new(store.clone())
            .replace(&report)
            .await
            .context("failed to store derived tables")?;
        info!(lessons = report.lessons.len(), "derived tables replaced");
    }

    for lesson in report.flagged() {
        warn!(lesson_id = %lesson.lesson.id, lesson = %lesson.lesson.name, "lesson flagged");
    }

    let format = args.format.unwrap_or(config.report.format);
    let output = args.output.as_deref().or(config.report.output.as_deref());
    write_report(&report, format, output)
}

async fn compute(store: &TursoCatalogStore, lesson: Option<LessonId>) -> Result<AttainmentReport> {
    let report = match lesson {
        Some(id) => run_lesson_from_source(store, id).await?,
        None => run_from_source(store).await?,
    };
    Ok(report)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn write_report(report: &AttainmentReport, format: ReportFormat, output: Option<&Path>) -> Result<()> {
    let writer = open_output(output)?;
    let mut emitter: Box<dyn ReportEmitter> = match format {
        ReportFormat::Table => Box::new(TableReportEmitter::new(writer)),
        ReportFormat::Json => Box::new(JsonReportEmitter::new(writer)),
    };
    emit_report(report, emitter.as_mut())?;
    if let Some(path) = output {
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attainment_engine::{
        CatalogSnapshot, CourseEvaluationRelation, CourseOutcome, CourseOutcomeId,
        EvaluationCriterion, Lesson, LessonCatalog, StudentId, StudentRecord,
    };
    use tempfile::TempDir;

    fn lesson() -> LessonCatalog {
        let id = LessonId(1);
        let mut lesson = LessonCatalog::new(Lesson {
            id,
            name: "Operating Systems".to_string(),
        });
        lesson.course_outcomes = vec![CourseOutcome {
            id: CourseOutcomeId(1),
            text: "Explain scheduling".to_string(),
            lesson_id: id,
        }];
        lesson.criteria = vec![EvaluationCriterion {
            name: "Midterm".to_string(),
            weight: 100,
            lesson_id: id,
        }];
        lesson.course_evaluation_relations = vec![CourseEvaluationRelation {
            course_outcome_id: CourseOutcomeId(1),
            criterion: "Midterm".to_string(),
            lesson_id: id,
            value: 1,
        }];
        lesson.students = vec![StudentRecord::new(StudentId(1), id).with_score("Midterm", 80.0)];
        lesson
    }

    async fn seeded_store() -> TursoCatalogStore {
        let store = TursoCatalogStore::new_memory().await.unwrap();
        store
            .import_snapshot(&CatalogSnapshot::new(vec![lesson()]))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn compute_rejects_unknown_lesson() {
        let store = seeded_store().await;

        let result = compute(&store, Some(LessonId(42))).await;

        assert!(result.unwrap_err().to_string().contains("lesson not found"));
    }

    #[tokio::test]
    async fn json_report_is_written_to_file() {
        let store = seeded_store().await;
        let report = compute(&store, None).await.unwrap();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");

        write_report(&report, ReportFormat::Json, Some(&path)).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["lessons"][0]["lesson_name"], "Operating Systems");
    }

    #[tokio::test]
    async fn table_report_is_written_to_file() {
        let store = seeded_store().await;
        let report = compute(&store, Some(LessonId(1))).await.unwrap();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.txt");

        write_report(&report, ReportFormat::Table, Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Lesson 1: Operating Systems [computed]"));
        assert!(text.contains("Explain scheduling"));
    }

    #[tokio::test]
    async fn persist_with_lesson_filter_is_rejected() {
        let args = ReportArgs {
            lesson: Some(1),
            format: None,
            output: None,
            persist: true,
        };

        let err = run(args, &AttainmentConfig::default()).await.unwrap_err();

        assert!(err.to_string().contains("--persist"));
    }
}
