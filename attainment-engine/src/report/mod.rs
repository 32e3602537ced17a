//! Labeled tables built from a lesson report, and the emitters that render
//! them.
//!
//! A [`LessonSection`] is the unit handed to a [`ReportEmitter`]: the lesson
//! header, its validation status and every derived table as plain labeled
//! rows of numbers. Emitters never see the aggregator types directly.

mod json;

pub use json::JsonReportEmitter;

use serde::{Deserialize, Serialize};

use crate::catalog::{CourseOutcome, EvaluationCriterion, ProgramOutcome};
use crate::error::Result;
use crate::pipeline::{AttainmentReport, LessonReport, LessonStatus};
use crate::types::{CourseOutcomeId, LessonId, ProgramOutcomeId, StudentId};

/// A row: identifier label, optional free-text annotation, numeric cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub cells: Vec<f64>,
}

/// A titled table. Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    fn new(title: &str, columns: Vec<String>) -> Self {
        Self {
            title: title.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, label: String, annotation: Option<&str>, cells: Vec<f64>) {
        self.rows.push(ReportRow {
            label,
            annotation: annotation.map(str::to_string),
            cells,
        });
    }
}

/// Everything rendered for one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSection {
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub status: LessonStatus,
    /// Validation messages, blocking ones first.
    pub issues: Vec<String>,
    pub tables: Vec<ReportTable>,
}

impl LessonSection {
    pub fn table(&self, title: &str) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.title == title)
    }
}

/// Table titles, in the order they appear in a section.
pub mod titles {
    pub const PROGRAM_RELATIONS: &str = "Program outcome relations";
    pub const EVALUATION_RELATIONS: &str = "Course outcome assessment";
    pub const CRITERION_ATTAINMENT: &str = "Criterion attainment";
    pub const STUDENT_ATTAINMENT: &str = "Student attainment";
    pub const PROGRAM_ATTAINMENT: &str = "Program attainment";
    pub const GRADES: &str = "Course grades";
}

/// Receives lesson sections one at a time.
pub trait ReportEmitter {
    fn emit(&mut self, section: &LessonSection) -> Result<()>;

    /// Called once after the last section.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Render every lesson of `report` through `emitter`.
pub fn emit_report(report: &AttainmentReport, emitter: &mut dyn ReportEmitter) -> Result<()> {
    for lesson in &report.lessons {
        emitter.emit(&LessonSection::from(lesson))?;
    }
    emitter.finish()
}

fn po_label(id: ProgramOutcomeId) -> String {
    format!("PO{}", id)
}

fn co_label(id: CourseOutcomeId) -> String {
    format!("CO{}", id)
}

fn student_label(id: StudentId) -> String {
    format!("S{}", id)
}

fn program_text(outcomes: &[ProgramOutcome], id: ProgramOutcomeId) -> Option<&str> {
    outcomes.iter().find(|o| o.id == id).map(|o| o.text.as_str())
}

fn course_text(outcomes: &[CourseOutcome], id: CourseOutcomeId) -> Option<&str> {
    outcomes.iter().find(|o| o.id == id).map(|o| o.text.as_str())
}

fn criterion_columns(criteria: &[EvaluationCriterion]) -> Vec<String> {
    criteria.iter().map(|c| c.name.clone()).collect()
}

fn with_columns(mut columns: Vec<String>, extra: &[&str]) -> Vec<String> {
    columns.extend(extra.iter().map(|c| c.to_string()));
    columns
}

impl From<&LessonReport> for LessonSection {
    fn from(report: &LessonReport) -> Self {
        let course_columns: Vec<String> =
            report.course_outcomes.iter().map(|o| co_label(o.id)).collect();

        let mut tables = Vec::new();

        let mut table = ReportTable::new(
            titles::PROGRAM_RELATIONS,
            with_columns(course_columns.clone(), &["Rel Value"]),
        );
        for row in &report.program_relations {
            let mut cells: Vec<f64> = row.values.iter().map(|(_, v)| *v).collect();
            cells.push(row.relation_average);
            table.push(
                po_label(row.program_outcome_id),
                program_text(&report.program_outcomes, row.program_outcome_id),
                cells,
            );
        }
        tables.push(table);

        // Criterion columns carry their weight here only.
        let weighted_columns = report
            .criteria
            .iter()
            .map(|c| format!("{} ({}%)", c.name, c.weight))
            .collect();
        let mut table = ReportTable::new(
            titles::EVALUATION_RELATIONS,
            with_columns(weighted_columns, &["Total"]),
        );
        for row in &report.evaluation_relations {
            let mut cells: Vec<f64> = row.values.iter().map(|(_, v)| f64::from(*v)).collect();
            cells.push(f64::from(row.total));
            table.push(
                co_label(row.course_outcome_id),
                course_text(&report.course_outcomes, row.course_outcome_id),
                cells,
            );
        }
        tables.push(table);

        let mut table = ReportTable::new(
            titles::CRITERION_ATTAINMENT,
            with_columns(criterion_columns(&report.criteria), &["Total"]),
        );
        for row in &report.criterion_attainment {
            let mut cells: Vec<f64> = row
                .contributions
                .iter()
                .map(|c| c.weighted_contribution)
                .collect();
            cells.push(row.total_max_score);
            table.push(
                co_label(row.course_outcome_id),
                course_text(&report.course_outcomes, row.course_outcome_id),
                cells,
            );
        }
        tables.push(table);

        if report.status == LessonStatus::Computed {
            let mut table = ReportTable::new(
                titles::STUDENT_ATTAINMENT,
                with_columns(
                    criterion_columns(&report.criteria),
                    &["Total", "Max", "Success %"],
                ),
            );
            for row in &report.student_attainment {
                let mut cells: Vec<f64> =
                    row.weighted_scores.iter().map(|s| s.weighted_score).collect();
                cells.extend([row.total_score, row.max_score, row.success_rate]);
                table.push(
                    format!(
                        "{} / {}",
                        student_label(row.student_id),
                        co_label(row.course_outcome_id)
                    ),
                    course_text(&report.course_outcomes, row.course_outcome_id),
                    cells,
                );
            }
            tables.push(table);

            let mut table = ReportTable::new(
                titles::PROGRAM_ATTAINMENT,
                with_columns(course_columns, &["Attainment"]),
            );
            for row in &report.program_attainment {
                let mut cells: Vec<f64> =
                    row.weighted_values.iter().map(|v| v.weighted_value).collect();
                cells.push(row.attainment_ratio);
                table.push(
                    format!(
                        "{} / {}",
                        student_label(row.student_id),
                        po_label(row.program_outcome_id)
                    ),
                    program_text(&report.program_outcomes, row.program_outcome_id),
                    cells,
                );
            }
            tables.push(table);
        }

        let mut table = ReportTable::new(
            titles::GRADES,
            with_columns(criterion_columns(&report.criteria), &["Grade"]),
        );
        for row in &report.grades {
            let mut cells: Vec<f64> = row.scores.iter().map(|(_, s)| *s).collect();
            cells.push(row.grade);
            table.push(student_label(row.student_id), None, cells);
        }
        tables.push(table);

        Self {
            lesson_id: report.lesson.id,
            lesson_name: report.lesson.name.clone(),
            status: report.status,
            issues: report.issues.iter().map(ToString::to_string).collect(),
            tables,
        }
    }
}
