//! Runs every aggregator for every lesson of a catalog snapshot.
//!
//! Lessons are computed independently: a lesson that fails validation is
//! flagged and gets no student or program attainment, while the remaining
//! lessons are unaffected.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::aggregate::criterion::{CriterionAttainment, criterion_attainment};
use crate::aggregate::grades::{CourseGrade, course_grades};
use crate::aggregate::matrix::{
    EvaluationRelationRow, ProgramRelationRow, evaluation_relation_matrix, program_relation_matrix,
};
use crate::aggregate::program::{ProgramAttainment, program_attainment};
use crate::aggregate::student::{StudentAttainment, student_attainment};
use crate::catalog::{
    CatalogSnapshot, CourseOutcome, EvaluationCriterion, Lesson, LessonCatalog, ProgramOutcome,
};
use crate::error::{Error, Result};
use crate::storage::CatalogSource;
use crate::types::LessonId;
use crate::validation::{ValidationIssue, validate_lesson};

/// Outcome of a lesson run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    /// Every aggregation ran.
    Computed,
    /// A blocking validation issue was found; student and program attainment
    /// were skipped.
    Flagged,
}

impl LessonStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Computed => "computed",
            Self::Flagged => "flagged",
        }
    }
}

/// Everything derived for one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonReport {
    pub lesson: Lesson,
    pub status: LessonStatus,
    pub issues: Vec<ValidationIssue>,

    // Labels for rendering
    pub program_outcomes: Vec<ProgramOutcome>,
    pub course_outcomes: Vec<CourseOutcome>,
    pub criteria: Vec<EvaluationCriterion>,

    pub program_relations: Vec<ProgramRelationRow>,
    pub evaluation_relations: Vec<EvaluationRelationRow>,
    pub criterion_attainment: Vec<CriterionAttainment>,
    pub student_attainment: Vec<StudentAttainment>,
    pub program_attainment: Vec<ProgramAttainment>,
    pub grades: Vec<CourseGrade>,
}

impl LessonReport {
    pub fn is_flagged(&self) -> bool {
        self.status == LessonStatus::Flagged
    }
}

/// Derived tables for a whole catalog, one entry per lesson ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttainmentReport {
    pub lessons: Vec<LessonReport>,
}

impl AttainmentReport {
    pub fn lesson(&self, id: LessonId) -> Option<&LessonReport> {
        self.lessons.iter().find(|l| l.lesson.id == id)
    }

    pub fn flagged(&self) -> impl Iterator<Item = &LessonReport> {
        self.lessons.iter().filter(|l| l.is_flagged())
    }

    pub fn has_flagged(&self) -> bool {
        self.flagged().next().is_some()
    }

    pub fn criterion_rows(&self) -> impl Iterator<Item = &CriterionAttainment> {
        self.lessons.iter().flat_map(|l| &l.criterion_attainment)
    }

    pub fn student_rows(&self) -> impl Iterator<Item = &StudentAttainment> {
        self.lessons.iter().flat_map(|l| &l.student_attainment)
    }

    pub fn program_rows(&self) -> impl Iterator<Item = &ProgramAttainment> {
        self.lessons.iter().flat_map(|l| &l.program_attainment)
    }
}

/// Validate and aggregate a single lesson.
#[instrument(skip(lesson), fields(lesson_id = %lesson.lesson.id), level = "debug")]
pub fn run_lesson(lesson: &LessonCatalog) -> LessonReport {
    let issues = validate_lesson(lesson);
    let flagged = issues.iter().any(ValidationIssue::is_blocking);

    for issue in issues.iter().filter(|i| !i.is_blocking()) {
        debug!(lesson = %lesson.lesson.name, %issue, "validation warning");
    }

    let criterion_rows = criterion_attainment(lesson);

    let (status, student_rows, program_rows) = if flagged {
        for issue in issues.iter().filter(|i| i.is_blocking()) {
            warn!(lesson = %lesson.lesson.name, %issue, "skipping student and program attainment");
        }
        (LessonStatus::Flagged, Vec::new(), Vec::new())
    } else {
        let student_rows = student_attainment(lesson, &criterion_rows);
        let program_rows = program_attainment(lesson, &student_rows);
        (LessonStatus::Computed, student_rows, program_rows)
    };

    debug!(
        status = status.as_str(),
        course_outcomes = criterion_rows.len(),
        student_rows = student_rows.len(),
        program_rows = program_rows.len(),
        "lesson aggregated"
    );

    LessonReport {
        lesson: lesson.lesson.clone(),
        status,
        program_outcomes: lesson.program_outcomes.clone(),
        course_outcomes: lesson.course_outcomes.clone(),
        criteria: lesson.criteria.clone(),
        program_relations: program_relation_matrix(lesson),
        evaluation_relations: evaluation_relation_matrix(lesson),
        criterion_attainment: criterion_rows,
        student_attainment: student_rows,
        program_attainment: program_rows,
        grades: course_grades(lesson),
        issues,
    }
}

/// Aggregate every lesson of the snapshot.
pub fn run_pipeline(snapshot: &CatalogSnapshot) -> AttainmentReport {
    let lessons: Vec<LessonReport> = snapshot.lessons.iter().map(run_lesson).collect();
    let flagged = lessons.iter().filter(|l| l.is_flagged()).count();
    info!(lessons = lessons.len(), flagged, "attainment pipeline finished");
    AttainmentReport { lessons }
}

/// Snapshot `source` and run the pipeline over it.
pub async fn run_from_source(source: &dyn CatalogSource) -> Result<AttainmentReport> {
    let snapshot = source.snapshot().await?;
    Ok(run_pipeline(&snapshot))
}

/// Snapshot `source` and run the pipeline for one lesson only.
pub async fn run_lesson_from_source(
    source: &dyn CatalogSource,
    lesson_id: LessonId,
) -> Result<AttainmentReport> {
    let snapshot = source.snapshot().await?;
    if snapshot.lesson(lesson_id).is_none() {
        return Err(Error::LessonNotFound(lesson_id));
    }
    Ok(run_pipeline(&snapshot.only(lesson_id)))
}
