//! Storage traits and implementations for catalog and derived data.
//!
//! The pipeline only reads through [`CatalogSource`]. Derived tables are
//! written through [`AttainmentProjection`], which always replaces the
//! previous run wholesale.
//!
//! The Turso implementations store data in libSQL; [`CatalogSnapshot`] is
//! itself an in-memory source.

mod memory;
mod turso;

pub use turso::{TursoAttainmentProjection, TursoCatalogStore};

use async_trait::async_trait;

use crate::catalog::{
    CatalogSnapshot, CourseEvaluationRelation, CourseOutcome, EvaluationCriterion, Lesson,
    LessonCatalog, ProgramCourseRelation, ProgramOutcome, StudentRecord,
};
use crate::error::Result;
use crate::pipeline::AttainmentReport;
use crate::types::LessonId;

/// Read-only access to catalog and score data.
///
/// Every per-lesson read returns an empty collection for an unknown lesson
/// rather than an error.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// All lessons, ordered by id.
    async fn lessons(&self) -> Result<Vec<Lesson>>;

    async fn program_outcomes(&self, lesson_id: LessonId) -> Result<Vec<ProgramOutcome>>;

    async fn course_outcomes(&self, lesson_id: LessonId) -> Result<Vec<CourseOutcome>>;

    /// Criteria in declaration order.
    async fn evaluation_criteria(&self, lesson_id: LessonId) -> Result<Vec<EvaluationCriterion>>;

    async fn program_course_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<ProgramCourseRelation>>;

    async fn course_evaluation_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<CourseEvaluationRelation>>;

    /// Student score records, ordered by student id.
    async fn student_records(&self, lesson_id: LessonId) -> Result<Vec<StudentRecord>>;

    /// Load everything belonging to one lesson.
    async fn lesson_catalog(&self, lesson: Lesson) -> Result<LessonCatalog> {
        let id = lesson.id;
        Ok(LessonCatalog {
            program_outcomes: self.program_outcomes(id).await?,
            course_outcomes: self.course_outcomes(id).await?,
            criteria: self.evaluation_criteria(id).await?,
            program_course_relations: self.program_course_relations(id).await?,
            course_evaluation_relations: self.course_evaluation_relations(id).await?,
            students: self.student_records(id).await?,
            lesson,
        })
    }

    /// Load the whole catalog.
    ///
    /// Implementations backed by a mutable store should override this to read
    /// inside a single transaction.
    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let mut lessons = Vec::new();
        for lesson in self.lessons().await? {
            lessons.push(self.lesson_catalog(lesson).await?);
        }
        Ok(CatalogSnapshot::new(lessons))
    }
}

/// Persists derived tables.
#[async_trait]
pub trait AttainmentProjection: Send + Sync {
    /// Replace every stored derived row with the rows of `report`.
    async fn replace(&self, report: &AttainmentReport) -> Result<()>;

    /// Remove all derived rows.
    async fn clear(&self) -> Result<()>;
}
