//! [`CatalogSource`] over an in-memory [`CatalogSnapshot`].

use async_trait::async_trait;

use super::CatalogSource;
use crate::catalog::{
    CatalogSnapshot, CourseEvaluationRelation, CourseOutcome, EvaluationCriterion, Lesson,
    LessonCatalog, ProgramCourseRelation, ProgramOutcome, StudentRecord,
};
use crate::error::Result;
use crate::types::LessonId;

impl CatalogSnapshot {
    fn lesson_rows<T: Clone>(&self, id: LessonId, f: impl Fn(&LessonCatalog) -> &Vec<T>) -> Vec<T> {
        self.lesson(id).map(|l| f(l).clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogSource for CatalogSnapshot {
    async fn lessons(&self) -> Result<Vec<Lesson>> {
        Ok(self.lessons.iter().map(|l| l.lesson.clone()).collect())
    }

    async fn program_outcomes(&self, lesson_id: LessonId) -> Result<Vec<ProgramOutcome>> {
        Ok(self.lesson_rows(lesson_id, |l| &l.program_outcomes))
    }

    async fn course_outcomes(&self, lesson_id: LessonId) -> Result<Vec<CourseOutcome>> {
        Ok(self.lesson_rows(lesson_id, |l| &l.course_outcomes))
    }

    async fn evaluation_criteria(&self, lesson_id: LessonId) -> Result<Vec<EvaluationCriterion>> {
        Ok(self.lesson_rows(lesson_id, |l| &l.criteria))
    }

    async fn program_course_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<ProgramCourseRelation>> {
        Ok(self.lesson_rows(lesson_id, |l| &l.program_course_relations))
    }

    async fn course_evaluation_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<CourseEvaluationRelation>> {
        Ok(self.lesson_rows(lesson_id, |l| &l.course_evaluation_relations))
    }

    async fn student_records(&self, lesson_id: LessonId) -> Result<Vec<StudentRecord>> {
        let mut records = self.lesson_rows(lesson_id, |l| &l.students);
        records.sort_by_key(|r| r.student_id);
        Ok(records)
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(self.clone())
    }
}
