//! Reference data for attainment runs.
//!
//! Everything here is read-only for the pipeline. A [`CatalogSnapshot`] is
//! taken once before any aggregator runs, so every lesson is computed against
//! the same consistent view of the catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CourseOutcomeId, LessonId, ProgramOutcomeId, StudentId};

/// The weight every lesson's criteria must add up to.
pub const REQUIRED_WEIGHT_TOTAL: u32 = 100;

/// A course offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub name: String,
}

/// An institution-level competency, declared per lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramOutcome {
    pub id: ProgramOutcomeId,
    pub text: String,
    pub lesson_id: LessonId,
}

/// A course-level learning objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub id: CourseOutcomeId,
    pub text: String,
    pub lesson_id: LessonId,
}

/// A graded assessment component with its percentage weight in the lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub name: String,
    /// Percentage weight, 0 to 100.
    pub weight: u32,
    pub lesson_id: LessonId,
}

/// How strongly a course outcome supports a program outcome, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramCourseRelation {
    pub program_outcome_id: ProgramOutcomeId,
    pub course_outcome_id: CourseOutcomeId,
    pub lesson_id: LessonId,
    pub value: f64,
}

/// Whether a criterion assesses a course outcome (`0` or `1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEvaluationRelation {
    pub course_outcome_id: CourseOutcomeId,
    pub criterion: String,
    pub lesson_id: LessonId,
    pub value: u8,
}

/// Raw criterion scores of one student in one lesson.
///
/// A criterion missing from `scores` has not been graded yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

impl StudentRecord {
    /// Create a record with no scores yet.
    #[must_use]
    pub fn new(student_id: StudentId, lesson_id: LessonId) -> Self {
        Self {
            student_id,
            lesson_id,
            scores: BTreeMap::new(),
        }
    }

    /// Builder-style helper to set one score.
    #[must_use]
    pub fn with_score(mut self, criterion: impl Into<String>, score: f64) -> Self {
        self.scores.insert(criterion.into(), score);
        self
    }

    /// The raw score for `criterion`, if graded.
    pub fn score(&self, criterion: &str) -> Option<f64> {
        self.scores.get(criterion).copied()
    }
}

/// Every catalog and score row belonging to one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonCatalog {
    pub lesson: Lesson,
    #[serde(default)]
    pub program_outcomes: Vec<ProgramOutcome>,
    #[serde(default)]
    pub course_outcomes: Vec<CourseOutcome>,
    #[serde(default)]
    pub criteria: Vec<EvaluationCriterion>,
    #[serde(default)]
    pub program_course_relations: Vec<ProgramCourseRelation>,
    #[serde(default)]
    pub course_evaluation_relations: Vec<CourseEvaluationRelation>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
}

impl LessonCatalog {
    /// An empty catalog for `lesson`.
    #[must_use]
    pub fn new(lesson: Lesson) -> Self {
        Self {
            lesson,
            program_outcomes: Vec::new(),
            course_outcomes: Vec::new(),
            criteria: Vec::new(),
            program_course_relations: Vec::new(),
            course_evaluation_relations: Vec::new(),
            students: Vec::new(),
        }
    }

    pub fn lesson_id(&self) -> LessonId {
        self.lesson.id
    }

    /// Sum of all criterion weights declared for the lesson. Widened so any
    /// set of `u32` weights sums exactly.
    pub fn weight_total(&self) -> u64 {
        weight_sum(&self.criteria)
    }

    /// Weight of the named criterion, if the lesson declares it.
    pub fn weight_of(&self, criterion: &str) -> Option<u32> {
        self.criteria
            .iter()
            .find(|c| c.name == criterion)
            .map(|c| c.weight)
    }

    pub fn has_course_outcome(&self, id: CourseOutcomeId) -> bool {
        self.course_outcomes.iter().any(|co| co.id == id)
    }

    pub fn has_program_outcome(&self, id: ProgramOutcomeId) -> bool {
        self.program_outcomes.iter().any(|po| po.id == id)
    }

    /// The lesson's students, one record per id in id order. When a student
    /// appears twice the later record wins.
    pub fn unique_students(&self) -> Vec<&StudentRecord> {
        let by_id: BTreeMap<StudentId, &StudentRecord> = self
            .students
            .iter()
            .filter(|s| s.lesson_id == self.lesson.id)
            .map(|s| (s.student_id, s))
            .collect();
        by_id.into_values().collect()
    }

    /// Program↔course relation strengths keyed by pair. Later rows win.
    pub fn program_relation_index(&self) -> BTreeMap<(ProgramOutcomeId, CourseOutcomeId), f64> {
        self.program_course_relations
            .iter()
            .map(|r| ((r.program_outcome_id, r.course_outcome_id), r.value))
            .collect()
    }

    /// Course↔criterion applicability keyed by pair. Later rows win.
    pub fn evaluation_relation_index(&self) -> BTreeMap<(CourseOutcomeId, &str), u8> {
        self.course_evaluation_relations
            .iter()
            .map(|r| ((r.course_outcome_id, r.criterion.as_str()), r.value))
            .collect()
    }
}

/// Sum of criterion weights without overflow.
pub fn weight_sum(criteria: &[EvaluationCriterion]) -> u64 {
    criteria.iter().map(|c| u64::from(c.weight)).sum()
}

/// A read-consistent copy of the whole catalog, one entry per lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub lessons: Vec<LessonCatalog>,
}

impl CatalogSnapshot {
    /// Build a snapshot, ordering lessons by id.
    #[must_use]
    pub fn new(mut lessons: Vec<LessonCatalog>) -> Self {
        lessons.sort_by_key(|l| l.lesson.id);
        Self { lessons }
    }

    pub fn lesson(&self, id: LessonId) -> Option<&LessonCatalog> {
        self.lessons.iter().find(|l| l.lesson.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// Keep only the given lesson. Unknown ids leave an empty snapshot.
    #[must_use]
    pub fn only(self, id: LessonId) -> Self {
        Self {
            lessons: self
                .lessons
                .into_iter()
                .filter(|l| l.lesson.id == id)
                .collect(),
        }
    }
}
