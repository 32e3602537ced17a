//! Program attainment: combines per-student course outcome success rates with
//! program↔course relation strengths.
//!
//! The ratio is `avg(relation * success_rate) / avg(relation)` over all
//! course outcomes of the lesson. Outcomes a program outcome is not related
//! to still count in both averages' denominator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::student::StudentAttainment;
use crate::catalog::LessonCatalog;
use crate::metrics::{RATE_PRECISION, mean_or_zero, ratio_or_zero, round_to};
use crate::types::{CourseOutcomeId, LessonId, ProgramOutcomeId, StudentId};

/// `relation * success_rate` for one course outcome, rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutcomeValue {
    pub course_outcome_id: CourseOutcomeId,
    pub weighted_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAttainment {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    pub program_outcome_id: ProgramOutcomeId,
    /// One entry per course outcome of the lesson, in catalog order.
    pub weighted_values: Vec<CourseOutcomeValue>,
    /// Rounded to one decimal. Zero when the program outcome has no relation
    /// weight in the lesson.
    pub attainment_ratio: f64,
}

/// Compute program attainment for every student × program outcome of the
/// lesson from the student attainment rows of the same lesson.
///
/// A student without a row for some course outcome counts as 0 there.
pub fn program_attainment(
    lesson: &LessonCatalog,
    students: &[StudentAttainment],
) -> Vec<ProgramAttainment> {
    let relations = lesson.program_relation_index();
    let success: BTreeMap<(StudentId, CourseOutcomeId), f64> = students
        .iter()
        .filter(|s| s.lesson_id == lesson.lesson_id())
        .map(|s| ((s.student_id, s.course_outcome_id), s.success_rate))
        .collect();

    let student_ids: Vec<StudentId> = lesson
        .unique_students()
        .into_iter()
        .map(|s| s.student_id)
        .collect();

    let outcome_count = lesson.course_outcomes.len();
    let mut rows = Vec::with_capacity(student_ids.len() * lesson.program_outcomes.len());

    for student_id in student_ids {
        for program_outcome in &lesson.program_outcomes {
            let mut success_sum = 0.0;
            let mut relation_sum = 0.0;
            let mut weighted_values = Vec::with_capacity(outcome_count);

            for outcome in &lesson.course_outcomes {
                let relation = relations
                    .get(&(program_outcome.id, outcome.id))
                    .copied()
                    .unwrap_or(0.0);
                let rate = success.get(&(student_id, outcome.id)).copied().unwrap_or(0.0);
                let weighted_value = relation * rate;

                success_sum += weighted_value;
                relation_sum += relation;
                weighted_values.push(CourseOutcomeValue {
                    course_outcome_id: outcome.id,
                    weighted_value: round_to(weighted_value, RATE_PRECISION),
                });
            }

            let avg_success = mean_or_zero(success_sum, outcome_count);
            let avg_relation = mean_or_zero(relation_sum, outcome_count);

            rows.push(ProgramAttainment {
                student_id,
                lesson_id: lesson.lesson_id(),
                program_outcome_id: program_outcome.id,
                weighted_values,
                attainment_ratio: round_to(
                    ratio_or_zero(avg_success, avg_relation),
                    RATE_PRECISION,
                ),
            });
        }
    }
    rows
}
