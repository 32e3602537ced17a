//! Weighted course grade per student, independent of outcomes.

use serde::{Deserialize, Serialize};

use crate::catalog::{LessonCatalog, REQUIRED_WEIGHT_TOTAL};
use crate::metrics::{GRADE_PRECISION, ratio_or_zero, round_to};
use crate::types::{LessonId, StudentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseGrade {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    /// Raw score per lesson criterion, 0 where ungraded.
    pub scores: Vec<(String, f64)>,
    /// Two decimals.
    pub grade: f64,
}

/// Weighted grade of every student in the lesson.
///
/// Only graded criteria count. When their weights reach the full 100 the
/// weighted sum is divided by 100, otherwise by the weight actually graded,
/// so a partially graded student is averaged over what exists so far.
pub fn course_grades(lesson: &LessonCatalog) -> Vec<CourseGrade> {
    lesson
        .unique_students()
        .into_iter()
        .map(|student| {
            let mut weighted_sum = 0.0;
            let mut graded_weight = 0u64;
            let mut scores = Vec::with_capacity(lesson.criteria.len());

            for criterion in &lesson.criteria {
                match student.score(&criterion.name) {
                    Some(score) => {
                        weighted_sum += score * f64::from(criterion.weight);
                        graded_weight += u64::from(criterion.weight);
                        scores.push((criterion.name.clone(), score));
                    }
                    None => scores.push((criterion.name.clone(), 0.0)),
                }
            }

            let divisor = if graded_weight == u64::from(REQUIRED_WEIGHT_TOTAL) {
                f64::from(REQUIRED_WEIGHT_TOTAL)
            } else {
                graded_weight as f64
            };

            CourseGrade {
                student_id: student.student_id,
                lesson_id: lesson.lesson_id(),
                scores,
                grade: round_to(ratio_or_zero(weighted_sum, divisor), GRADE_PRECISION),
            }
        })
        .collect()
}
