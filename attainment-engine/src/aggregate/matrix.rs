//! Declared relation matrices of a lesson, as entered by the catalog admin.

use serde::{Deserialize, Serialize};

use crate::catalog::LessonCatalog;
use crate::metrics::{GRADE_PRECISION, mean_or_zero, round_to};
use crate::types::{CourseOutcomeId, LessonId, ProgramOutcomeId};

/// Program outcome row of the program↔course matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRelationRow {
    pub lesson_id: LessonId,
    pub program_outcome_id: ProgramOutcomeId,
    /// Relation per course outcome of the lesson, 0 where undeclared.
    pub values: Vec<(CourseOutcomeId, f64)>,
    /// Mean relation over the lesson's course outcomes, two decimals.
    pub relation_average: f64,
}

/// Course outcome row of the course↔criterion matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRelationRow {
    pub lesson_id: LessonId,
    pub course_outcome_id: CourseOutcomeId,
    /// Relation per lesson criterion, 0 where undeclared.
    pub values: Vec<(String, u8)>,
    /// Number of criteria assessing this outcome.
    pub total: u32,
}

pub fn program_relation_matrix(lesson: &LessonCatalog) -> Vec<ProgramRelationRow> {
    let relations = lesson.program_relation_index();

    lesson
        .program_outcomes
        .iter()
        .map(|po| {
            let values: Vec<(CourseOutcomeId, f64)> = lesson
                .course_outcomes
                .iter()
                .map(|co| (co.id, relations.get(&(po.id, co.id)).copied().unwrap_or(0.0)))
                .collect();
            let sum: f64 = values.iter().map(|(_, v)| v).sum();

            ProgramRelationRow {
                lesson_id: lesson.lesson_id(),
                program_outcome_id: po.id,
                relation_average: round_to(mean_or_zero(sum, values.len()), GRADE_PRECISION),
                values,
            }
        })
        .collect()
}

pub fn evaluation_relation_matrix(lesson: &LessonCatalog) -> Vec<EvaluationRelationRow> {
    let relations = lesson.evaluation_relation_index();

    lesson
        .course_outcomes
        .iter()
        .map(|co| {
            let values: Vec<(String, u8)> = lesson
                .criteria
                .iter()
                .map(|c| {
                    let value = relations
                        .get(&(co.id, c.name.as_str()))
                        .copied()
                        .unwrap_or(0);
                    (c.name.clone(), value)
                })
                .collect();
            let total = values.iter().map(|(_, v)| u32::from(*v)).sum();

            EvaluationRelationRow {
                lesson_id: lesson.lesson_id(),
                course_outcome_id: co.id,
                values,
                total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::*;

    #[test]
    fn program_matrix_fills_undeclared_cells_with_zero() {
        let rows = program_relation_matrix(&two_criteria_lesson());

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].values,
            vec![(CourseOutcomeId(1), 0.0), (CourseOutcomeId(2), 1.0)]
        );
    }

    #[test]
    fn program_matrix_averages_over_course_outcomes() {
        let rows = program_relation_matrix(&two_criteria_lesson());

        assert_eq!(rows[0].relation_average, 0.75);
        assert_eq!(rows[1].relation_average, 0.5);
    }

    #[test]
    fn program_matrix_average_is_zero_without_course_outcomes() {
        let mut lesson = two_criteria_lesson();
        lesson.course_outcomes.clear();

        let rows = program_relation_matrix(&lesson);

        assert!(rows.iter().all(|r| r.relation_average == 0.0));
    }

    #[test]
    fn program_matrix_average_rounds_to_two_places() {
        let mut lesson = two_criteria_lesson();
        lesson.course_outcomes.push(course_outcome(3, "Third"));

        let rows = program_relation_matrix(&lesson);

        // (1.0 + 0.5 + 0) / 3
        assert_eq!(rows[0].relation_average, 0.5);
        // (0 + 1.0 + 0) / 3
        assert_eq!(rows[1].relation_average, 0.33);
    }

    #[test]
    fn evaluation_matrix_counts_assessing_criteria() {
        let rows = evaluation_relation_matrix(&two_criteria_lesson());

        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[1].total, 1);
        assert_eq!(
            rows[1].values,
            vec![("Midterm".to_string(), 0), ("Final".to_string(), 1)]
        );
    }
}
