//! Student attainment: realized weighted score per (student, course outcome)
//! and the success rate against the outcome's maximum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::criterion::CriterionAttainment;
use crate::catalog::LessonCatalog;
use crate::metrics::{RATE_PRECISION, ratio_or_zero, round_to};
use crate::types::{CourseOutcomeId, LessonId, StudentId};

/// One criterion's realized contribution for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    /// `raw_score * weight * relation_value / 100`, 0 when ungraded.
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAttainment {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    pub course_outcome_id: CourseOutcomeId,
    /// One entry per lesson criterion, in declaration order.
    pub weighted_scores: Vec<CriterionScore>,
    pub total_score: f64,
    /// `100 * total_max_score` of the outcome.
    pub max_score: f64,
    /// Percentage, rounded to one decimal. Zero when `max_score` is zero.
    pub success_rate: f64,
}

/// Compute student attainment for every student × course outcome of the
/// lesson.
///
/// Outcomes missing from `criteria` are treated as unassessed.
pub fn student_attainment(
    lesson: &LessonCatalog,
    criteria: &[CriterionAttainment],
) -> Vec<StudentAttainment> {
    let relations = lesson.evaluation_relation_index();
    let max_totals: BTreeMap<CourseOutcomeId, f64> = criteria
        .iter()
        .filter(|c| c.lesson_id == lesson.lesson_id())
        .map(|c| (c.course_outcome_id, c.total_max_score))
        .collect();

    let students = lesson.unique_students();

    let mut rows = Vec::with_capacity(students.len() * lesson.course_outcomes.len());
    for student in students {
        for outcome in &lesson.course_outcomes {
            let weighted_scores: Vec<CriterionScore> = lesson
                .criteria
                .iter()
                .map(|criterion| {
                    let relation = relations
                        .get(&(outcome.id, criterion.name.as_str()))
                        .copied()
                        .unwrap_or(0);
                    let weighted_score = match student.score(&criterion.name) {
                        Some(score) if relation != 0 => {
                            score * f64::from(criterion.weight) * f64::from(relation) / 100.0
                        }
                        _ => 0.0,
                    };
                    CriterionScore {
                        criterion: criterion.name.clone(),
                        weighted_score,
                    }
                })
                .collect();

            let total_score: f64 = weighted_scores.iter().map(|s| s.weighted_score).sum();
            let max_score = max_totals.get(&outcome.id).copied().unwrap_or(0.0) * 100.0;
            let success_rate = round_to(
                ratio_or_zero(total_score, max_score) * 100.0,
                RATE_PRECISION,
            );

            rows.push(StudentAttainment {
                student_id: student.student_id,
                lesson_id: lesson.lesson_id(),
                course_outcome_id: outcome.id,
                weighted_scores,
                total_score,
                max_score,
                success_rate,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::criterion::criterion_attainment;
    use crate::aggregate::test_support::*;
    use crate::catalog::StudentRecord;

    fn run(lesson: &LessonCatalog) -> Vec<StudentAttainment> {
        student_attainment(lesson, &criterion_attainment(lesson))
    }

    fn find(rows: &[StudentAttainment], student: i64, outcome: i64) -> &StudentAttainment {
        rows.iter()
            .find(|r| r.student_id == StudentId(student) && r.course_outcome_id == CourseOutcomeId(outcome))
            .unwrap()
    }

    #[test]
    fn midterm_example_yields_eighty_percent() {
        let rows = run(&midterm_only_lesson());

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_score, 80.0);
        assert_eq!(row.max_score, 100.0);
        assert_eq!(row.success_rate, 80.0);
    }

    #[test]
    fn covers_full_cross_product_of_students_and_outcomes() {
        let lesson = two_criteria_lesson();
        let rows = run(&lesson);

        assert_eq!(rows.len(), lesson.students.len() * lesson.course_outcomes.len());
    }

    #[test]
    fn weighted_scores_combine_all_linked_criteria() {
        let rows = run(&two_criteria_lesson());

        // S1: Midterm 70 * 40 / 100 = 28, Final 90 * 60 / 100 = 54
        let row = find(&rows, 1, 1);
        assert_eq!(row.weighted_scores[0].weighted_score, 28.0);
        assert_eq!(row.weighted_scores[1].weighted_score, 54.0);
        assert_eq!(row.total_score, 82.0);
        assert_eq!(row.max_score, 100.0);
        assert_eq!(row.success_rate, 82.0);

        // CO2 is assessed by Final only: 54 / 60
        let row = find(&rows, 1, 2);
        assert_eq!(row.total_score, 54.0);
        assert_eq!(row.max_score, 60.0);
        assert_eq!(row.success_rate, 90.0);
    }

    #[test]
    fn missing_score_contributes_nothing() {
        let rows = run(&two_criteria_lesson());

        // S2 has no Final score
        let row = find(&rows, 2, 1);
        assert_eq!(row.weighted_scores[1].weighted_score, 0.0);
        assert_eq!(row.total_score, 20.0);
        assert_eq!(row.success_rate, 20.0);

        let row = find(&rows, 2, 2);
        assert_eq!(row.total_score, 0.0);
        assert_eq!(row.success_rate, 0.0);
    }

    #[test]
    fn unassessed_outcome_has_zero_success_rate() {
        let mut lesson = two_criteria_lesson();
        lesson.course_outcomes.push(course_outcome(3, "Unassessed"));

        let rows = run(&lesson);

        for row in rows.iter().filter(|r| r.course_outcome_id == CourseOutcomeId(3)) {
            assert_eq!(row.max_score, 0.0);
            assert_eq!(row.success_rate, 0.0);
        }
    }

    #[test]
    fn success_rate_is_rounded_to_one_decimal() {
        let mut lesson = midterm_only_lesson();
        lesson.students[0].scores.insert("Midterm".to_string(), 66.666);

        let rows = run(&lesson);

        assert_eq!(rows[0].success_rate, 66.7);
        assert!((rows[0].total_score - 66.666).abs() < 1e-9);
    }

    #[test]
    fn raising_a_relation_never_lowers_total_score() {
        let mut lesson = two_criteria_lesson();
        let before = find(&run(&lesson), 1, 2).total_score;

        // Link Midterm to CO2 as well
        lesson
            .course_evaluation_relations
            .push(evaluation_relation(2, "Midterm", 1));
        let after = find(&run(&lesson), 1, 2).total_score;

        assert!(after >= before);
        assert_eq!(after, 82.0);
    }

    #[test]
    fn students_are_ordered_by_id() {
        let mut lesson = two_criteria_lesson();
        lesson.students.reverse();

        let rows = run(&lesson);

        assert_eq!(rows[0].student_id, StudentId(1));
        assert_eq!(rows.last().unwrap().student_id, StudentId(2));
    }

    #[test]
    fn missing_criterion_attainment_is_treated_as_unassessed() {
        let lesson = midterm_only_lesson();

        let rows = student_attainment(&lesson, &[]);

        assert_eq!(rows[0].total_score, 80.0);
        assert_eq!(rows[0].max_score, 0.0);
        assert_eq!(rows[0].success_rate, 0.0);
    }

    #[test]
    fn duplicate_student_record_yields_one_row_per_outcome() {
        let mut lesson = midterm_only_lesson();
        lesson
            .students
            .push(StudentRecord::new(StudentId(1), LESSON).with_score("Midterm", 60.0));

        let rows = run(&lesson);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].success_rate, 60.0);
    }
}
