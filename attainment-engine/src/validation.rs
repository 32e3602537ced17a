//! Per-lesson data checks run before attainment is computed.
//!
//! Only bad criterion weights block a lesson: a total other than 100, or a
//! single weight above 100. Every other
//! issue is informational: the aggregators already treat the offending rows
//! as zero contributions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{LessonCatalog, REQUIRED_WEIGHT_TOTAL};
use crate::types::{CourseOutcomeId, ProgramOutcomeId, StudentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Criterion weights do not add up to 100 (including a lesson with no
    /// criteria at all).
    WeightTotalMismatch { total: u64 },
    /// A single criterion weighs more than the whole lesson.
    WeightOutOfRange { criterion: String, weight: u32 },
    ProgramRelationOutOfRange {
        program_outcome_id: ProgramOutcomeId,
        course_outcome_id: CourseOutcomeId,
        value: f64,
    },
    EvaluationRelationOutOfRange {
        course_outcome_id: CourseOutcomeId,
        criterion: String,
        value: u8,
    },
    ScoreOutOfRange {
        student_id: StudentId,
        criterion: String,
        score: f64,
    },
    UnknownProgramOutcome { program_outcome_id: ProgramOutcomeId },
    UnknownCourseOutcome { course_outcome_id: CourseOutcomeId },
    UnknownCriterion { criterion: String },
    UndeclaredScore { student_id: StudentId, criterion: String },
    /// More than one record for the student; the last one is used.
    DuplicateStudentRecord { student_id: StudentId },
}

impl ValidationIssue {
    /// Whether the issue stops student and program aggregation for the lesson.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::WeightTotalMismatch { .. } | Self::WeightOutOfRange { .. }
        )
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightTotalMismatch { total } => write!(
                f,
                "criterion weights sum to {}, expected {}",
                total, REQUIRED_WEIGHT_TOTAL
            ),
            Self::WeightOutOfRange { criterion, weight } => write!(
                f,
                "criterion {} weighs {}, expected at most {}",
                criterion, weight, REQUIRED_WEIGHT_TOTAL
            ),
            Self::ProgramRelationOutOfRange {
                program_outcome_id,
                course_outcome_id,
                value,
            } => write!(
                f,
                "relation PO{} -> CO{} is {}, expected 0..=1",
                program_outcome_id, course_outcome_id, value
            ),
            Self::EvaluationRelationOutOfRange {
                course_outcome_id,
                criterion,
                value,
            } => write!(
                f,
                "relation CO{} -> {} is {}, expected 0 or 1",
                course_outcome_id, criterion, value
            ),
            Self::ScoreOutOfRange {
                student_id,
                criterion,
                score,
            } => write!(
                f,
                "student {} scored {} on {}, expected 0..=100",
                student_id, score, criterion
            ),
            Self::UnknownProgramOutcome { program_outcome_id } => {
                write!(f, "relation references unknown program outcome {}", program_outcome_id)
            }
            Self::UnknownCourseOutcome { course_outcome_id } => {
                write!(f, "relation references unknown course outcome {}", course_outcome_id)
            }
            Self::UnknownCriterion { criterion } => {
                write!(f, "relation references unknown criterion {}", criterion)
            }
            Self::UndeclaredScore {
                student_id,
                criterion,
            } => write!(
                f,
                "student {} has a score for undeclared criterion {}",
                student_id, criterion
            ),
            Self::DuplicateStudentRecord { student_id } => {
                write!(f, "student {} has more than one record", student_id)
            }
        }
    }
}

/// Check one lesson. Blocking issues come first.
pub fn validate_lesson(lesson: &LessonCatalog) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total = lesson.weight_total();
    if total != u64::from(REQUIRED_WEIGHT_TOTAL) {
        issues.push(ValidationIssue::WeightTotalMismatch { total });
    }
    for criterion in &lesson.criteria {
        if criterion.weight > REQUIRED_WEIGHT_TOTAL {
            issues.push(ValidationIssue::WeightOutOfRange {
                criterion: criterion.name.clone(),
                weight: criterion.weight,
            });
        }
    }

    let mut unknown_programs = BTreeSet::new();
    let mut unknown_courses = BTreeSet::new();
    let mut unknown_criteria = BTreeSet::new();

    for relation in &lesson.program_course_relations {
        if !(0.0..=1.0).contains(&relation.value) {
            issues.push(ValidationIssue::ProgramRelationOutOfRange {
                program_outcome_id: relation.program_outcome_id,
                course_outcome_id: relation.course_outcome_id,
                value: relation.value,
            });
        }
        if !lesson.has_program_outcome(relation.program_outcome_id) {
            unknown_programs.insert(relation.program_outcome_id);
        }
        if !lesson.has_course_outcome(relation.course_outcome_id) {
            unknown_courses.insert(relation.course_outcome_id);
        }
    }

    for relation in &lesson.course_evaluation_relations {
        if relation.value > 1 {
            issues.push(ValidationIssue::EvaluationRelationOutOfRange {
                course_outcome_id: relation.course_outcome_id,
                criterion: relation.criterion.clone(),
                value: relation.value,
            });
        }
        if !lesson.has_course_outcome(relation.course_outcome_id) {
            unknown_courses.insert(relation.course_outcome_id);
        }
        if lesson.weight_of(&relation.criterion).is_none() {
            unknown_criteria.insert(relation.criterion.clone());
        }
    }

    let mut seen_students = BTreeSet::new();
    let mut duplicate_students = BTreeSet::new();
    for student in &lesson.students {
        if !seen_students.insert(student.student_id) {
            duplicate_students.insert(student.student_id);
        }
    }

    for student in lesson.unique_students() {
        for (criterion, &score) in &student.scores {
            if lesson.weight_of(criterion).is_none() {
                issues.push(ValidationIssue::UndeclaredScore {
                    student_id: student.student_id,
                    criterion: criterion.clone(),
                });
            } else if !(0.0..=100.0).contains(&score) {
                issues.push(ValidationIssue::ScoreOutOfRange {
                    student_id: student.student_id,
                    criterion: criterion.clone(),
                    score,
                });
            }
        }
    }

    issues.extend(
        unknown_programs
            .into_iter()
            .map(|program_outcome_id| ValidationIssue::UnknownProgramOutcome { program_outcome_id }),
    );
    issues.extend(
        unknown_courses
            .into_iter()
            .map(|course_outcome_id| ValidationIssue::UnknownCourseOutcome { course_outcome_id }),
    );
    issues.extend(
        unknown_criteria
            .into_iter()
            .map(|criterion| ValidationIssue::UnknownCriterion { criterion }),
    );
    issues.extend(
        duplicate_students
            .into_iter()
            .map(|student_id| ValidationIssue::DuplicateStudentRecord { student_id }),
    );

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::*;
    use crate::catalog::StudentRecord;

    #[test]
    fn compliant_lesson_has_no_issues() {
        assert!(validate_lesson(&two_criteria_lesson()).is_empty());
        assert!(validate_lesson(&midterm_only_lesson()).is_empty());
    }

    #[test]
    fn weight_total_mismatch_is_blocking() {
        let mut lesson = two_criteria_lesson();
        lesson.criteria[0].weight = 30;

        let issues = validate_lesson(&lesson);

        assert_eq!(issues[0], ValidationIssue::WeightTotalMismatch { total: 90 });
        assert!(issues[0].is_blocking());
    }

    #[test]
    fn lesson_without_criteria_is_flagged() {
        let mut lesson = two_criteria_lesson();
        lesson.criteria.clear();

        let issues = validate_lesson(&lesson);

        assert_eq!(issues[0], ValidationIssue::WeightTotalMismatch { total: 0 });
    }

    #[test]
    fn out_of_range_values_are_reported_but_not_blocking() {
        let mut lesson = two_criteria_lesson();
        lesson.program_course_relations[0].value = 1.5;
        lesson.course_evaluation_relations[0].value = 2;
        lesson.students[0].scores.insert("Final".to_string(), 120.0);

        let issues = validate_lesson(&lesson);

        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| !i.is_blocking()));
        assert!(issues.iter().any(|i| matches!(
            i,
            ValidationIssue::ScoreOutOfRange { score, .. } if *score == 120.0
        )));
    }

    #[test]
    fn unknown_references_are_reported_once() {
        let mut lesson = midterm_only_lesson();
        lesson.program_course_relations.push(program_relation(1, 9, 1.0));
        lesson.program_course_relations.push(program_relation(7, 9, 1.0));
        lesson.course_evaluation_relations.push(evaluation_relation(1, "Lab", 1));
        lesson.course_evaluation_relations.push(evaluation_relation(9, "Lab", 1));

        let issues = validate_lesson(&lesson);

        assert_eq!(
            issues,
            vec![
                ValidationIssue::UnknownProgramOutcome {
                    program_outcome_id: ProgramOutcomeId(7)
                },
                ValidationIssue::UnknownCourseOutcome {
                    course_outcome_id: CourseOutcomeId(9)
                },
                ValidationIssue::UnknownCriterion {
                    criterion: "Lab".to_string()
                },
            ]
        );
    }

    #[test]
    fn score_for_undeclared_criterion_is_reported() {
        let mut lesson = midterm_only_lesson();
        lesson.students[0].scores.insert("Quiz".to_string(), 50.0);

        let issues = validate_lesson(&lesson);

        assert_eq!(
            issues,
            vec![ValidationIssue::UndeclaredScore {
                student_id: StudentId(1),
                criterion: "Quiz".to_string()
            }]
        );
    }

    #[test]
    fn issues_render_readable_messages() {
        let issue = ValidationIssue::WeightTotalMismatch { total: 90 };
        assert_eq!(issue.to_string(), "criterion weights sum to 90, expected 100");
    }

    #[test]
    fn oversized_weights_are_blocking_even_when_they_wrap_to_100() {
        let mut lesson = two_criteria_lesson();
        lesson.criteria[0].weight = u32::MAX;
        lesson.criteria[1].weight = 101;

        let issues = validate_lesson(&lesson);

        assert_eq!(
            issues[0],
            ValidationIssue::WeightTotalMismatch {
                total: u64::from(u32::MAX) + 101
            }
        );
        assert!(issues.contains(&ValidationIssue::WeightOutOfRange {
            criterion: "Midterm".to_string(),
            weight: u32::MAX,
        }));
        assert!(issues.contains(&ValidationIssue::WeightOutOfRange {
            criterion: "Final".to_string(),
            weight: 101,
        }));
        assert!(issues[1].is_blocking());
    }

    #[test]
    fn duplicate_student_record_is_a_warning() {
        let mut lesson = midterm_only_lesson();
        lesson
            .students
            .push(StudentRecord::new(StudentId(1), LESSON).with_score("Midterm", 60.0));

        let issues = validate_lesson(&lesson);

        assert_eq!(
            issues,
            vec![ValidationIssue::DuplicateStudentRecord {
                student_id: StudentId(1)
            }]
        );
        assert!(!issues[0].is_blocking());
    }
}
