//! Criterion attainment: how much each criterion can contribute to a course
//! outcome, and the outcome's maximum attainable weighted total.

use serde::{Deserialize, Serialize};

use crate::catalog::LessonCatalog;
use crate::types::{CourseOutcomeId, LessonId};

/// One criterion's share of a course outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionContribution {
    pub criterion: String,
    /// `relation_value * weight / 100`
    pub weighted_contribution: f64,
}

/// Maximum attainable weighted total for a course outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionAttainment {
    pub lesson_id: LessonId,
    pub course_outcome_id: CourseOutcomeId,
    /// One entry per lesson criterion, in declaration order.
    pub contributions: Vec<CriterionContribution>,
    /// Zero means no criterion assesses this outcome.
    pub total_max_score: f64,
}

impl CriterionAttainment {
    pub fn contribution(&self, criterion: &str) -> f64 {
        self.contributions
            .iter()
            .find(|c| c.criterion == criterion)
            .map_or(0.0, |c| c.weighted_contribution)
    }

    pub fn is_assessed(&self) -> bool {
        self.total_max_score != 0.0
    }
}

/// Compute criterion attainment for every course outcome of the lesson.
///
/// Weights are used exactly as declared; a lesson whose weights do not sum
/// to 100 still gets arithmetic results.
pub fn criterion_attainment(lesson: &LessonCatalog) -> Vec<CriterionAttainment> {
    let relations = lesson.evaluation_relation_index();

    lesson
        .course_outcomes
        .iter()
        .map(|outcome| {
            let contributions: Vec<CriterionContribution> = lesson
                .criteria
                .iter()
                .map(|criterion| {
                    let relation = relations
                        .get(&(outcome.id, criterion.name.as_str()))
                        .copied()
                        .unwrap_or(0);
                    CriterionContribution {
                        criterion: criterion.name.clone(),
                        weighted_contribution: f64::from(relation) * f64::from(criterion.weight)
                            / 100.0,
                    }
                })
                .collect();

            let total_max_score = contributions.iter().map(|c| c.weighted_contribution).sum();

            CriterionAttainment {
                lesson_id: lesson.lesson_id(),
                course_outcome_id: outcome.id,
                contributions,
                total_max_score,
            }
        })
        .collect()
}
