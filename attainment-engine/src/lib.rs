//! Outcome attainment engine.
//!
//! This crate computes how well students meet course outcomes and, through
//! them, program outcomes, from graded criteria and declared relation
//! strengths.
//!
//! # Architecture
//!
//! Data flows strictly upward through pure, fully recomputing stages:
//!
//! - **Catalog** ([`CatalogSource`]) is snapshotted once per run
//! - **Criterion attainment** gives each course outcome its maximum weighted total
//! - **Student attainment** turns raw scores into per-outcome success rates
//! - **Program attainment** combines success rates with relation strengths
//! - **Reports** ([`ReportEmitter`]) render the derived tables
//!
//! Derived rows can be persisted through an [`AttainmentProjection`], which
//! always replaces the previous run wholesale.

pub mod aggregate;
mod catalog;
mod error;
mod metrics;
mod pipeline;
pub mod report;
pub mod storage;
mod types;
mod validation;

// Catalog types
pub use catalog::{
    CatalogSnapshot, CourseEvaluationRelation, CourseOutcome, EvaluationCriterion, Lesson,
    LessonCatalog, ProgramCourseRelation, ProgramOutcome, REQUIRED_WEIGHT_TOTAL, StudentRecord,
};

// Derived row types
pub use aggregate::criterion::{CriterionAttainment, CriterionContribution};
pub use aggregate::grades::CourseGrade;
pub use aggregate::matrix::{EvaluationRelationRow, ProgramRelationRow};
pub use aggregate::program::{CourseOutcomeValue, ProgramAttainment};
pub use aggregate::student::{CriterionScore, StudentAttainment};

// Pipeline
pub use pipeline::{
    AttainmentReport, LessonReport, LessonStatus, run_from_source, run_lesson,
    run_lesson_from_source, run_pipeline,
};

// Validation
pub use validation::{ValidationIssue, validate_lesson};

// Numerics
pub use metrics::{GRADE_PRECISION, RATE_PRECISION, round_to};

// Reports
pub use report::{JsonReportEmitter, LessonSection, ReportEmitter, ReportRow, ReportTable, emit_report};

// Errors
pub use error::{Error, Result};

// ID types
pub use types::{CourseOutcomeId, LessonId, ProgramOutcomeId, StudentId};

// Storage traits (re-export from storage module)
pub use storage::{AttainmentProjection, CatalogSource};
