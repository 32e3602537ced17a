//! Error types for the attainment engine.

use thiserror::Error;

use crate::types::LessonId;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, storing or emitting attainment data.
///
/// Data-quality problems inside a lesson are not errors; they are reported as
/// [`ValidationIssue`](crate::ValidationIssue)s on the lesson.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from libSQL.
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while writing a report.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data in the database.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Lesson not found.
    #[error("lesson not found: {0}")]
    LessonNotFound(LessonId),

    /// A criteria set whose weights do not add up to 100.
    #[error("criterion weights for lesson {lesson_id} sum to {total}, expected 100")]
    InvalidWeightTotal { lesson_id: LessonId, total: u64 },

    /// A single criterion weighing more than 100.
    #[error("criterion {criterion} of lesson {lesson_id} weighs {weight}, expected at most 100")]
    WeightOutOfRange {
        lesson_id: LessonId,
        criterion: String,
        weight: u32,
    },

    /// A nested row that names a different lesson than its parent.
    #[error("{kind} belongs to lesson {found}, but is nested under lesson {expected}")]
    LessonMismatch {
        kind: &'static str,
        expected: LessonId,
        found: LessonId,
    },

    /// A relation value outside its permitted range.
    #[error("relation value {value} out of range ({expected})")]
    RelationOutOfRange { value: f64, expected: &'static str },
}
