//! Core identifier types for the attainment engine.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

integer_id!(
    /// Identifier of a lesson (course offering).
    LessonId
);

integer_id!(
    /// Identifier of a program outcome.
    ProgramOutcomeId
);

integer_id!(
    /// Identifier of a course outcome.
    CourseOutcomeId
);

integer_id!(
    /// Identifier of a student. Unique per student, not per enrollment.
    StudentId
);
