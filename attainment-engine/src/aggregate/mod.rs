//! The aggregators, leaf-first.
//!
//! Each one is a pure function of a [`LessonCatalog`](crate::LessonCatalog)
//! and the output of the stage below it. Nothing is cached or patched: every
//! call returns a freshly computed set of rows.

pub mod criterion;
pub mod grades;
pub mod matrix;
pub mod program;
pub mod student;
