//! Turso/libSQL implementation of catalog and attainment storage.
//!
//! This module provides persistent storage using Turso (libSQL).
//! It can connect to:
//! - Remote Turso database (cloud)
//! - Local embedded SQLite file
//! - In-memory database (tests)

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use super::{AttainmentProjection, CatalogSource};
use crate::aggregate::criterion::{CriterionAttainment, CriterionContribution};
use crate::aggregate::program::{CourseOutcomeValue, ProgramAttainment};
use crate::aggregate::student::{CriterionScore, StudentAttainment};
use crate::catalog::{
    CatalogSnapshot, CourseEvaluationRelation, CourseOutcome, EvaluationCriterion, Lesson,
    LessonCatalog, ProgramCourseRelation, ProgramOutcome, REQUIRED_WEIGHT_TOTAL, StudentRecord,
    weight_sum,
};
use crate::error::{Error, Result};
use crate::pipeline::AttainmentReport;
use crate::types::{CourseOutcomeId, LessonId, ProgramOutcomeId, StudentId};

/// Catalog tables, created if missing.
const SCHEMA_CATALOG: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS lessons (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS program_outcomes (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    lesson_id INTEGER NOT NULL REFERENCES lessons(id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS course_outcomes (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    lesson_id INTEGER NOT NULL REFERENCES lessons(id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS evaluation_criteria (
    name TEXT NOT NULL,
    weight INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL REFERENCES lessons(id),
    position INTEGER NOT NULL,
    PRIMARY KEY (name, lesson_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS program_course_relations (
    program_outcome_id INTEGER NOT NULL,
    course_outcome_id INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (program_outcome_id, course_outcome_id, lesson_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS course_evaluation_relations (
    course_outcome_id INTEGER NOT NULL,
    criterion TEXT NOT NULL,
    lesson_id INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (course_outcome_id, criterion, lesson_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL,
    PRIMARY KEY (student_id, lesson_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS student_scores (
    student_id INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL,
    criterion TEXT NOT NULL,
    score REAL,
    PRIMARY KEY (student_id, lesson_id, criterion)
)
"#,
];

/// Derived tables. Rows are replaced wholesale on every run.
const SCHEMA_DERIVED: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS criterion_attainment (
    lesson_id INTEGER NOT NULL,
    course_outcome_id INTEGER NOT NULL,
    total_max_score REAL NOT NULL,
    contributions TEXT NOT NULL,
    PRIMARY KEY (lesson_id, course_outcome_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS student_attainment (
    student_id INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL,
    course_outcome_id INTEGER NOT NULL,
    weighted_scores TEXT NOT NULL,
    total_score REAL NOT NULL,
    max_score REAL NOT NULL,
    success_rate REAL NOT NULL,
    PRIMARY KEY (student_id, lesson_id, course_outcome_id)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS program_attainment (
    student_id INTEGER NOT NULL,
    lesson_id INTEGER NOT NULL,
    program_outcome_id INTEGER NOT NULL,
    weighted_values TEXT NOT NULL,
    attainment_ratio REAL NOT NULL,
    PRIMARY KEY (student_id, lesson_id, program_outcome_id)
)
"#,
];

/// Turso-backed catalog storage.
///
/// Reads go through [`CatalogSource`]; the write methods are the plain
/// data-entry operations used by imports and tests. Clones share one
/// connection, and every operation holds it exclusively, so transactions
/// from concurrent callers never interleave.
#[derive(Clone)]
pub struct TursoCatalogStore {
    _db: Arc<Database>,
    conn: Connection,
    lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for TursoCatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TursoCatalogStore").finish_non_exhaustive()
    }
}

/// The shared connection, held exclusively until dropped.
struct Session<'a> {
    _guard: MutexGuard<'a, ()>,
    conn: Connection,
}

impl Deref for Session<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl TursoCatalogStore {
    /// Create a new storage instance with a local embedded database.
    pub async fn new_local(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        Self::from_database(db).await
    }

    /// Create a new storage instance connected to a remote Turso database.
    pub async fn new_remote(url: &str, token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), token.to_string())
            .build()
            .await?;
        Self::from_database(db).await
    }

    /// Create a new in-memory storage instance (for testing).
    pub async fn new_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        // One shared connection keeps in-memory databases alive and visible
        // to every caller.
        let conn = db.connect()?;
        let storage = Self {
            _db: Arc::new(db),
            conn,
            lock: Arc::new(Mutex::new(())),
        };
        storage.ensure_schema().await?;
        Ok(storage)
    }

    /// Wait for exclusive use of the connection.
    async fn session(&self) -> Session<'_> {
        Session {
            _guard: self.lock.lock().await,
            conn: self.conn.clone(),
        }
    }

    /// Ensure the database schema exists.
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.session().await;
        for statement in SCHEMA_CATALOG.iter().chain(SCHEMA_DERIVED) {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }

    // ==================== Write path ====================

    /// Create a lesson with a database-assigned id.
    #[instrument(skip(self), level = "debug")]
    pub async fn create_lesson(&self, name: &str) -> Result<Lesson> {
        let conn = self.session().await;
        conn.execute("INSERT INTO lessons (name) VALUES (?)", [name])
            .await?;
        Ok(Lesson {
            id: LessonId(conn.last_insert_rowid()),
            name: name.to_string(),
        })
    }

    /// Insert or rename a lesson with a known id.
    #[instrument(skip(self), level = "debug")]
    pub async fn upsert_lesson(&self, lesson: &Lesson) -> Result<()> {
        Self::write_lesson(&*self.session().await, lesson).await
    }

    /// Add a program outcome to a lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn add_program_outcome(&self, lesson_id: LessonId, text: &str) -> Result<ProgramOutcome> {
        let conn = self.session().await;
        conn.execute(
            "INSERT INTO program_outcomes (text, lesson_id) VALUES (?, ?)",
            libsql::params![text, lesson_id.0],
        )
        .await?;
        Ok(ProgramOutcome {
            id: ProgramOutcomeId(conn.last_insert_rowid()),
            text: text.to_string(),
            lesson_id,
        })
    }

    /// Add a course outcome to a lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn add_course_outcome(&self, lesson_id: LessonId, text: &str) -> Result<CourseOutcome> {
        let conn = self.session().await;
        conn.execute(
            "INSERT INTO course_outcomes (text, lesson_id) VALUES (?, ?)",
            libsql::params![text, lesson_id.0],
        )
        .await?;
        Ok(CourseOutcome {
            id: CourseOutcomeId(conn.last_insert_rowid()),
            text: text.to_string(),
            lesson_id,
        })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn upsert_program_outcome(&self, outcome: &ProgramOutcome) -> Result<()> {
        Self::write_program_outcome(&*self.session().await, outcome).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn upsert_course_outcome(&self, outcome: &CourseOutcome) -> Result<()> {
        Self::write_course_outcome(&*self.session().await, outcome).await
    }

    /// Replace a lesson's criteria. Each weight must be at most 100 and the
    /// weights must add up to 100.
    #[instrument(skip(self, criteria), level = "debug")]
    pub async fn replace_evaluation_criteria(
        &self,
        lesson_id: LessonId,
        criteria: &[EvaluationCriterion],
    ) -> Result<()> {
        check_criteria(lesson_id, criteria)?;
        let conn = self.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = Self::write_criteria(&conn, lesson_id, criteria).await;
        finish_transaction(&conn, result).await
    }

    /// Set a program↔course relation, replacing any previous value.
    #[instrument(skip(self), level = "debug")]
    pub async fn set_program_course_relation(&self, relation: &ProgramCourseRelation) -> Result<()> {
        Self::write_program_relation(&*self.session().await, relation).await
    }

    /// Set a course↔criterion relation, replacing any previous value.
    #[instrument(skip(self), level = "debug")]
    pub async fn set_course_evaluation_relation(
        &self,
        relation: &CourseEvaluationRelation,
    ) -> Result<()> {
        Self::write_evaluation_relation(&*self.session().await, relation).await
    }

    /// Insert a student record or replace its scores.
    #[instrument(skip(self, record), fields(student_id = %record.student_id, lesson_id = %record.lesson_id), level = "debug")]
    pub async fn upsert_student_record(&self, record: &StudentRecord) -> Result<()> {
        let conn = self.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = Self::write_student_record(&conn, record).await;
        finish_transaction(&conn, result).await
    }

    /// Delete every declared relation of every lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn clear_relations(&self) -> Result<()> {
        let conn = self.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = Self::delete_relations(&conn).await;
        finish_transaction(&conn, result).await
    }

    /// Write a whole snapshot, keeping its ids.
    ///
    /// The import is one transaction: if any lesson is rejected (bad
    /// criterion weights, relation out of range, a nested row naming
    /// another lesson) nothing is written. A lesson without criteria is
    /// imported without any.
    #[instrument(skip(self, snapshot), fields(lessons = snapshot.lessons.len()), level = "debug")]
    pub async fn import_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        self.import(snapshot, false).await
    }

    /// Like [`import_snapshot`](Self::import_snapshot), but first deletes
    /// every declared relation inside the same transaction.
    #[instrument(skip(self, snapshot), fields(lessons = snapshot.lessons.len()), level = "debug")]
    pub async fn import_snapshot_replacing_relations(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        self.import(snapshot, true).await
    }

    async fn import(&self, snapshot: &CatalogSnapshot, replace_relations: bool) -> Result<()> {
        let conn = self.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = async {
            if replace_relations {
                Self::delete_relations(&conn).await?;
            }
            for lesson in &snapshot.lessons {
                debug!(lesson_id = %lesson.lesson.id, "importing lesson");
                Self::write_lesson_catalog(&conn, lesson).await?;
            }
            Ok::<_, Error>(())
        }
        .await;
        finish_transaction(&conn, result).await
    }

    // ==================== Row writers ====================

    async fn write_lesson(conn: &Connection, lesson: &Lesson) -> Result<()> {
        conn.execute(
            "INSERT INTO lessons (id, name) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            libsql::params![lesson.id.0, lesson.name.clone()],
        )
        .await?;
        Ok(())
    }

    async fn write_program_outcome(conn: &Connection, outcome: &ProgramOutcome) -> Result<()> {
        conn.execute(
            "INSERT INTO program_outcomes (id, text, lesson_id) VALUES (?, ?, ?) ON CONFLICT(id) DO UPDATE SET text = excluded.text, lesson_id = excluded.lesson_id",
            libsql::params![outcome.id.0, outcome.text.clone(), outcome.lesson_id.0],
        )
        .await?;
        Ok(())
    }

    async fn write_course_outcome(conn: &Connection, outcome: &CourseOutcome) -> Result<()> {
        conn.execute(
            "INSERT INTO course_outcomes (id, text, lesson_id) VALUES (?, ?, ?) ON CONFLICT(id) DO UPDATE SET text = excluded.text, lesson_id = excluded.lesson_id",
            libsql::params![outcome.id.0, outcome.text.clone(), outcome.lesson_id.0],
        )
        .await?;
        Ok(())
    }

    /// Caller runs [`check_criteria`] first.
    async fn write_criteria(
        conn: &Connection,
        lesson_id: LessonId,
        criteria: &[EvaluationCriterion],
    ) -> Result<()> {
        conn.execute(
            "DELETE FROM evaluation_criteria WHERE lesson_id = ?",
            [lesson_id.0],
        )
        .await?;
        for (position, criterion) in criteria.iter().enumerate() {
            conn.execute(
                "INSERT INTO evaluation_criteria (name, weight, lesson_id, position) VALUES (?, ?, ?, ?)",
                libsql::params![
                    criterion.name.clone(),
                    i64::from(criterion.weight),
                    lesson_id.0,
                    position as i64
                ],
            )
            .await?;
        }
        Ok(())
    }

    async fn write_program_relation(conn: &Connection, relation: &ProgramCourseRelation) -> Result<()> {
        if !(0.0..=1.0).contains(&relation.value) {
            return Err(Error::RelationOutOfRange {
                value: relation.value,
                expected: "0..=1",
            });
        }
        conn.execute(
            "INSERT INTO program_course_relations (program_outcome_id, course_outcome_id, lesson_id, value) VALUES (?, ?, ?, ?) ON CONFLICT(program_outcome_id, course_outcome_id, lesson_id) DO UPDATE SET value = excluded.value",
            libsql::params![
                relation.program_outcome_id.0,
                relation.course_outcome_id.0,
                relation.lesson_id.0,
                relation.value
            ],
        )
        .await?;
        Ok(())
    }

    async fn write_evaluation_relation(
        conn: &Connection,
        relation: &CourseEvaluationRelation,
    ) -> Result<()> {
        if relation.value > 1 {
            return Err(Error::RelationOutOfRange {
                value: f64::from(relation.value),
                expected: "0 or 1",
            });
        }
        conn.execute(
            "INSERT INTO course_evaluation_relations (course_outcome_id, criterion, lesson_id, value) VALUES (?, ?, ?, ?) ON CONFLICT(course_outcome_id, criterion, lesson_id) DO UPDATE SET value = excluded.value",
            libsql::params![
                relation.course_outcome_id.0,
                relation.criterion.clone(),
                relation.lesson_id.0,
                i64::from(relation.value)
            ],
        )
        .await?;
        Ok(())
    }

    async fn write_student_record(conn: &Connection, record: &StudentRecord) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO students (student_id, lesson_id) VALUES (?, ?)",
            libsql::params![record.student_id.0, record.lesson_id.0],
        )
        .await?;
        conn.execute(
            "DELETE FROM student_scores WHERE student_id = ? AND lesson_id = ?",
            libsql::params![record.student_id.0, record.lesson_id.0],
        )
        .await?;
        for (criterion, score) in &record.scores {
            conn.execute(
                "INSERT INTO student_scores (student_id, lesson_id, criterion, score) VALUES (?, ?, ?, ?)",
                libsql::params![
                    record.student_id.0,
                    record.lesson_id.0,
                    criterion.clone(),
                    *score
                ],
            )
            .await?;
        }
        Ok(())
    }

    async fn delete_relations(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM program_course_relations", ())
            .await?;
        conn.execute("DELETE FROM course_evaluation_relations", ())
            .await?;
        Ok(())
    }

    /// Write one nested lesson. Every nested row must name that lesson.
    async fn write_lesson_catalog(conn: &Connection, lesson: &LessonCatalog) -> Result<()> {
        check_nesting(lesson)?;
        let lesson_id = lesson.lesson.id;

        Self::write_lesson(conn, &lesson.lesson).await?;
        for outcome in &lesson.program_outcomes {
            Self::write_program_outcome(conn, outcome).await?;
        }
        for outcome in &lesson.course_outcomes {
            Self::write_course_outcome(conn, outcome).await?;
        }
        if !lesson.criteria.is_empty() {
            check_criteria(lesson_id, &lesson.criteria)?;
            Self::write_criteria(conn, lesson_id, &lesson.criteria).await?;
        }
        for relation in &lesson.program_course_relations {
            Self::write_program_relation(conn, relation).await?;
        }
        for relation in &lesson.course_evaluation_relations {
            Self::write_evaluation_relation(conn, relation).await?;
        }
        for record in &lesson.students {
            Self::write_student_record(conn, record).await?;
        }
        Ok(())
    }

    // ==================== Row readers ====================

    async fn read_lessons(conn: &Connection) -> Result<Vec<Lesson>> {
        let mut rows = conn
            .query("SELECT id, name FROM lessons ORDER BY id ASC", ())
            .await?;
        let mut lessons = Vec::new();
        while let Some(row) = rows.next().await? {
            lessons.push(Lesson {
                id: LessonId(row.get(0)?),
                name: row.get(1)?,
            });
        }
        Ok(lessons)
    }

    async fn read_program_outcomes(conn: &Connection, lesson_id: LessonId) -> Result<Vec<ProgramOutcome>> {
        let mut rows = conn
            .query(
                "SELECT id, text, lesson_id FROM program_outcomes WHERE lesson_id = ? ORDER BY id ASC",
                [lesson_id.0],
            )
            .await?;
        let mut outcomes = Vec::new();
        while let Some(row) = rows.next().await? {
            outcomes.push(ProgramOutcome {
                id: ProgramOutcomeId(row.get(0)?),
                text: row.get(1)?,
                lesson_id: LessonId(row.get(2)?),
            });
        }
        Ok(outcomes)
    }

    async fn read_course_outcomes(conn: &Connection, lesson_id: LessonId) -> Result<Vec<CourseOutcome>> {
        let mut rows = conn
            .query(
                "SELECT id, text, lesson_id FROM course_outcomes WHERE lesson_id = ? ORDER BY id ASC",
                [lesson_id.0],
            )
            .await?;
        let mut outcomes = Vec::new();
        while let Some(row) = rows.next().await? {
            outcomes.push(CourseOutcome {
                id: CourseOutcomeId(row.get(0)?),
                text: row.get(1)?,
                lesson_id: LessonId(row.get(2)?),
            });
        }
        Ok(outcomes)
    }

    async fn read_criteria(conn: &Connection, lesson_id: LessonId) -> Result<Vec<EvaluationCriterion>> {
        let mut rows = conn
            .query(
                "SELECT name, weight, lesson_id FROM evaluation_criteria WHERE lesson_id = ? ORDER BY position ASC",
                [lesson_id.0],
            )
            .await?;
        let mut criteria = Vec::new();
        while let Some(row) = rows.next().await? {
            let weight: i64 = row.get(1)?;
            criteria.push(EvaluationCriterion {
                name: row.get(0)?,
                weight: u32::try_from(weight)
                    .map_err(|_| Error::InvalidData(format!("invalid weight: {}", weight)))?,
                lesson_id: LessonId(row.get(2)?),
            });
        }
        Ok(criteria)
    }

    async fn read_program_relations(
        conn: &Connection,
        lesson_id: LessonId,
    ) -> Result<Vec<ProgramCourseRelation>> {
        let mut rows = conn
            .query(
                "SELECT program_outcome_id, course_outcome_id, lesson_id, value FROM program_course_relations WHERE lesson_id = ? ORDER BY rowid ASC",
                [lesson_id.0],
            )
            .await?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next().await? {
            relations.push(ProgramCourseRelation {
                program_outcome_id: ProgramOutcomeId(row.get(0)?),
                course_outcome_id: CourseOutcomeId(row.get(1)?),
                lesson_id: LessonId(row.get(2)?),
                value: row.get(3)?,
            });
        }
        Ok(relations)
    }

    async fn read_evaluation_relations(
        conn: &Connection,
        lesson_id: LessonId,
    ) -> Result<Vec<CourseEvaluationRelation>> {
        let mut rows = conn
            .query(
                "SELECT course_outcome_id, criterion, lesson_id, value FROM course_evaluation_relations WHERE lesson_id = ? ORDER BY rowid ASC",
                [lesson_id.0],
            )
            .await?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next().await? {
            let value: i64 = row.get(3)?;
            relations.push(CourseEvaluationRelation {
                course_outcome_id: CourseOutcomeId(row.get(0)?),
                criterion: row.get(1)?,
                lesson_id: LessonId(row.get(2)?),
                value: u8::try_from(value).map_err(|_| {
                    Error::InvalidData(format!("invalid evaluation relation: {}", value))
                })?,
            });
        }
        Ok(relations)
    }

    async fn read_student_records(conn: &Connection, lesson_id: LessonId) -> Result<Vec<StudentRecord>> {
        let mut records: BTreeMap<StudentId, StudentRecord> = BTreeMap::new();

        let mut rows = conn
            .query(
                "SELECT student_id FROM students WHERE lesson_id = ?",
                [lesson_id.0],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let student_id = StudentId(row.get(0)?);
            records.insert(student_id, StudentRecord::new(student_id, lesson_id));
        }

        let mut rows = conn
            .query(
                "SELECT student_id, criterion, score FROM student_scores WHERE lesson_id = ? AND score IS NOT NULL",
                [lesson_id.0],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            let student_id = StudentId(row.get(0)?);
            let criterion: String = row.get(1)?;
            let score: f64 = row.get(2)?;
            records
                .entry(student_id)
                .or_insert_with(|| StudentRecord::new(student_id, lesson_id))
                .scores
                .insert(criterion, score);
        }

        Ok(records.into_values().collect())
    }

    async fn read_lesson_catalog(conn: &Connection, lesson: Lesson) -> Result<LessonCatalog> {
        let id = lesson.id;
        Ok(LessonCatalog {
            program_outcomes: Self::read_program_outcomes(conn, id).await?,
            course_outcomes: Self::read_course_outcomes(conn, id).await?,
            criteria: Self::read_criteria(conn, id).await?,
            program_course_relations: Self::read_program_relations(conn, id).await?,
            course_evaluation_relations: Self::read_evaluation_relations(conn, id).await?,
            students: Self::read_student_records(conn, id).await?,
            lesson,
        })
    }
}

#[async_trait]
impl CatalogSource for TursoCatalogStore {
    #[instrument(skip(self), level = "debug")]
    async fn lessons(&self) -> Result<Vec<Lesson>> {
        Self::read_lessons(&*self.session().await).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn program_outcomes(&self, lesson_id: LessonId) -> Result<Vec<ProgramOutcome>> {
        Self::read_program_outcomes(&*self.session().await, lesson_id).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn course_outcomes(&self, lesson_id: LessonId) -> Result<Vec<CourseOutcome>> {
        Self::read_course_outcomes(&*self.session().await, lesson_id).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn evaluation_criteria(&self, lesson_id: LessonId) -> Result<Vec<EvaluationCriterion>> {
        Self::read_criteria(&*self.session().await, lesson_id).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn program_course_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<ProgramCourseRelation>> {
        Self::read_program_relations(&*self.session().await, lesson_id).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn course_evaluation_relations(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<CourseEvaluationRelation>> {
        Self::read_evaluation_relations(&*self.session().await, lesson_id).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn student_records(&self, lesson_id: LessonId) -> Result<Vec<StudentRecord>> {
        Self::read_student_records(&*self.session().await, lesson_id).await
    }

    /// Read every lesson inside one transaction so no lesson observes a
    /// concurrent write.
    #[instrument(skip(self), level = "debug")]
    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let conn = self.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = async {
            let mut lessons = Vec::new();
            for lesson in Self::read_lessons(&conn).await? {
                lessons.push(Self::read_lesson_catalog(&conn, lesson).await?);
            }
            Ok::<_, Error>(CatalogSnapshot::new(lessons))
        }
        .await;
        let snapshot = finish_transaction(&conn, result).await?;
        debug!(lessons = snapshot.lessons.len(), "catalog snapshot taken");
        Ok(snapshot)
    }
}

/// Turso-backed projection of derived attainment tables.
pub struct TursoAttainmentProjection {
    storage: TursoCatalogStore,
}

impl TursoAttainmentProjection {
    /// Create a new projection instance.
    pub fn new(storage: TursoCatalogStore) -> Self {
        Self { storage }
    }

    /// Stored criterion attainment rows of a lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn criterion_attainment(&self, lesson_id: LessonId) -> Result<Vec<CriterionAttainment>> {
        let conn = self.storage.session().await;
        let mut rows = conn
            .query(
                "SELECT lesson_id, course_outcome_id, total_max_score, contributions FROM criterion_attainment WHERE lesson_id = ? ORDER BY course_outcome_id ASC",
                [lesson_id.0],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let contributions_json: String = row.get(3)?;
            let contributions: Vec<CriterionContribution> = serde_json::from_str(&contributions_json)?;
            out.push(CriterionAttainment {
                lesson_id: LessonId(row.get(0)?),
                course_outcome_id: CourseOutcomeId(row.get(1)?),
                total_max_score: row.get(2)?,
                contributions,
            });
        }
        Ok(out)
    }

    /// Stored student attainment rows of a lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn student_attainment(&self, lesson_id: LessonId) -> Result<Vec<StudentAttainment>> {
        let conn = self.storage.session().await;
        let mut rows = conn
            .query(
                "SELECT student_id, lesson_id, course_outcome_id, weighted_scores, total_score, max_score, success_rate FROM student_attainment WHERE lesson_id = ? ORDER BY student_id ASC, course_outcome_id ASC",
                [lesson_id.0],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let scores_json: String = row.get(3)?;
            let weighted_scores: Vec<CriterionScore> = serde_json::from_str(&scores_json)?;
            out.push(StudentAttainment {
                student_id: StudentId(row.get(0)?),
                lesson_id: LessonId(row.get(1)?),
                course_outcome_id: CourseOutcomeId(row.get(2)?),
                weighted_scores,
                total_score: row.get(4)?,
                max_score: row.get(5)?,
                success_rate: row.get(6)?,
            });
        }
        Ok(out)
    }

    /// Stored program attainment rows of a lesson.
    #[instrument(skip(self), level = "debug")]
    pub async fn program_attainment(&self, lesson_id: LessonId) -> Result<Vec<ProgramAttainment>> {
        let conn = self.storage.session().await;
        let mut rows = conn
            .query(
                "SELECT student_id, lesson_id, program_outcome_id, weighted_values, attainment_ratio FROM program_attainment WHERE lesson_id = ? ORDER BY student_id ASC, program_outcome_id ASC",
                [lesson_id.0],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let values_json: String = row.get(3)?;
            let weighted_values: Vec<CourseOutcomeValue> = serde_json::from_str(&values_json)?;
            out.push(ProgramAttainment {
                student_id: StudentId(row.get(0)?),
                lesson_id: LessonId(row.get(1)?),
                program_outcome_id: ProgramOutcomeId(row.get(2)?),
                weighted_values,
                attainment_ratio: row.get(4)?,
            });
        }
        Ok(out)
    }

    async fn delete_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM program_attainment", ()).await?;
        conn.execute("DELETE FROM student_attainment", ()).await?;
        conn.execute("DELETE FROM criterion_attainment", ()).await?;
        Ok(())
    }

    async fn insert_report(conn: &Connection, report: &AttainmentReport) -> Result<()> {
        for row in report.criterion_rows() {
            conn.execute(
                "INSERT INTO criterion_attainment (lesson_id, course_outcome_id, total_max_score, contributions) VALUES (?, ?, ?, ?)",
                libsql::params![
                    row.lesson_id.0,
                    row.course_outcome_id.0,
                    row.total_max_score,
                    serde_json::to_string(&row.contributions)?
                ],
            )
            .await?;
        }
        for row in report.student_rows() {
            conn.execute(
                "INSERT INTO student_attainment (student_id, lesson_id, course_outcome_id, weighted_scores, total_score, max_score, success_rate) VALUES (?, ?, ?, ?, ?, ?, ?)",
                libsql::params![
                    row.student_id.0,
                    row.lesson_id.0,
                    row.course_outcome_id.0,
                    serde_json::to_string(&row.weighted_scores)?,
                    row.total_score,
                    row.max_score,
                    row.success_rate
                ],
            )
            .await?;
        }
        for row in report.program_rows() {
            conn.execute(
                "INSERT INTO program_attainment (student_id, lesson_id, program_outcome_id, weighted_values, attainment_ratio) VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    row.student_id.0,
                    row.lesson_id.0,
                    row.program_outcome_id.0,
                    serde_json::to_string(&row.weighted_values)?,
                    row.attainment_ratio
                ],
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AttainmentProjection for TursoAttainmentProjection {
    #[instrument(skip(self, report), fields(lessons = report.lessons.len()), level = "debug")]
    async fn replace(&self, report: &AttainmentReport) -> Result<()> {
        let conn = self.storage.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = async {
            Self::delete_all(&conn).await?;
            Self::insert_report(&conn, report).await
        }
        .await;
        finish_transaction(&conn, result).await?;
        debug!(
            criterion_rows = report.criterion_rows().count(),
            student_rows = report.student_rows().count(),
            program_rows = report.program_rows().count(),
            "derived tables replaced"
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<()> {
        let conn = self.storage.session().await;
        conn.execute("BEGIN", ()).await?;
        let result = Self::delete_all(&conn).await;
        finish_transaction(&conn, result).await
    }
}

/// Each weight at most 100, summing to exactly 100.
fn check_criteria(lesson_id: LessonId, criteria: &[EvaluationCriterion]) -> Result<()> {
    if let Some(criterion) = criteria.iter().find(|c| c.weight > REQUIRED_WEIGHT_TOTAL) {
        return Err(Error::WeightOutOfRange {
            lesson_id,
            criterion: criterion.name.clone(),
            weight: criterion.weight,
        });
    }
    let total = weight_sum(criteria);
    if total != u64::from(REQUIRED_WEIGHT_TOTAL) {
        return Err(Error::InvalidWeightTotal { lesson_id, total });
    }
    Ok(())
}

/// Reject nested rows that belong to another lesson.
fn check_nesting(lesson: &LessonCatalog) -> Result<()> {
    let expected = lesson.lesson.id;
    let nested = lesson
        .program_outcomes
        .iter()
        .map(|r| ("program outcome", r.lesson_id))
        .chain(lesson.course_outcomes.iter().map(|r| ("course outcome", r.lesson_id)))
        .chain(lesson.criteria.iter().map(|r| ("criterion", r.lesson_id)))
        .chain(
            lesson
                .program_course_relations
                .iter()
                .map(|r| ("program relation", r.lesson_id)),
        )
        .chain(
            lesson
                .course_evaluation_relations
                .iter()
                .map(|r| ("evaluation relation", r.lesson_id)),
        )
        .chain(lesson.students.iter().map(|r| ("student record", r.lesson_id)));

    for (kind, found) in nested {
        if found != expected {
            return Err(Error::LessonMismatch {
                kind,
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// Commit on success, roll back on failure.
async fn finish_transaction<T>(conn: &Connection, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                debug!(%rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
