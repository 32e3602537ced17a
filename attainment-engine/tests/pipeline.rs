//! End-to-end: libSQL catalog → pipeline → projection and JSON report.

use attainment_engine::storage::{TursoAttainmentProjection, TursoCatalogStore};
use attainment_engine::{
    AttainmentProjection, CatalogSnapshot, CatalogSource, CourseEvaluationRelation,
    CourseOutcomeId, EvaluationCriterion, JsonReportEmitter, LessonId, LessonStatus,
    ProgramCourseRelation, ProgramOutcomeId, StudentId, StudentRecord, emit_report,
    run_from_source,
};
use tempfile::TempDir;

async fn seed(store: &TursoCatalogStore) -> (LessonId, LessonId) {
    // Networks: Midterm 100 assesses CO1; PO1 relates to CO1 at 0.5.
    let networks = store.create_lesson("Networks").await.unwrap();
    let po = store
        .add_program_outcome(networks.id, "Engineering knowledge")
        .await
        .unwrap();
    let co = store
        .add_course_outcome(networks.id, "Explain layered protocols")
        .await
        .unwrap();
    store
        .replace_evaluation_criteria(
            networks.id,
            &[EvaluationCriterion {
                name: "Midterm".to_string(),
                weight: 100,
                lesson_id: networks.id,
            }],
        )
        .await
        .unwrap();
    store
        .set_course_evaluation_relation(&CourseEvaluationRelation {
            course_outcome_id: co.id,
            criterion: "Midterm".to_string(),
            lesson_id: networks.id,
            value: 1,
        })
        .await
        .unwrap();
    store
        .set_program_course_relation(&ProgramCourseRelation {
            program_outcome_id: po.id,
            course_outcome_id: co.id,
            lesson_id: networks.id,
            value: 0.5,
        })
        .await
        .unwrap();
    store
        .upsert_student_record(&StudentRecord::new(StudentId(1), networks.id).with_score("Midterm", 80.0))
        .await
        .unwrap();

    // Compilers: no criteria yet, so its weight total is 0 and it is flagged.
    let compilers = store.create_lesson("Compilers").await.unwrap();
    store
        .add_course_outcome(compilers.id, "Build a parser")
        .await
        .unwrap();

    (networks.id, compilers.id)
}

#[tokio::test]
async fn store_pipeline_and_projection_agree() {
    let dir = TempDir::new().unwrap();
    let store = TursoCatalogStore::new_local(&dir.path().join("attainment.db"))
        .await
        .unwrap();
    let (networks, _) = seed(&store).await;

    let report = run_from_source(&store).await.unwrap();

    let lesson = report.lesson(networks).unwrap();
    assert_eq!(lesson.status, LessonStatus::Computed);
    assert_eq!(lesson.criterion_attainment[0].total_max_score, 1.0);
    let student = &lesson.student_attainment[0];
    assert_eq!(student.total_score, 80.0);
    assert_eq!(student.max_score, 100.0);
    assert_eq!(student.success_rate, 80.0);
    let program = &lesson.program_attainment[0];
    assert_eq!(program.program_outcome_id, ProgramOutcomeId(1));
    assert_eq!(program.weighted_values[0].course_outcome_id, CourseOutcomeId(1));
    assert_eq!(program.weighted_values[0].weighted_value, 40.0);
    assert_eq!(program.attainment_ratio, 80.0);

    let projection = TursoAttainmentProjection::new(store.clone());
    projection.replace(&report).await.unwrap();
    assert_eq!(
        projection.student_attainment(networks).await.unwrap(),
        lesson.student_attainment
    );
}

#[tokio::test]
async fn lesson_without_criteria_is_flagged_without_blocking_others() {
    let store = TursoCatalogStore::new_memory().await.unwrap();
    let (networks, compilers) = seed(&store).await;

    let report = run_from_source(&store).await.unwrap();

    assert_eq!(report.lesson(networks).unwrap().status, LessonStatus::Computed);
    let flagged = report.lesson(compilers).unwrap();
    assert!(flagged.is_flagged());
    assert_eq!(flagged.criterion_attainment[0].total_max_score, 0.0);
    assert!(flagged.student_attainment.is_empty());
}

#[tokio::test]
async fn import_rejects_bad_weights_but_pipeline_flags_in_memory_data() {
    let store = TursoCatalogStore::new_memory().await.unwrap();
    let (networks, compilers) = seed(&store).await;

    let mut snapshot = store.snapshot().await.unwrap();
    let lesson = snapshot
        .lessons
        .iter_mut()
        .find(|l| l.lesson.id == compilers)
        .unwrap();
    lesson.criteria = vec![EvaluationCriterion {
        name: "Project".to_string(),
        weight: 90,
        lesson_id: compilers,
    }];

    // The store refuses to persist a criteria set that does not sum to 100.
    let other = TursoCatalogStore::new_memory().await.unwrap();
    assert!(other.import_snapshot(&snapshot).await.is_err());

    // Computed directly, the bad lesson is flagged and the good one is not.
    let report = run_from_source(&snapshot).await.unwrap();
    assert_eq!(report.lesson(networks).unwrap().status, LessonStatus::Computed);
    let flagged = report.lesson(compilers).unwrap();
    assert!(flagged.is_flagged());
    assert!(flagged.student_attainment.is_empty());
    assert!(flagged.program_attainment.is_empty());
}

#[tokio::test]
async fn rerun_replaces_derived_rows_with_identical_values() {
    let store = TursoCatalogStore::new_memory().await.unwrap();
    let (networks, _) = seed(&store).await;
    let projection = TursoAttainmentProjection::new(store.clone());

    let first = run_from_source(&store).await.unwrap();
    projection.replace(&first).await.unwrap();
    let stored_first = projection.program_attainment(networks).await.unwrap();

    let second = run_from_source(&store).await.unwrap();
    projection.replace(&second).await.unwrap();
    let stored_second = projection.program_attainment(networks).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(stored_first, stored_second);
    assert_eq!(stored_second.len(), 1);
}

#[tokio::test]
async fn json_report_round_trips_through_import() {
    let source = TursoCatalogStore::new_memory().await.unwrap();
    seed(&source).await;
    let snapshot: CatalogSnapshot = source.snapshot().await.unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let target = TursoCatalogStore::new_memory().await.unwrap();
    target
        .import_snapshot(&serde_json::from_str(&json).unwrap())
        .await
        .unwrap();

    let mut emitter = JsonReportEmitter::new(Vec::new());
    emit_report(&run_from_source(&target).await.unwrap(), &mut emitter).unwrap();
    let document: serde_json::Value = serde_json::from_slice(&emitter.into_inner()).unwrap();

    let lessons = document["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0]["lesson_name"], "Networks");
}
