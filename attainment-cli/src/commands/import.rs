//! `attainment import`: load a JSON catalog snapshot into the database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use attainment_engine::CatalogSnapshot;
use clap::Args;
use tracing::info;

use super::open_store;
use crate::config::AttainmentConfig;

/// Import arguments.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file holding a catalog snapshot
    pub file: PathBuf,

    /// Delete every existing relation before importing
    #[arg(long)]
    pub replace_relations: bool,
}

/// Run import command.
pub async fn run(args: ImportArgs, config: &AttainmentConfig) -> Result<()> {
    let snapshot = read_snapshot(&args.file)?;
    let store = open_store(&config.database).await?;

    let imported = if args.replace_relations {
        store.import_snapshot_replacing_relations(&snapshot).await
    } else {
        store.import_snapshot(&snapshot).await
    };
    imported.with_context(|| format!("failed to import {}", args.file.display()))?;

    info!(lessons = snapshot.lessons.len(), "catalog imported");
    println!(
        "Imported {} lessons from {}",
        snapshot.lessons.len(),
        args.file.display()
    );
    Ok(())
}

fn read_snapshot(path: &std::path::Path) -> Result<CatalogSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a catalog snapshot", path.display()))?;
    Ok(CatalogSnapshot::new(snapshot.lessons))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attainment_engine::{CatalogSource, LessonId};
    use crate::config::DatabaseConfig;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
  "lessons": [
    {
      "lesson": { "id": 2, "name": "Algorithms" },
      "criteria": [{ "name": "Final", "weight": 100, "lesson_id": 2 }],
      "course_outcomes": [{ "id": 5, "text": "Analyse complexity", "lesson_id": 2 }]
    },
    {
      "lesson": { "id": 1, "name": "Programming" }
    }
  ]
}"#;

    #[test]
    fn read_snapshot_orders_lessons_and_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let snapshot = read_snapshot(&path).unwrap();

        assert_eq!(snapshot.lessons[0].lesson.id, LessonId(1));
        assert!(snapshot.lessons[0].criteria.is_empty());
        assert_eq!(snapshot.lessons[1].course_outcomes.len(), 1);
    }

    #[test]
    fn read_snapshot_rejects_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = read_snapshot(&path).unwrap_err();

        assert!(err.to_string().contains("not a catalog snapshot"));
    }

    #[tokio::test]
    async fn import_writes_lessons_to_database() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("catalog.json");
        std::fs::write(&file, SNAPSHOT).unwrap();
        let mut config = AttainmentConfig::default();
        config.database = DatabaseConfig {
            path: temp_dir.path().join("attainment.db"),
            url: None,
            auth_token: None,
        };

        run(
            ImportArgs {
                file,
                replace_relations: true,
            },
            &config,
        )
        .await
        .unwrap();

        let store = open_store(&config.database).await.unwrap();
        let lessons = store.lessons().await.unwrap();
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[1].name, "Algorithms");
    }

    #[tokio::test]
    async fn rejected_import_keeps_existing_relations() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AttainmentConfig::default();
        config.database = DatabaseConfig {
            path: temp_dir.path().join("attainment.db"),
            url: None,
            auth_token: None,
        };
        let good = temp_dir.path().join("good.json");
        std::fs::write(
            &good,
            r#"{"lessons":[{
  "lesson": { "id": 1, "name": "Programming" },
  "criteria": [{ "name": "Final", "weight": 100, "lesson_id": 1 }],
  "program_outcomes": [{ "id": 1, "text": "Solve problems", "lesson_id": 1 }],
  "course_outcomes": [{ "id": 1, "text": "Write loops", "lesson_id": 1 }],
  "program_course_relations": [
    { "program_outcome_id": 1, "course_outcome_id": 1, "lesson_id": 1, "value": 1.0 }
  ]
}]}"#,
        )
        .unwrap();
        let bad = temp_dir.path().join("bad.json");
        std::fs::write(
            &bad,
            r#"{"lessons":[{
  "lesson": { "id": 1, "name": "Programming" },
  "criteria": [{ "name": "Final", "weight": 90, "lesson_id": 1 }]
}]}"#,
        )
        .unwrap();

        run(
            ImportArgs {
                file: good,
                replace_relations: false,
            },
            &config,
        )
        .await
        .unwrap();
        let result = run(
            ImportArgs {
                file: bad,
                replace_relations: true,
            },
            &config,
        )
        .await;

        assert!(result.is_err());
        let store = open_store(&config.database).await.unwrap();
        assert_eq!(store.program_course_relations(LessonId(1)).await.unwrap().len(), 1);
        assert_eq!(store.evaluation_criteria(LessonId(1)).await.unwrap()[0].weight, 100);
    }
}
