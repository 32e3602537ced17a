//! `attainment validate`: check every lesson without rendering tables.

use anyhow::{Result, bail};
use attainment_engine::{AttainmentReport, LessonStatus, run_from_source};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use super::open_store;
use crate::config::AttainmentConfig;

/// Validate arguments.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also list non-blocking warnings
    #[arg(long)]
    pub warnings: bool,
}

/// Run validate command. Fails when any lesson is flagged.
pub async fn run(args: ValidateArgs, config: &AttainmentConfig) -> Result<()> {
    let store = open_store(&config.database).await?;
    let report = run_from_source(&store).await?;

    if report.lessons.is_empty() {
        println!("No lessons in catalog.");
        return Ok(());
    }
    println!("{}", status_table(&report, args.warnings));

    let flagged = report.flagged().count();
    if flagged > 0 {
        bail!("{} of {} lessons flagged", flagged, report.lessons.len());
    }
    Ok(())
}

fn status_table(report: &AttainmentReport, warnings: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Lesson").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Issues").fg(Color::Cyan),
    ]);

    for lesson in &report.lessons {
        let status = match lesson.status {
            LessonStatus::Computed => Cell::new(lesson.status.as_str()).fg(Color::Green),
            LessonStatus::Flagged => Cell::new(lesson.status.as_str()).fg(Color::Red),
        };
        let issues: Vec<String> = lesson
            .issues
            .iter()
            .filter(|i| warnings || i.is_blocking())
            .map(ToString::to_string)
            .collect();

        table.add_row(vec![
            Cell::new(lesson.lesson.id),
            Cell::new(&lesson.lesson.name),
            status,
            Cell::new(issues.join("\n")),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use attainment_engine::{CatalogSnapshot, Lesson, LessonCatalog, LessonId, run_pipeline};

    #[test]
    fn lesson_without_criteria_shows_blocking_issue() {
        let snapshot = CatalogSnapshot::new(vec![LessonCatalog::new(Lesson {
            id: LessonId(4),
            name: "Ethics".to_string(),
        })]);
        let report = run_pipeline(&snapshot);

        let rendered = status_table(&report, false).to_string();

        assert!(rendered.contains("Ethics"));
        assert!(rendered.contains("flagged"));
        assert!(rendered.contains("criterion weights sum to 0, expected 100"));
    }
}
