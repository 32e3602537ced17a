//! Terminal rendering of lesson sections.

use std::io::Write;

use attainment_engine::{LessonSection, LessonStatus, ReportEmitter, ReportTable, Result, round_to};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

/// Writes each lesson as a heading followed by one table per derived set.
pub struct TableReportEmitter<W: Write> {
    writer: W,
    lessons: usize,
}

impl<W: Write> TableReportEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lessons: 0 }
    }
}

impl<W: Write> ReportEmitter for TableReportEmitter<W> {
    fn emit(&mut self, section: &LessonSection) -> Result<()> {
        if self.lessons > 0 {
            writeln!(self.writer)?;
        }
        self.lessons += 1;

        writeln!(
            self.writer,
            "Lesson {}: {} [{}]",
            section.lesson_id,
            section.lesson_name,
            section.status.as_str()
        )?;
        for issue in &section.issues {
            writeln!(self.writer, "  ! {}", issue)?;
        }
        if section.status == LessonStatus::Flagged {
            writeln!(
                self.writer,
                "  student and program attainment skipped until criterion weights sum to 100"
            )?;
        }

        for table in &section.tables {
            writeln!(self.writer)?;
            writeln!(self.writer, "{}", table.title)?;
            writeln!(self.writer, "{}", render_table(table))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.lessons == 0 {
            writeln!(self.writer, "No lessons in catalog.")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn render_table(table: &ReportTable) -> Table {
    let annotated = table.rows.iter().any(|r| r.annotation.is_some());

    let mut header = vec![Cell::new("").fg(Color::Cyan)];
    if annotated {
        header.push(Cell::new("Description").fg(Color::Cyan));
    }
    header.extend(table.columns.iter().map(|c| Cell::new(c).fg(Color::Cyan)));

    let mut out = Table::new();
    out.load_preset(UTF8_FULL_CONDENSED);
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.set_header(header);

    for row in &table.rows {
        let mut cells = vec![Cell::new(&row.label)];
        if annotated {
            cells.push(Cell::new(row.annotation.as_deref().unwrap_or("")));
        }
        cells.extend(row.cells.iter().map(|v| Cell::new(format_number(*v))));
        out.add_row(cells);
    }
    out
}

/// At most two decimals, no trailing zeros.
fn format_number(value: f64) -> String {
    format!("{}", round_to(value, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attainment_engine::{LessonId, ReportRow};

    fn section(status: LessonStatus) -> LessonSection {
        LessonSection {
            lesson_id: LessonId(3),
            lesson_name: "Databases".to_string(),
            status,
            issues: Vec::new(),
            tables: vec![ReportTable {
                title: "Student attainment".to_string(),
                columns: vec!["Midterm".to_string(), "Success %".to_string()],
                rows: vec![ReportRow {
                    label: "S1 / CO1".to_string(),
                    annotation: Some("Normalize schemas".to_string()),
                    cells: vec![80.0, 66.666_666],
                }],
            }],
        }
    }

    fn render(sections: &[LessonSection]) -> String {
        let mut emitter = TableReportEmitter::new(Vec::new());
        for s in sections {
            emitter.emit(s).unwrap();
        }
        emitter.finish().unwrap();
        String::from_utf8(emitter.writer).unwrap()
    }

    #[test]
    fn renders_heading_labels_and_cells() {
        let out = render(&[section(LessonStatus::Computed)]);

        assert!(out.starts_with("Lesson 3: Databases [computed]"));
        assert!(out.contains("Student attainment"));
        assert!(out.contains("Normalize schemas"));
        assert!(out.contains("S1 / CO1"));
        assert!(out.contains("66.67"));
    }

    #[test]
    fn flagged_lesson_explains_skipped_tables() {
        let mut flagged = section(LessonStatus::Flagged);
        flagged.issues = vec!["criterion weights sum to 90, expected 100".to_string()];

        let out = render(&[flagged]);

        assert!(out.contains("[flagged]"));
        assert!(out.contains("! criterion weights sum to 90, expected 100"));
        assert!(out.contains("skipped"));
    }

    #[test]
    fn empty_report_says_so() {
        assert_eq!(render(&[]), "No lessons in catalog.\n");
    }

    #[test]
    fn numbers_drop_trailing_zeros() {
        assert_eq!(format_number(80.0), "80");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
    }
}
