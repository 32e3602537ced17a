use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{LessonSection, ReportEmitter};
use crate::error::Result;

#[derive(Serialize)]
struct Document<'a> {
    generated_at: String,
    lessons: &'a [LessonSection],
}

/// Buffers sections and writes a single JSON document on [`finish`].
///
/// Only the envelope carries a timestamp, so two runs over the same data
/// produce identical `lessons` arrays.
///
/// [`finish`]: ReportEmitter::finish
pub struct JsonReportEmitter<W: Write> {
    writer: W,
    sections: Vec<LessonSection>,
    generated_at: DateTime<Utc>,
}

impl<W: Write> JsonReportEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_timestamp(writer, Utc::now())
    }

    pub fn with_timestamp(writer: W, generated_at: DateTime<Utc>) -> Self {
        Self {
            writer,
            sections: Vec::new(),
            generated_at,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportEmitter for JsonReportEmitter<W> {
    fn emit(&mut self, section: &LessonSection) -> Result<()> {
        self.sections.push(section.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let document = Document {
            generated_at: self.generated_at.to_rfc3339(),
            lessons: &self.sections,
        };
        serde_json::to_writer_pretty(&mut self.writer, &document)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
