use super::batch::MoleculeReport;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Failed to flush report: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes molecule reports as CSV, one row per molecule, with a header row.
///
/// Absent values (no root scaffold, no name) are written as empty fields.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
    label: String,
    rows: usize,
}

impl ReportWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let writer = csv::Writer::from_path(path).map_err(|source| ReportError::Csv {
            path: label.clone(),
            source,
        })?;
        Ok(Self {
            writer,
            label,
            rows: 0,
        })
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            label: "<stream>".to_string(),
            rows: 0,
        }
    }

    pub fn write(&mut self, report: &MoleculeReport) -> Result<(), ReportError> {
        self.writer.serialize(report).map_err(|source| ReportError::Csv {
            path: self.label.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_all<'r>(&mut self, reports: impl IntoIterator<Item = &'r MoleculeReport>) -> Result<(), ReportError> {
        reports.into_iter().try_for_each(|report| self.write(report))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes buffered rows and hands back the underlying writer.
    pub fn finish(self) -> Result<W, ReportError> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}
