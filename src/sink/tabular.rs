//! Writes assessment columns into the fact's row of its section table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use csv::StringRecord;
use tempfile::NamedTempFile;

use super::Destination;
use super::error::{SinkError, SinkResult};
use crate::assessment::Assessment;
use crate::catalog::{Fact, NUMBER_COLUMN, parse_fact_id};

pub const SCORE_COLUMN: &str = "Literature Support Score (1-100)";
pub const PAPERS_REVIEWED_COLUMN: &str = "Number of Papers Reviewed";
pub const SUPPORTING_PAPERS_COLUMN: &str = "Supporting Papers";
pub const SUMMARY_COLUMN: &str = "Key Evidence Summary";
pub const CONFIDENCE_COLUMN: &str = "Assessment Confidence";
pub const UPDATED_COLUMN: &str = "Last Updated";

/// Columns added to every table, in order.
pub const EXPORT_COLUMNS: [&str; 6] = [
    SCORE_COLUMN,
    PAPERS_REVIEWED_COLUMN,
    SUPPORTING_PAPERS_COLUMN,
    SUMMARY_COLUMN,
    CONFIDENCE_COLUMN,
    UPDATED_COLUMN,
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct TabularExport {
    csv_dir: PathBuf,
}

impl TabularExport {
    pub fn new(csv_dir: impl Into<PathBuf>) -> Self {
        Self {
            csv_dir: csv_dir.into(),
        }
    }

    pub fn csv_dir(&self) -> &Path {
        &self.csv_dir
    }
}

impl Destination for TabularExport {
    fn name(&self) -> &'static str {
        "tabular_export"
    }

    fn write(
        &self,
        fact: &Fact,
        assessment: &Assessment,
        _processing_time: Option<Duration>,
    ) -> SinkResult<()> {
        let path = self.csv_dir.join(&fact.source_file);
        let table_err = |source| SinkError::Table {
            path: path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(table_err)?;
        let mut headers = reader.headers().map_err(table_err)?.clone();
        let mut rows = reader
            .records()
            .collect::<Result<Vec<StringRecord>, _>>()
            .map_err(table_err)?;

        let number_col = headers
            .iter()
            .position(|h| h.trim() == NUMBER_COLUMN)
            .ok_or_else(|| SinkError::MissingColumn {
                path: path.clone(),
                column: NUMBER_COLUMN.to_string(),
            })?;

        for column in EXPORT_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                headers.push_field(column);
            }
        }
        let width = headers.len();
        for row in rows.iter_mut() {
            while row.len() < width {
                row.push_field("");
            }
        }
        let column_index = |name: &str| headers.iter().position(|h| h == name);

        let row = rows
            .iter_mut()
            .find(|r| r.get(number_col).and_then(|v| parse_fact_id(v.trim())) == Some(fact.id))
            .ok_or_else(|| SinkError::RowNotFound {
                fact_id: fact.id,
                path: path.clone(),
            })?;

        let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
        let values = [
            (SCORE_COLUMN, assessment.score.to_string()),
            (PAPERS_REVIEWED_COLUMN, assessment.passages_reviewed.to_string()),
            (SUPPORTING_PAPERS_COLUMN, assessment.supporting_papers.join(", ")),
            (SUMMARY_COLUMN, assessment.evidence_summary.clone()),
            (CONFIDENCE_COLUMN, assessment.confidence.as_str().to_string()),
            (
                UPDATED_COLUMN,
                assessment.reviewed_at.format(TIMESTAMP_FORMAT).to_string(),
            ),
        ];
        for (column, value) in values {
            if let Some(idx) = column_index(column) {
                cells[idx] = value;
            }
        }
        *row = StringRecord::from(cells);

        let dir = path.parent().unwrap_or(self.csv_dir.as_path());
        let tmp = NamedTempFile::new_in(dir).map_err(SinkError::io(dir))?;
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(tmp);
        writer.write_record(&headers).map_err(table_err)?;
        for row in &rows {
            writer.write_record(row).map_err(table_err)?;
        }
        let tmp = writer
            .into_inner()
            .map_err(|e| SinkError::io(&path)(e.into_error()))?;
        tmp.as_file().sync_all().map_err(SinkError::io(&path))?;
        tmp.persist(&path).map_err(|e| SinkError::io(&path)(e.error))?;
        Ok(())
    }
}
