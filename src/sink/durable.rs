//! One JSON document per fact (`<fact_id>.json`), replaced atomically.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Destination;
use super::error::{SinkError, SinkResult};
use crate::assessment::{Assessment, SupportLevel};
use crate::catalog::Fact;

const JSON_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Stored form of a published assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDocument {
    pub fact_id: u32,
    pub section: String,
    pub fact_text: String,
    pub assessment: Assessment,
    /// Band of `assessment.score`.
    pub support_level: SupportLevel,
    pub llm_model: String,
    /// Wall time spent on the fact; absent when republished on resume.
    pub processing_time_seconds: Option<f64>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileAssessmentStore {
    dir: PathBuf,
}

impl FileAssessmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, fact_id: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", fact_id, JSON_EXTENSION))
    }

    fn temp_path(&self, fact_id: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", fact_id, TEMP_EXTENSION))
    }

    pub fn exists(&self, fact_id: u32) -> bool {
        self.document_path(fact_id).exists()
    }

    /// Reads the stored document for `fact_id`, if any.
    pub fn load(&self, fact_id: u32) -> SinkResult<Option<AssessmentDocument>> {
        let path = self.document_path(fact_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(SinkError::io(&path))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Ids of every stored document, ascending.
    pub fn list(&self) -> SinkResult<Vec<u32>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(SinkError::io(&self.dir))? {
            let path = entry.map_err(SinkError::io(&self.dir))?.path();
            if let Some(ext) = path.extension()
                && ext == JSON_EXTENSION
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(id) = stem.parse::<u32>()
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl Destination for FileAssessmentStore {
    fn name(&self) -> &'static str {
        "assessment_store"
    }

    fn write(
        &self,
        fact: &Fact,
        assessment: &Assessment,
        processing_time: Option<Duration>,
    ) -> SinkResult<()> {
        fs::create_dir_all(&self.dir).map_err(SinkError::io(&self.dir))?;

        let document = AssessmentDocument {
            fact_id: fact.id,
            section: fact.section.clone(),
            fact_text: fact.text.clone(),
            assessment: assessment.clone(),
            support_level: assessment.support_level(),
            llm_model: assessment.model.clone(),
            processing_time_seconds: processing_time.map(|d| d.as_secs_f64()),
            published_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let temp_path = self.temp_path(fact.id);
        let final_path = self.document_path(fact.id);
        {
            let mut file = File::create(&temp_path).map_err(SinkError::io(&temp_path))?;
            file.write_all(&bytes).map_err(SinkError::io(&temp_path))?;
            file.sync_all().map_err(SinkError::io(&temp_path))?;
        }
        fs::rename(&temp_path, &final_path).map_err(SinkError::io(&final_path))?;
        Ok(())
    }
}
