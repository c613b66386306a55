//! Fact catalog: the immutable, id-ordered list of stylized facts.
//!
//! Facts are loaded from a directory of CSV tables, one table per section. The
//! catalog validates that ids are unique and contiguous (`1..=N`) so every later
//! stage can treat a fact id as a stable key.

pub mod error;
mod fact;


pub use error::{CatalogLoadError, CatalogResult};
pub use fact::{Fact, section_name_from_stem};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Header of the fact id column.
pub const NUMBER_COLUMN: &str = "Number";
/// Preferred header of the fact text column.
pub const FACT_TEXT_COLUMN: &str = "DEB Stylized Fact";
const FACT_TEXT_FALLBACK_MARKER: &str = "Stylized Fact";
const TABLE_EXTENSION: &str = "csv";

/// How [`FactCatalog::sample`] picks facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleStrategy {
    /// Spread picks evenly over sections, then evenly within each section.
    #[default]
    StratifiedBySection,
    /// Every `len / n`-th fact in id order.
    EvenlySpaced,
}

/// Immutable catalog of facts ordered by id.
#[derive(Debug, Clone)]
pub struct FactCatalog {
    facts: Vec<Fact>,
    index: HashMap<u32, usize>,
}

impl FactCatalog {
    /// Loads every `*.csv` table in `dir`.
    pub fn load(dir: &Path) -> CatalogResult<Self> {
        if !dir.is_dir() {
            return Err(CatalogLoadError::SourceMissing {
                path: dir.to_path_buf(),
            });
        }

        let mut tables: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION))
            })
            .collect();
        tables.sort();

        if tables.is_empty() {
            return Err(CatalogLoadError::Empty {
                path: dir.to_path_buf(),
            });
        }

        info!(tables = tables.len(), dir = %dir.display(), "Loading fact catalog");

        let mut facts = Vec::new();
        for table in &tables {
            let loaded = load_table(table)?;
            debug!(table = %table.display(), facts = loaded.len(), "Loaded fact table");
            facts.extend(loaded);
        }
        if facts.is_empty() {
            return Err(CatalogLoadError::Empty {
                path: dir.to_path_buf(),
            });
        }

        let catalog = Self::from_facts(facts)?;
        info!(
            facts = catalog.len(),
            sections = catalog.sections().len(),
            "Fact catalog loaded"
        );
        Ok(catalog)
    }

    /// Builds a catalog from in-memory facts, applying the same validation as [`load`](Self::load).
    pub fn from_facts(mut facts: Vec<Fact>) -> CatalogResult<Self> {
        facts.sort_by_key(|f| f.id);

        let mut index = HashMap::with_capacity(facts.len());
        for (pos, fact) in facts.iter().enumerate() {
            if index.insert(fact.id, pos).is_some() {
                return Err(CatalogLoadError::DuplicateId { id: fact.id });
            }
        }

        for (pos, fact) in facts.iter().enumerate() {
            let expected = pos as u32 + 1;
            if fact.id != expected {
                return Err(CatalogLoadError::NonContiguous {
                    expected,
                    found: fact.id,
                });
            }
        }

        Ok(Self { facts, index })
    }

    /// Facts in id order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Fact> {
        self.index.get(&id).map(|&pos| &self.facts[pos])
    }

    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    /// Section names in order of first appearance.
    pub fn sections(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for fact in &self.facts {
            if !seen.contains(&fact.section.as_str()) {
                seen.push(fact.section.as_str());
            }
        }
        seen
    }

    /// Deterministically selects `n` facts (all facts if `n >= len`), returned in id order.
    pub fn sample(&self, n: usize, strategy: SampleStrategy) -> Vec<Fact> {
        if n >= self.facts.len() {
            return self.facts.clone();
        }
        if n == 0 {
            return Vec::new();
        }

        let mut picked = match strategy {
            SampleStrategy::StratifiedBySection => self.sample_stratified(n),
            SampleStrategy::EvenlySpaced => {
                let step = self.facts.len() / n;
                (0..n).map(|i| self.facts[i * step].clone()).collect()
            }
        };

        picked.sort_by_key(|f| f.id);
        debug!(requested = n, picked = picked.len(), ?strategy, "Sampled facts");
        picked
    }

    fn sample_stratified(&self, n: usize) -> Vec<Fact> {
        let groups: Vec<Vec<&Fact>> = self
            .sections()
            .into_iter()
            .map(|section| self.facts.iter().filter(|f| f.section == section).collect())
            .collect();

        // Each round gives one more pick to every section that still has facts. A final
        // partial round spreads its picks over those sections instead of favouring the first.
        // Terminates because n < total facts.
        let mut quotas = vec![0usize; groups.len()];
        let mut remaining = n;
        while remaining > 0 {
            let open: Vec<usize> = (0..groups.len())
                .filter(|&i| quotas[i] < groups[i].len())
                .collect();
            if remaining >= open.len() {
                for &i in &open {
                    quotas[i] += 1;
                }
                remaining -= open.len();
            } else {
                for j in 0..remaining {
                    quotas[open[(2 * j + 1) * open.len() / (2 * remaining)]] += 1;
                }
                remaining = 0;
            }
        }

        groups
            .iter()
            .zip(&quotas)
            .flat_map(|(members, &k)| {
                let m = members.len();
                // Midpoints of k equal slices; distinct because m >= k.
                (0..k).map(move |j| members[(2 * j + 1) * m / (2 * k)].clone())
            })
            .collect()
    }
}

fn load_table(path: &Path) -> CatalogResult<Vec<Fact>> {
    let read_err = |source| CatalogLoadError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;

    let headers = reader.headers().map_err(read_err)?.clone();
    let number_col = headers
        .iter()
        .position(|h| h.trim() == NUMBER_COLUMN)
        .ok_or_else(|| CatalogLoadError::MissingColumn {
            path: path.to_path_buf(),
            column: NUMBER_COLUMN.to_string(),
        })?;
    let text_col = headers
        .iter()
        .position(|h| h.trim() == FACT_TEXT_COLUMN)
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.contains(FACT_TEXT_FALLBACK_MARKER))
        })
        .ok_or_else(|| CatalogLoadError::MissingColumn {
            path: path.to_path_buf(),
            column: FACT_TEXT_COLUMN.to_string(),
        })?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let section = section_name_from_stem(stem);
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let mut facts = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let raw_id = record.get(number_col).unwrap_or_default().trim();
        let id = parse_fact_id(raw_id).ok_or_else(|| CatalogLoadError::InvalidId {
            path: path.to_path_buf(),
            value: raw_id.to_string(),
        })?;
        let text = record.get(text_col).unwrap_or_default().trim();

        facts.push(Fact::new(id, section.clone(), text, file_name.clone()));
    }

    Ok(facts)
}

/// Accepts `"12"` as well as spreadsheet-style `"12.0"`.
pub(crate) fn parse_fact_id(raw: &str) -> Option<u32> {
    if let Ok(id) = raw.parse::<u32>() {
        return Some(id);
    }
    let float: f64 = raw.parse().ok()?;
    if float.fract() == 0.0 && float >= 1.0 && float <= u32::MAX as f64 {
        Some(float as u32)
    } else {
        None
    }
}
