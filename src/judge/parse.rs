//! Strict parsing of model replies into a [`Verdict`].
//!
//! The reply must contain one JSON object, bare or inside a markdown fence. Nothing
//! is coerced: a fractional or out-of-range score, an unknown confidence or a
//! missing summary is a [`SchemaViolation`].

use serde_json::{Map, Value};

use crate::assessment::Confidence;
use crate::constants::{MAX_SCORE, MIN_SCORE};

/// Summary keys accepted in the reply, in order of preference.
const SUMMARY_KEYS: &[&str] = &["key_evidence", "evidence_summary"];

/// Well-formed judgment extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub score: u8,
    pub confidence: Confidence,
    pub supporting_papers: Vec<String>,
    pub contradicting_papers: Vec<String>,
    pub evidence_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub raw: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

pub fn parse_verdict(raw: &str) -> Result<Verdict, SchemaViolation> {
    let json = extract_json(raw).ok_or_else(|| SchemaViolation::new(raw, "no JSON object found"))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaViolation::new(raw, format!("invalid JSON: {e}")))?;
    let Value::Object(object) = value else {
        return Err(SchemaViolation::new(raw, "top-level JSON value is not an object"));
    };

    let score = parse_score(&object).map_err(|reason| SchemaViolation::new(raw, reason))?;

    let confidence = match object.get("confidence") {
        Some(Value::String(s)) => s
            .parse::<Confidence>()
            .map_err(|e| SchemaViolation::new(raw, e))?,
        Some(_) => return Err(SchemaViolation::new(raw, "confidence is not a string")),
        None => return Err(SchemaViolation::new(raw, "missing field: confidence")),
    };

    let evidence_summary = SUMMARY_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .ok_or_else(|| SchemaViolation::new(raw, "missing field: key_evidence"))?
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SchemaViolation::new(raw, "key_evidence is not a string"))?;

    let supporting_papers = paper_list(&object, "supporting_papers")
        .map_err(|reason| SchemaViolation::new(raw, reason))?;
    let contradicting_papers = paper_list(&object, "contradicting_papers")
        .map_err(|reason| SchemaViolation::new(raw, reason))?;

    Ok(Verdict {
        score,
        confidence,
        supporting_papers,
        contradicting_papers,
        evidence_summary,
    })
}

/// Returns the JSON text inside the first markdown fence, or the outermost braces.
pub(crate) fn extract_json(raw: &str) -> Option<&str> {
    if let Some(start) = raw.find("```") {
        let after_fence = &raw[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let body = body.find("```").map(|end| &body[..end]).unwrap_or(body);
        let trimmed = body.trim();
        if trimmed.starts_with('{') {
            return Some(trimmed);
        }
    }

    let open = raw.find('{')?;
    let close = raw.rfind('}')?;
    (close > open).then(|| &raw[open..=close])
}

fn parse_score(object: &Map<String, Value>) -> Result<u8, String> {
    let value = object
        .get("score")
        .ok_or_else(|| "missing field: score".to_string())?;

    let score = value
        .as_i64()
        .ok_or_else(|| format!("score {value} is not an integer"))?;

    if !(i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&score) {
        return Err(format!("score {score} is outside {MIN_SCORE}..={MAX_SCORE}"));
    }
    u8::try_from(score).map_err(|_| format!("score {score} is outside {MIN_SCORE}..={MAX_SCORE}"))
}

/// Optional list of document identifiers. Duplicates are dropped, order is kept.
fn paper_list(object: &Map<String, Value>, key: &str) -> Result<Vec<String>, String> {
    let Some(value) = object.get(key) else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = value else {
        if value.is_null() {
            return Ok(Vec::new());
        }
        return Err(format!("{key} is not a list"));
    };

    let mut papers: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let paper = item
            .as_str()
            .map(str::trim)
            .ok_or_else(|| format!("{key} contains a non-string entry"))?;
        if paper.is_empty() {
            return Err(format!("{key} contains a blank entry"));
        }
        if !papers.iter().any(|p| p == paper) {
            papers.push(paper.to_string());
        }
    }
    Ok(papers)
}
