//! # Parsing model replies.
//!
//! Models wrap JSON in prose or code fences, so both parsers first cut the
//! reply down to its outermost array/object and only then deserialize.
//!
//! ## Structured record rules
//! - empty `topic` → `"Unknown Topic"`
//! - non-empty `error` → findings, challenges, questions and sources are cleared
//! - all text fields are trimmed
//! - `confidence` is clamped to `[0, 1]`
//! - evidence URLs not listed in `sources` are dropped (skipped when there are no source URLs)

use std::collections::HashSet;

use crate::research::collaborators::CollaboratorError;
use crate::research::payload::StructuredResearch;

/// Extracts the outermost `open ... close` span of `raw`.
fn outermost(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses a JSON array of query strings out of a model reply.
///
/// Blank entries are dropped; an array with nothing left is [`CollaboratorError::Empty`].
pub fn parse_query_list(raw: &str) -> Result<Vec<String>, CollaboratorError> {
    let json = outermost(raw.trim(), '[', ']')
        .ok_or_else(|| CollaboratorError::Invalid("no json array found".into()))?;
    let queries: Vec<String> =
        serde_json::from_str(json).map_err(|e| CollaboratorError::Invalid(e.to_string()))?;

    let queries: Vec<String> = queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if queries.is_empty() {
        return Err(CollaboratorError::Empty);
    }
    Ok(queries)
}

/// Parses and normalizes a structured research record out of a model reply.
pub fn parse_structured_research(raw: &str) -> Result<StructuredResearch, CollaboratorError> {
    let json = outermost(raw.trim(), '{', '}')
        .ok_or_else(|| CollaboratorError::Invalid("no json object found".into()))?;
    let mut sr: StructuredResearch =
        serde_json::from_str(json).map_err(|e| CollaboratorError::Invalid(e.to_string()))?;

    sr.topic = sr.topic.trim().to_string();
    if sr.topic.is_empty() {
        sr.topic = "Unknown Topic".to_string();
    }
    sr.error = sr.error.trim().to_string();
    if !sr.error.is_empty() {
        sr.key_findings.clear();
        sr.challenges.clear();
        sr.open_questions.clear();
        sr.sources.clear();
    }
    validate(&mut sr);
    Ok(sr)
}

/// Normalizes a record in place: trims text, clamps confidence, filters evidence.
pub fn validate(sr: &mut StructuredResearch) {
    for s in &mut sr.sources {
        trim_in_place(&mut s.url);
        trim_in_place(&mut s.query);
        trim_in_place(&mut s.snippet);
    }
    let known: HashSet<String> = sr
        .sources
        .iter()
        .filter(|s| !s.url.is_empty())
        .map(|s| s.url.clone())
        .collect();

    for f in &mut sr.key_findings {
        trim_in_place(&mut f.finding);
        f.confidence = if f.confidence.is_nan() {
            0.0
        } else {
            f.confidence.clamp(0.0, 1.0)
        };
        if known.is_empty() {
            continue;
        }
        f.evidence_urls = std::mem::take(&mut f.evidence_urls)
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| known.contains(u))
            .collect();
    }

    for text in sr.challenges.iter_mut().chain(sr.open_questions.iter_mut()) {
        trim_in_place(text);
    }
}

fn trim_in_place(s: &mut String) {
    let trimmed = s.trim();
    if trimmed.len() != s.len() {
        *s = trimmed.to_string();
    }
}
