//! Prompt builders for the model-backed stages.

use std::fmt::Write as _;

use crate::research::payload::{SearchAggregate, StructuredResearch};

/// Asks for `count` search queries as a bare JSON array.
pub fn query_plan(topic: &str, count: usize) -> String {
    format!(
        "Given the following research topic, generate {count} specific search queries \
         to gather comprehensive information. Return ONLY a JSON array of strings.\n\
         Topic: {topic}\nReturn ONLY the JSON."
    )
}

const STRUCTURE_SCHEMA: &str = r#"Schema:
{
  "topic": "string",
  "key_findings": [
    {
      "finding": "string",
      "evidence_urls": ["string"],
      "confidence": 0.0
    }
  ],
  "challenges": ["string"],
  "open_questions": ["string"],
  "sources": [
    {
      "url": "string",
      "query": "string",
      "snippet": "string"
    }
  ],
  "error": "string"
}

Rules:
- Use only the provided sources.
- evidence_urls must be URLs from sources.
- confidence ranges 0.0-1.0.
- If unsure, reduce confidence and add an open question.
- If the topic is gibberish, unsafe, disallowed, or cannot be meaningfully researched, set "error" to a short explanation and return empty arrays for key_findings/challenges/open_questions/sources.
- Unsafe/disallowed examples: making bombs, domestic terrorism, suicide assistance, or any other harmful instructions."#;

/// Asks the model to convert aggregated sources into a structured record.
pub fn structure(aggregate: &SearchAggregate) -> String {
    let mut sources = String::new();
    for s in &aggregate.sources {
        let _ = write!(
            sources,
            "- Source: {}\n  Query: {}\n  Snippet: {}\n\n",
            s.url, s.query, s.snippet
        );
    }
    format!(
        "You are a research assistant. Convert the search results into the following JSON schema.\n\
         Return ONLY valid JSON. No commentary. No markdown.\n\n\
         {STRUCTURE_SCHEMA}\n\nTopic: {}\n\nSources:\n{sources}",
        aggregate.topic
    )
}

/// Asks for a full report written from the structured record (as pretty JSON).
pub fn report(structured_json: &str) -> String {
    format!(
        "You are a research assistant. Write a comprehensive report based only on the structured data below.\n\
         Include key insights, challenges, and a conclusion.\n\
         Structured Data:\n{structured_json}"
    )
}

/// Asks for a 3-5 bullet executive summary of `report`.
pub fn executive_summary(report: &str) -> String {
    format!(
        "Create a short executive summary (3-5 bullet points) for the following report.\n\
         Return plain text bullets.\nReport:\n{report}"
    )
}

/// Serializes a record for [`report`].
pub fn structured_json(structured: &StructuredResearch) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(structured)
}
