//! Typed payloads carried by research pipeline events.
//!
//! | Kind                  | Payload              |
//! |-----------------------|----------------------|
//! | `UserInputReceived`   | text (the topic)     |
//! | `SearchRequested`     | [`SearchRequest`]    |
//! | `SearchCompleted`     | [`SearchResponse`]   |
//! | `AnalysisRequested`   | [`SearchAggregate`]  |
//! | `StructuredDataReady` | [`StructuredResearch`] |
//! | `SummaryRequested`    | [`SummaryPayload`]   |
//! | `SummaryComplete`     | [`SummaryPayload`]   |

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::sessions::SessionId;

/// One sub-query of a fan-out session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    /// Session the query belongs to.
    pub session: SessionId,
    /// Query text.
    pub query: String,
}

/// One result returned by a [`WebSearch`](crate::research::WebSearch) backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub link: String,
    /// Text excerpt.
    #[serde(default)]
    pub snippet: String,
}

/// Outcome of one sub-query, successful or not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResponse {
    /// Session the query belongs to.
    pub session: SessionId,
    /// Query text.
    pub query: String,
    /// Numbered snippets, one per line: `(1) ...`.
    pub content: String,
    /// Result links joined with `" | "`.
    pub url: String,
    /// Failure reason; `None` on success.
    pub error: Option<String>,
}

impl SearchResponse {
    /// Builds a successful response from backend hits.
    pub fn from_hits(request: &SearchRequest, hits: &[SearchHit]) -> Self {
        let mut content = String::new();
        for (i, hit) in hits.iter().enumerate() {
            if !hit.snippet.is_empty() {
                let _ = writeln!(content, "({}) {}", i + 1, hit.snippet);
            }
        }
        let url = hits
            .iter()
            .filter(|h| !h.link.is_empty())
            .map(|h| h.link.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        Self {
            session: request.session,
            query: request.query.clone(),
            content,
            url,
            error: None,
        }
    }

    /// Builds a failed response.
    pub fn failed(request: &SearchRequest, error: impl Into<String>) -> Self {
        Self {
            session: request.session,
            query: request.query.clone(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Converts into a source if the search succeeded with content.
    pub fn to_source(&self) -> Option<SearchSource> {
        if self.error.is_some() || self.content.is_empty() {
            return None;
        }
        Some(SearchSource {
            query: self.query.clone(),
            url: self.url.clone(),
            snippet: self.content.clone(),
        })
    }
}

/// A search result kept as evidence for analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    /// URL(s) of the result.
    #[serde(default)]
    pub url: String,
    /// Query that produced it.
    #[serde(default)]
    pub query: String,
    /// Text excerpt.
    #[serde(default)]
    pub snippet: String,
}

/// All usable sources of a finished fan-out session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchAggregate {
    /// Original topic.
    pub topic: String,
    /// Successful, non-empty results in arrival order.
    pub sources: Vec<SearchSource>,
}

/// One finding extracted by the model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFinding {
    /// The claim.
    #[serde(default)]
    pub finding: String,
    /// Supporting URLs, restricted to the known sources.
    #[serde(default)]
    pub evidence_urls: Vec<String>,
    /// Confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
}

/// Structured research record produced by the analysis stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResearch {
    /// Research topic.
    #[serde(default)]
    pub topic: String,
    /// Extracted findings.
    #[serde(default)]
    pub key_findings: Vec<StructuredFinding>,
    /// Known obstacles or caveats.
    #[serde(default)]
    pub challenges: Vec<String>,
    /// Unresolved questions.
    #[serde(default)]
    pub open_questions: Vec<String>,
    /// Sources the findings are based on.
    #[serde(default)]
    pub sources: Vec<SearchSource>,
    /// Set when the topic cannot be researched; lists are then empty.
    #[serde(default)]
    pub error: String,
}

impl StructuredResearch {
    /// Record used when the model output cannot be structured.
    pub fn fallback(aggregate: &SearchAggregate) -> Self {
        Self {
            topic: aggregate.topic.clone(),
            sources: aggregate.sources.clone(),
            open_questions: vec!["Structured extraction failed; using raw sources.".to_string()],
            ..Self::default()
        }
    }

    /// Returns the refusal reason, if the topic was rejected.
    pub fn refusal(&self) -> Option<&str> {
        let reason = self.error.trim();
        (!reason.is_empty()).then_some(reason)
    }
}

/// Report, summary and supporting data of a finished pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    /// Research topic.
    pub topic: String,
    /// Executive summary.
    pub summary: String,
    /// Full report.
    pub report: String,
    /// Sources used.
    pub sources: Vec<SearchSource>,
    /// Structured record the report was written from.
    pub structured: StructuredResearch,
}

/// Heading prepended to the final report.
pub const REPORT_HEADING: &str = "RESEARCH REPORT\n===============\n";

impl SummaryPayload {
    /// Payload for a topic the model refused to research.
    pub fn refused(structured: StructuredResearch, reason: &str) -> Self {
        let message = format!("Unable to perform research for this topic: {reason}");
        Self {
            topic: structured.topic.clone(),
            summary: message.clone(),
            report: message,
            sources: structured.sources.clone(),
            structured,
        }
    }

    /// Final form of the payload: the report gains its heading.
    pub fn finalize(self) -> Self {
        Self {
            report: format!("{REPORT_HEADING}{}", self.report),
            ..self
        }
    }
}

/// What an [`ArtifactSink`](crate::research::ArtifactSink) persists.
pub type ArtifactBundle = SummaryPayload;

impl SummaryPayload {
    /// Renders the bundle as a Markdown document.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Research Report\n\n");
        let _ = write!(out, "## Topic\n\n{}\n\n", self.topic);
        let _ = write!(out, "## Executive Summary\n\n{}\n\n", self.summary);
        let _ = write!(out, "## Report\n\n{}\n\n", self.report);

        if !self.structured.key_findings.is_empty() {
            out.push_str("## Key Findings\n\n");
            for f in &self.structured.key_findings {
                let _ = writeln!(out, "- {} (confidence: {:.2})", f.finding, f.confidence);
            }
            out.push('\n');
        }

        out.push_str("## Sources\n\n");
        for (i, s) in self.sources.iter().enumerate() {
            let _ = write!(
                out,
                "{}. {}\n   - Query: {}\n   - Snippet: {}\n\n",
                i + 1,
                s.url,
                s.query,
                s.snippet
            );
        }
        out
    }
}
