//! # Research assistant pipeline.
//!
//! A complete [`Handler`](crate::Handler) built on the engine: topics fan out
//! into web searches, the results fan back in through a
//! [`SessionRegistry`](crate::SessionRegistry), and model-backed stages turn
//! them into a structured record, a report and an executive summary.
//!
//! External services are reached only through the traits in
//! [`collaborators`]; the crate ships no network clients.
//!
//! Requires the `research` feature (enabled by default).

pub mod collaborators;
pub mod payload;
mod pipeline;
pub mod prompts;
pub mod structured;

pub use collaborators::{
    ArtifactSink, CollaboratorError, FallbackModel, LanguageModel, ModelQueryPlanner,
    QueryPlanner, WebSearch,
};
pub use payload::{
    ArtifactBundle, SearchAggregate, SearchHit, SearchRequest, SearchResponse, SearchSource,
    StructuredFinding, StructuredResearch, SummaryPayload,
};
pub use pipeline::{ResearchConfig, ResearchPipeline, SUMMARY_UNAVAILABLE};
