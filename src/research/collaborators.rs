//! # Collaborator seams of the research pipeline.
//!
//! Planning, search, language models and artifact storage live outside the
//! crate. The pipeline only sees these traits; deadlines are enforced by the
//! [`Stage`](crate::Stage) that calls them, which drops the future on expiry.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::research::payload::{ArtifactBundle, SearchHit};
use crate::research::{prompts, structured};

/// # Errors reported by collaborators.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Backend unreachable, not configured, or failing.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with something unusable.
    #[error("invalid response: {0}")]
    Invalid(String),

    /// Backend answered with nothing.
    #[error("empty response")]
    Empty,
}

impl CollaboratorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CollaboratorError::Unavailable(_) => "collaborator_unavailable",
            CollaboratorError::Invalid(_) => "collaborator_invalid",
            CollaboratorError::Empty => "collaborator_empty",
        }
    }
}

/// Turns a topic into search queries.
#[async_trait]
pub trait QueryPlanner: Send + Sync + 'static {
    /// Returns the queries to fan out for `topic`.
    async fn plan(&self, topic: &str) -> Result<Vec<String>, CollaboratorError>;
}

/// Web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync + 'static {
    /// Returns at most `limit` hits for `query`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError>;
}

/// Text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Completes `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Persists finished research.
#[async_trait]
pub trait ArtifactSink: Send + Sync + 'static {
    /// Stores `bundle` and returns where it went.
    async fn store(&self, bundle: &ArtifactBundle) -> Result<String, CollaboratorError>;
}

/// Plans queries by asking a language model for a JSON array.
pub struct ModelQueryPlanner {
    model: Arc<dyn LanguageModel>,
    count: usize,
}

impl ModelQueryPlanner {
    /// Asks `model` for `count` queries per topic.
    pub fn new(model: Arc<dyn LanguageModel>, count: usize) -> Self {
        Self {
            model,
            count: count.max(1),
        }
    }
}

#[async_trait]
impl QueryPlanner for ModelQueryPlanner {
    async fn plan(&self, topic: &str) -> Result<Vec<String>, CollaboratorError> {
        let reply = self
            .model
            .complete(&prompts::query_plan(topic, self.count))
            .await?;
        structured::parse_query_list(&reply)
    }
}

/// Language model that retries a failed completion on a second model.
pub struct FallbackModel {
    primary: Arc<dyn LanguageModel>,
    fallback: Arc<dyn LanguageModel>,
}

impl FallbackModel {
    /// Tries `primary` first, then `fallback`.
    pub fn new(primary: Arc<dyn LanguageModel>, fallback: Arc<dyn LanguageModel>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl LanguageModel for FallbackModel {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        match self.primary.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(first) => {
                warn!(error = %first, "primary model failed; trying fallback");
                self.fallback.complete(prompt).await.map_err(|second| {
                    CollaboratorError::Unavailable(format!(
                        "primary and fallback models failed: {first}; {second}"
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<String, CollaboratorError>);

    #[async_trait]
    impl LanguageModel for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            self.0.clone()
        }
    }

    fn canned(r: Result<&str, CollaboratorError>) -> Arc<dyn LanguageModel> {
        Arc::new(Canned(r.map(str::to_string)))
    }

    #[tokio::test]
    async fn test_fallback_model() {
        let down = || Err(CollaboratorError::Unavailable("503".into()));

        let m = FallbackModel::new(canned(down()), canned(Ok("from fallback")));
        assert_eq!(m.complete("p").await.unwrap(), "from fallback");

        let m = FallbackModel::new(canned(Ok("from primary")), canned(down()));
        assert_eq!(m.complete("p").await.unwrap(), "from primary");

        let m = FallbackModel::new(canned(down()), canned(Err(CollaboratorError::Empty)));
        let err = m.complete("p").await.unwrap_err();
        assert_eq!(err.as_label(), "collaborator_unavailable");
    }

    #[tokio::test]
    async fn test_model_planner_parses_fenced_array() {
        let planner = ModelQueryPlanner::new(
            canned(Ok("```json\n[\"tokio internals\", \"async rust io\"]\n```")),
            3,
        );
        assert_eq!(
            planner.plan("async rust").await.unwrap(),
            vec!["tokio internals".to_string(), "async rust io".to_string()]
        );

        let planner = ModelQueryPlanner::new(canned(Ok("no idea")), 3);
        assert!(planner.plan("async rust").await.is_err());
    }
}
