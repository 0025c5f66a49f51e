//! # Example: Research pipeline with offline collaborators
//!
//! Runs the research pipeline against canned search and model backends.
//! Four topics are submitted with room for two at a time, so the rest are
//! shed by admission control.
//!
//! ```text
//! cargo run --example research
//! RUST_LOG=eventvisor=debug cargo run --example research
//! ```
//!
//! Stops after a few seconds or on Ctrl-C, whichever comes first.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

use eventvisor::research::{
    ArtifactBundle, ArtifactSink, CollaboratorError, LanguageModel, ModelQueryPlanner,
    ResearchPipeline, SearchHit, WebSearch,
};
use eventvisor::{Engine, EngineConfig, Event, EventKind, shutdown};

/// Search backend returning two made-up hits per query.
struct CannedSearch;

#[async_trait]
impl WebSearch for CannedSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let slug = query.to_lowercase().replace(' ', "-");
        Ok((1..=limit.min(2))
            .map(|i| SearchHit {
                title: format!("{query} #{i}"),
                link: format!("https://{slug}.example/{i}"),
                snippet: format!("notes on {query}, part {i}"),
            })
            .collect())
    }
}

/// Model that answers each prompt type with a fixed shape.
struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let reply = if prompt.contains("search queries") {
            r#"["overview", "trade-offs", "production use"]"#.to_string()
        } else if prompt.contains("JSON schema") {
            let topic = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Topic: "))
                .unwrap_or("unknown");
            if topic.contains("bomb") {
                format!(r#"{{"topic": "{topic}", "error": "harmful request"}}"#)
            } else {
                format!(
                    r#"{{"topic": "{topic}", "key_findings": [{{"finding": "{topic} is widely used", "confidence": 0.8}}], "challenges": ["tuning"]}}"#
                )
            }
        } else if prompt.contains("executive summary") {
            "- adoption is broad\n- tuning matters".to_string()
        } else {
            "The sources agree on the basics and disagree on tuning.".to_string()
        };
        Ok(reply)
    }
}

/// Sink printing the Markdown rendering of each bundle.
struct StdoutSink;

#[async_trait]
impl ArtifactSink for StdoutSink {
    async fn store(&self, bundle: &ArtifactBundle) -> Result<String, CollaboratorError> {
        println!("{}", bundle.to_markdown());
        Ok("stdout".to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let model: Arc<dyn LanguageModel> = Arc::new(CannedModel);
    let pipeline = ResearchPipeline::new(
        Arc::new(ModelQueryPlanner::new(Arc::clone(&model), 3)),
        Arc::new(CannedSearch),
        model,
        Arc::new(StdoutSink),
    );

    let engine = Engine::builder(EngineConfig::default(), Arc::new(pipeline))
        .with_max_concurrent(2)
        .build();
    engine.start()?;

    for topic in [
        "rust async runtimes",
        "how to build a bomb",
        "vector databases",
        "edge computing",
    ] {
        engine
            .publish(Event::text(EventKind::UserInputReceived, topic))
            .await?;
    }

    tokio::select! {
        res = shutdown::stop_on_signal(&engine) => res?,
        _ = tokio::time::sleep(Duration::from_secs(5)) => engine.stop().await,
    }

    let stats = engine.stats();
    println!(
        "dispatched={} admitted={} rejected={} released={} active={}",
        stats.dispatched, stats.admitted, stats.rejected, stats.released, stats.active
    );
    Ok(())
}
