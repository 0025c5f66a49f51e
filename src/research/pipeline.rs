//! # Research pipeline handler.
//!
//! [`ResearchPipeline`] turns a topic into a persisted research report by
//! chaining events through the engine. Slow calls run on detached stages so
//! workers stay free.
//!
//! ```text
//! UserInputReceived(topic)
//!   └─ plan stage ─► queries (fallback: [topic]) ─► begin session(N)
//!        └─► SearchRequested × N
//! SearchRequested
//!   └─ search stage ─► SearchCompleted (errors and timeouts folded in)
//! SearchCompleted
//!   └─ record ─► last of N ─► AnalysisRequested{topic, usable sources}
//! AnalysisRequested
//!   └─ analyze stage ─► StructuredDataReady (fallback record if unparseable)
//!                    └─ deadline ─► Timeout
//! StructuredDataReady
//!   ├─ refused topic ─► SummaryRequested{message}
//!   └─ report stage ─► SummaryRequested{report, summary}
//!                   └─ report failure ─► Error
//! SummaryRequested ─► SummaryComplete (report gains its heading)
//! SummaryComplete  ─► artifact sink
//! Timeout / Error  ─► logged
//! ```
//!
//! Every admitted topic ends in a `SummaryComplete`, `Timeout` or `Error`,
//! which releases its admission slot. An event missing its payload ends its
//! pipeline with an `Error` rather than stalling it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};

use crate::core::{Publisher, Stage};
use crate::error::StageError;
use crate::events::{Event, EventKind};
use crate::handlers::Handler;
use crate::policies::RetryPolicy;
use crate::research::collaborators::{ArtifactSink, LanguageModel, QueryPlanner, WebSearch};
use crate::research::payload::{
    SearchAggregate, SearchRequest, SearchResponse, StructuredResearch, SummaryPayload,
};
use crate::research::{prompts, structured};
use crate::sessions::{Begin, RecordOutcome, SessionId, SessionRegistry, SubResult};

/// Text used when the executive summary cannot be generated.
pub const SUMMARY_UNAVAILABLE: &str = "Executive summary unavailable due to generation error.";

/// Tuning of the research pipeline.
#[derive(Clone, Debug)]
pub struct ResearchConfig {
    /// Results requested per query (clamped to `1..=10`).
    pub results_per_query: usize,
    /// Deadline of the planning stage.
    pub plan_deadline: Duration,
    /// Deadline of each search.
    pub search_deadline: Duration,
    /// Deadline of the structuring stage.
    pub analysis_deadline: Duration,
    /// Deadline of report plus summary generation.
    pub report_deadline: Duration,
    /// Retry policy for searches.
    pub search_retry: RetryPolicy,
}

impl Default for ResearchConfig {
    /// 3 results per query; deadlines 30s plan, 30s search, 90s analysis, 90s report;
    /// single search attempt.
    fn default() -> Self {
        Self {
            results_per_query: 3,
            plan_deadline: Duration::from_secs(30),
            search_deadline: Duration::from_secs(30),
            analysis_deadline: Duration::from_secs(90),
            report_deadline: Duration::from_secs(90),
            search_retry: RetryPolicy::once(),
        }
    }
}

/// Handler wiring the research stages together.
pub struct ResearchPipeline {
    planner: Arc<dyn QueryPlanner>,
    search: Arc<dyn WebSearch>,
    model: Arc<dyn LanguageModel>,
    sink: Arc<dyn ArtifactSink>,
    sessions: Arc<SessionRegistry<SearchResponse>>,
    cfg: ResearchConfig,
}

impl ResearchPipeline {
    /// Creates a pipeline over the given collaborators.
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        search: Arc<dyn WebSearch>,
        model: Arc<dyn LanguageModel>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            planner,
            search,
            model,
            sink,
            sessions: SessionRegistry::shared(),
            cfg: ResearchConfig::default(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: ResearchConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Fan-out sessions still waiting for search results.
    pub fn sessions(&self) -> &Arc<SessionRegistry<SearchResponse>> {
        &self.sessions
    }

    async fn on_user_input(&self, event: &Event, publisher: Publisher) {
        let Some(topic) = event.as_text().map(str::to_string) else {
            return malformed(event, &publisher, "input event without topic").await;
        };
        info!(%topic, "processing topic");

        let planner = Arc::clone(&self.planner);
        let sessions = Arc::clone(&self.sessions);
        let stage = Stage::new("plan", EventKind::UserInputReceived)
            .with_deadline(self.cfg.plan_deadline);

        tokio::spawn(async move {
            let queries = match stage
                .run(|_ctx| {
                    let planner = Arc::clone(&planner);
                    let topic = topic.clone();
                    async move { planner.plan(&topic).await.map_err(StageError::failed) }
                })
                .await
            {
                Ok(queries) if !queries.is_empty() => queries,
                Ok(_) => vec![topic.clone()],
                Err(e) => {
                    warn!(%topic, error = %e, "query planning failed; searching the topic itself");
                    vec![topic.clone()]
                }
            };
            fan_out(&sessions, &publisher, topic, queries).await;
        });
    }

    async fn on_search_requested(&self, event: &Event, publisher: Publisher) {
        let Some(req) = event.data_ref::<SearchRequest>().cloned() else {
            return malformed(event, &publisher, "search request without payload").await;
        };
        debug!(session = %req.session.short(), query = %req.query, "searching");

        let search = Arc::clone(&self.search);
        let limit = self.cfg.results_per_query.clamp(1, 10);
        let stage = Stage::new("search", EventKind::SearchRequested)
            .with_deadline(self.cfg.search_deadline)
            .with_retry(self.cfg.search_retry);

        tokio::spawn(async move {
            let outcome = stage
                .run(|_ctx| {
                    let search = Arc::clone(&search);
                    let query = req.query.clone();
                    async move {
                        search
                            .search(&query, limit)
                            .await
                            .map_err(StageError::failed)
                    }
                })
                .await;

            let response = match outcome {
                Ok(hits) => SearchResponse::from_hits(&req, &hits),
                Err(e) => SearchResponse::failed(&req, e.to_string()),
            };
            if publisher
                .publish(Event::data(EventKind::SearchCompleted, response))
                .await
                .is_err()
            {
                debug!(session = %req.session.short(), "engine closed; search result dropped");
            }
        });
    }

    async fn on_search_completed(&self, event: &Event, publisher: Publisher) {
        let Some(resp) = event.data_ref::<SearchResponse>() else {
            return malformed(event, &publisher, "search completion without payload").await;
        };
        let result = match &resp.error {
            Some(err) => {
                warn!(session = %resp.session.short(), query = %resp.query, error = %err, "search failed");
                SubResult::Failed(err.clone())
            }
            None => {
                debug!(session = %resp.session.short(), url = %resp.url, "search ok");
                SubResult::Ok(resp.clone())
            }
        };

        match self.sessions.record(&resp.session, result) {
            RecordOutcome::Pending { completed, expected } => {
                debug!(session = %resp.session.short(), completed, expected, "waiting for searches");
            }
            RecordOutcome::Complete(done) => {
                let aggregate = SearchAggregate {
                    topic: done.input.clone(),
                    sources: done.successes().filter_map(SearchResponse::to_source).collect(),
                };
                info!(
                    session = %done.id.short(),
                    sources = aggregate.sources.len(),
                    failed = done.failures(),
                    "all searches complete; starting analysis"
                );
                forward(&publisher, Event::data(EventKind::AnalysisRequested, aggregate)).await;
            }
            RecordOutcome::Unknown => {}
        }
    }

    async fn on_analysis_requested(&self, event: &Event, publisher: Publisher) {
        let Some(aggregate) = event.data_ref::<SearchAggregate>().cloned() else {
            return malformed(event, &publisher, "analysis request without payload").await;
        };
        info!(topic = %aggregate.topic, sources = aggregate.sources.len(), "structuring research");

        let model = Arc::clone(&self.model);
        let aggregate = Arc::new(aggregate);
        Stage::new("analyze", EventKind::AnalysisRequested)
            .with_deadline(self.cfg.analysis_deadline)
            .spawn(publisher, move |_ctx| {
                let model = Arc::clone(&model);
                let aggregate = Arc::clone(&aggregate);
                async move {
                    let structured = match model.complete(&prompts::structure(&aggregate)).await {
                        Ok(raw) => structured::parse_structured_research(&raw).unwrap_or_else(|e| {
                            warn!(error = %e, "structured reply unparseable; using raw sources");
                            StructuredResearch::fallback(&aggregate)
                        }),
                        Err(e) => {
                            warn!(error = %e, "structuring failed; using raw sources");
                            StructuredResearch::fallback(&aggregate)
                        }
                    };
                    Ok(Event::data(EventKind::StructuredDataReady, structured))
                }
            });
    }

    async fn on_structured_ready(&self, event: &Event, publisher: Publisher) {
        let Some(structured) = event.data_ref::<StructuredResearch>().cloned() else {
            return malformed(event, &publisher, "structured data event without payload").await;
        };

        if let Some(reason) = structured.refusal().map(str::to_string) {
            warn!(topic = %structured.topic, %reason, "topic refused");
            let payload = SummaryPayload::refused(structured, &reason);
            forward(&publisher, Event::data(EventKind::SummaryRequested, payload)).await;
            return;
        }
        info!(topic = %structured.topic, findings = structured.key_findings.len(), "writing report");

        let model = Arc::clone(&self.model);
        let structured = Arc::new(structured);
        Stage::new("report", EventKind::StructuredDataReady)
            .with_deadline(self.cfg.report_deadline)
            .spawn(publisher, move |_ctx| {
                let model = Arc::clone(&model);
                let structured = Arc::clone(&structured);
                async move {
                    let json = prompts::structured_json(&structured).map_err(StageError::fatal)?;
                    let report = model
                        .complete(&prompts::report(&json))
                        .await
                        .map_err(StageError::failed)?;
                    let summary = match model.complete(&prompts::executive_summary(&report)).await {
                        Ok(summary) => summary,
                        Err(e) => {
                            warn!(error = %e, "executive summary failed");
                            SUMMARY_UNAVAILABLE.to_string()
                        }
                    };
                    Ok(Event::data(
                        EventKind::SummaryRequested,
                        SummaryPayload {
                            topic: structured.topic.clone(),
                            summary,
                            report,
                            sources: structured.sources.clone(),
                            structured: (*structured).clone(),
                        },
                    ))
                }
            });
    }

    async fn on_summary_requested(&self, event: &Event, publisher: Publisher) {
        let Some(payload) = event.data_ref::<SummaryPayload>().cloned() else {
            return malformed(event, &publisher, "summary request without payload").await;
        };
        forward(&publisher, Event::data(EventKind::SummaryComplete, payload.finalize())).await;
    }

    async fn on_summary_complete(&self, event: &Event) {
        // Terminal: the slot is already released, there is nothing to end.
        let Some(bundle) = event.data_ref::<SummaryPayload>() else {
            warn!(seq = event.seq, "completion without payload");
            return;
        };
        match self.sink.store(bundle).await {
            Ok(location) => info!(topic = %bundle.topic, %location, "research output stored"),
            Err(e) => error!(topic = %bundle.topic, error = %e, "failed to store research output"),
        }
    }
}

/// Ends the event's pipeline with an `Error` for a missing payload.
async fn malformed(event: &Event, publisher: &Publisher, reason: &'static str) {
    warn!(seq = event.seq, kind = %event.kind, pipeline = ?event.pipeline, reason, "malformed event");
    forward(publisher, Event::error(event.kind, reason)).await;
}

/// Publishes `event`, logging when the engine no longer accepts it.
async fn forward(publisher: &Publisher, event: Event) {
    let kind = event.kind;
    if publisher.publish(event).await.is_err() {
        debug!(kind = %kind, pipeline = ?publisher.pipeline(), "engine closed; event dropped");
    }
}

/// Registers a session for `queries` and publishes one search per query.
async fn fan_out(
    sessions: &SessionRegistry<SearchResponse>,
    publisher: &Publisher,
    topic: String,
    queries: Vec<String>,
) {
    let id = SessionId::new();
    match sessions.begin(id, topic.clone(), queries.len()) {
        Ok(Begin::Pending(id)) => {
            info!(session = %id.short(), searches = queries.len(), "initiating searches");
            for query in queries {
                let req = SearchRequest { session: id, query };
                if publisher
                    .publish(Event::data(EventKind::SearchRequested, req))
                    .await
                    .is_err()
                {
                    sessions.remove(&id);
                    debug!(session = %id.short(), "engine closed; fan-out abandoned");
                    return;
                }
            }
        }
        Ok(Begin::Complete(done)) => {
            let aggregate = SearchAggregate {
                topic: done.input,
                sources: Vec::new(),
            };
            forward(publisher, Event::data(EventKind::AnalysisRequested, aggregate)).await;
        }
        Err(e) => {
            error!(error = %e, "could not open session");
            forward(publisher, Event::error(EventKind::UserInputReceived, e.to_string())).await;
        }
    }
}

#[async_trait]
impl Handler for ResearchPipeline {
    async fn handle(&self, event: Event, publisher: Publisher) {
        match event.kind {
            EventKind::Tick | EventKind::Heartbeat => trace!(seq = event.seq, "liveness"),
            EventKind::Log => info!(message = event.as_text().unwrap_or_default(), "pipeline log"),
            EventKind::UserInputReceived => self.on_user_input(&event, publisher).await,
            EventKind::SearchRequested => self.on_search_requested(&event, publisher).await,
            EventKind::SearchCompleted => self.on_search_completed(&event, publisher).await,
            EventKind::AnalysisRequested => self.on_analysis_requested(&event, publisher).await,
            EventKind::StructuredDataReady => self.on_structured_ready(&event, publisher).await,
            EventKind::SummaryRequested => self.on_summary_requested(&event, publisher).await,
            EventKind::SummaryComplete => self.on_summary_complete(&event).await,
            EventKind::Timeout => warn!(
                origin = ?event.origin,
                reason = event.reason.as_deref().unwrap_or_default(),
                "recovering after timeout"
            ),
            EventKind::Error => error!(
                origin = ?event.origin,
                reason = event.reason.as_deref().unwrap_or_default(),
                "pipeline failed"
            ),
            EventKind::Custom(name) => trace!(kind = name, "ignored custom event"),
        }
    }

    fn name(&self) -> &'static str {
        "research"
    }
}
