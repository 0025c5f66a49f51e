//! Research pipeline end to end with in-memory collaborators.
#![cfg(feature = "research")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use eventvisor::research::{
    ArtifactBundle, ArtifactSink, CollaboratorError, LanguageModel, ModelQueryPlanner,
    QueryPlanner, ResearchConfig, ResearchPipeline, SUMMARY_UNAVAILABLE, SearchHit, WebSearch,
};
use eventvisor::{Engine, EngineConfig, Event, EventKind, Handler, HandlerRef, Publisher};

struct FixedPlanner(Result<Vec<String>, CollaboratorError>);

#[async_trait]
impl QueryPlanner for FixedPlanner {
    async fn plan(&self, _topic: &str) -> Result<Vec<String>, CollaboratorError> {
        self.0.clone()
    }
}

/// Plans a single query: the topic itself.
struct EchoPlanner;

#[async_trait]
impl QueryPlanner for EchoPlanner {
    async fn plan(&self, topic: &str) -> Result<Vec<String>, CollaboratorError> {
        Ok(vec![topic.to_string()])
    }
}

#[derive(Default)]
struct FakeSearch {
    queries: Mutex<Vec<String>>,
    /// When set, every search waits for a permit before answering.
    gate: Option<Arc<Semaphore>>,
}

impl FakeSearch {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if query.contains("broken") {
            return Err(CollaboratorError::Unavailable("search quota exceeded".into()));
        }
        assert_eq!(limit, 3);
        let slug = query.replace(' ', "-");
        Ok(vec![SearchHit {
            title: query.to_string(),
            link: format!("https://{slug}.example"),
            snippet: format!("about {query}"),
        }])
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Normal,
    Refuse,
    SlowStructuring,
    ReportFails,
    SummaryFails,
    Garbage,
}

struct FakeModel(Behavior);

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        if prompt.contains("Convert the search results") {
            return match self.0 {
                Behavior::Refuse => Ok(r#"{"topic": "bad", "error": "disallowed topic"}"#.into()),
                Behavior::SlowStructuring => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("{}".into())
                }
                Behavior::Garbage => Ok("I would rather not use JSON".into()),
                _ => Ok(r#"```json
                {"topic": "event engines",
                 "key_findings": [{"finding": "queues bound memory",
                                   "evidence_urls": ["https://bounded-queues.example", "https://invented.example"],
                                   "confidence": 3}],
                 "sources": [{"url": "https://bounded-queues.example", "query": "bounded queues", "snippet": "about bounded queues"}]}
                ```"#
                    .into()),
            };
        }
        if prompt.contains("Write a comprehensive report") {
            return match self.0 {
                Behavior::ReportFails => Err(CollaboratorError::Unavailable("model overloaded".into())),
                _ => Ok("Queues bound memory.".into()),
            };
        }
        if prompt.contains("executive summary") {
            return match self.0 {
                Behavior::SummaryFails => Err(CollaboratorError::Empty),
                _ => Ok("- bounded queues".into()),
            };
        }
        if prompt.contains("generate") {
            return Ok(r#"["bounded queues", "worker pools"]"#.into());
        }
        Err(CollaboratorError::Invalid("unexpected prompt".into()))
    }
}

#[derive(Default)]
struct MemorySink {
    stored: Mutex<Vec<ArtifactBundle>>,
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn store(&self, bundle: &ArtifactBundle) -> Result<String, CollaboratorError> {
        let mut stored = self.stored.lock().unwrap();
        stored.push(bundle.clone());
        Ok(format!("memory://{}", stored.len()))
    }
}

struct Harness {
    engine: Engine,
    pipeline: Arc<ResearchPipeline>,
    search: Arc<FakeSearch>,
    sink: Arc<MemorySink>,
}

fn harness(planner: Arc<dyn QueryPlanner>, behavior: Behavior, cfg: ResearchConfig) -> Harness {
    build(planner, Arc::new(FakeSearch::default()), behavior, cfg, 2)
}

fn build(
    planner: Arc<dyn QueryPlanner>,
    search: Arc<FakeSearch>,
    behavior: Behavior,
    cfg: ResearchConfig,
    max_concurrent: usize,
) -> Harness {
    let sink = Arc::new(MemorySink::default());
    let pipeline = Arc::new(
        ResearchPipeline::new(
            planner,
            search.clone(),
            Arc::new(FakeModel(behavior)),
            sink.clone(),
        )
        .with_config(cfg),
    );
    let handler: HandlerRef = pipeline.clone();
    let engine = Engine::new(
        EngineConfig {
            heartbeat_interval: Duration::ZERO,
            max_concurrent,
            ..EngineConfig::default()
        },
        handler,
    );
    Harness {
        engine,
        pipeline,
        search,
        sink,
    }
}

fn planner(queries: &[&str]) -> Arc<dyn QueryPlanner> {
    Arc::new(FixedPlanner(Ok(queries.iter().map(|q| q.to_string()).collect())))
}

async fn until(what: &str, cond: impl Fn() -> bool) {
    let res = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(res.is_ok(), "timed out waiting for {what}");
}

/// Publishes `topic` and waits for its pipeline to release its slot.
async fn run_topic(h: &Harness, topic: &str) {
    h.engine.start().unwrap();
    h.engine
        .publish(Event::text(EventKind::UserInputReceived, topic.to_string()))
        .await
        .unwrap();
    let res = tokio::time::timeout(Duration::from_secs(5), async {
        while h.engine.stats().released == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(res.is_ok(), "pipeline never finished: {:?}", h.engine.stats());
    h.engine.stop().await;
    assert_eq!(h.engine.stats().active, 0);
}

#[tokio::test]
async fn test_topic_flows_to_stored_report() {
    let h = harness(
        planner(&["bounded queues", "worker pools", "broken search"]),
        Behavior::Normal,
        ResearchConfig::default(),
    );
    run_topic(&h, "event engines").await;

    let stored = h.sink.stored.lock().unwrap();
    assert_eq!(stored.len(), 1);
    let bundle = &stored[0];
    assert_eq!(bundle.topic, "event engines");
    assert_eq!(bundle.report, "RESEARCH REPORT\n===============\nQueues bound memory.");
    assert_eq!(bundle.summary, "- bounded queues");

    let finding = &bundle.structured.key_findings[0];
    assert_eq!(finding.confidence, 1.0);
    assert_eq!(finding.evidence_urls, vec!["https://bounded-queues.example"]);

    let mut searched = h.search.queries.lock().unwrap().clone();
    searched.sort();
    assert_eq!(searched, vec!["bounded queues", "broken search", "worker pools"]);
    assert!(h.pipeline.sessions().is_empty());
}

#[tokio::test]
async fn test_planning_failure_searches_the_topic() {
    let h = harness(
        Arc::new(FixedPlanner(Err(CollaboratorError::Unavailable("down".into())))),
        Behavior::Normal,
        ResearchConfig::default(),
    );
    run_topic(&h, "actor systems").await;

    assert_eq!(*h.search.queries.lock().unwrap(), vec!["actor systems"]);
    assert_eq!(h.sink.stored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_model_planner_drives_fan_out() {
    let model: Arc<dyn LanguageModel> = Arc::new(FakeModel(Behavior::Normal));
    let h = harness(
        Arc::new(ModelQueryPlanner::new(model, 2)),
        Behavior::Normal,
        ResearchConfig::default(),
    );
    run_topic(&h, "event engines").await;

    assert_eq!(h.search.queries.lock().unwrap().len(), 2);
    assert_eq!(h.sink.stored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_refused_topic_still_completes() {
    let h = harness(planner(&["q"]), Behavior::Refuse, ResearchConfig::default());
    run_topic(&h, "something harmful").await;

    let stored = h.sink.stored.lock().unwrap();
    assert_eq!(
        stored[0].summary,
        "Unable to perform research for this topic: disallowed topic"
    );
    assert!(stored[0].report.starts_with("RESEARCH REPORT"));
}

#[tokio::test]
async fn test_unparseable_structure_falls_back_to_raw_sources() {
    let h = harness(planner(&["bounded queues"]), Behavior::Garbage, ResearchConfig::default());
    run_topic(&h, "event engines").await;

    let stored = h.sink.stored.lock().unwrap();
    let structured = &stored[0].structured;
    assert_eq!(structured.topic, "event engines");
    assert_eq!(
        structured.open_questions,
        vec!["Structured extraction failed; using raw sources."]
    );
    assert_eq!(structured.sources.len(), 1);
}

#[tokio::test]
async fn test_analysis_deadline_ends_pipeline_with_timeout() {
    let cfg = ResearchConfig {
        analysis_deadline: Duration::from_millis(50),
        ..ResearchConfig::default()
    };
    let h = harness(planner(&["bounded queues"]), Behavior::SlowStructuring, cfg);
    run_topic(&h, "event engines").await;

    assert!(h.sink.stored.lock().unwrap().is_empty());
    assert_eq!(h.engine.stats().released, 1);
}

#[tokio::test]
async fn test_report_failure_ends_pipeline_with_error() {
    let h = harness(planner(&["bounded queues"]), Behavior::ReportFails, ResearchConfig::default());
    run_topic(&h, "event engines").await;
    assert!(h.sink.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_failure_uses_placeholder() {
    let h = harness(planner(&["bounded queues"]), Behavior::SummaryFails, ResearchConfig::default());
    run_topic(&h, "event engines").await;
    assert_eq!(h.sink.stored.lock().unwrap()[0].summary, SUMMARY_UNAVAILABLE);
}

#[tokio::test]
async fn test_second_topic_rejected_while_first_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let h = build(
        Arc::new(EchoPlanner),
        Arc::new(FakeSearch::gated(Arc::clone(&gate))),
        Behavior::Normal,
        ResearchConfig::default(),
        1,
    );
    h.engine.start().unwrap();

    h.engine
        .publish(Event::text(EventKind::UserInputReceived, "first"))
        .await
        .unwrap();
    until("first search started", || h.search.queries.lock().unwrap().len() == 1).await;

    h.engine
        .publish(Event::text(EventKind::UserInputReceived, "second"))
        .await
        .unwrap();
    until("second rejected", || h.engine.stats().rejected == 1).await;
    assert_eq!(h.engine.stats().active, 1);

    gate.add_permits(1);
    until("first released", || h.engine.stats().released == 1).await;
    assert_eq!(h.engine.stats().active, 0);

    h.engine
        .publish(Event::text(EventKind::UserInputReceived, "third"))
        .await
        .unwrap();
    until("third released", || h.engine.stats().released == 2).await;
    h.engine.stop().await;

    let stats = h.engine.stats();
    assert_eq!(stats.admitted, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(*h.search.queries.lock().unwrap(), vec!["first", "third"]);
    assert_eq!(h.sink.stored.lock().unwrap().len(), 2);
}

/// Starts every admitted pipeline with a `kind` event that carries no payload.
struct MissingPayload {
    inner: Arc<ResearchPipeline>,
    kind: EventKind,
}

#[async_trait]
impl Handler for MissingPayload {
    async fn handle(&self, event: Event, publisher: Publisher) {
        if event.kind == EventKind::UserInputReceived {
            publisher.publish(Event::new(self.kind)).await.unwrap();
            return;
        }
        self.inner.handle(event, publisher).await;
    }
}

#[tokio::test]
async fn test_missing_payload_ends_pipeline_with_error() {
    for kind in [
        EventKind::SearchRequested,
        EventKind::SearchCompleted,
        EventKind::AnalysisRequested,
        EventKind::StructuredDataReady,
        EventKind::SummaryRequested,
    ] {
        let h = harness(planner(&["q"]), Behavior::Normal, ResearchConfig::default());
        let handler: HandlerRef = Arc::new(MissingPayload {
            inner: Arc::clone(&h.pipeline),
            kind,
        });
        let engine = Engine::new(
            EngineConfig {
                heartbeat_interval: Duration::ZERO,
                max_concurrent: 1,
                ..EngineConfig::default()
            },
            handler,
        );
        engine.start().unwrap();
        engine
            .publish(Event::text(EventKind::UserInputReceived, "topic"))
            .await
            .unwrap();
        until("pipeline released", || engine.stats().released == 1).await;
        engine.stop().await;

        let stats = engine.stats();
        assert_eq!(stats.active, 0, "{kind} without payload held its slot");
        assert_eq!(stats.dispatched, 3, "{kind}: input, empty stage event, error");
        assert!(h.sink.stored.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_input_without_topic_ends_pipeline_with_error() {
    let h = harness(planner(&["q"]), Behavior::Normal, ResearchConfig::default());
    h.engine.start().unwrap();
    h.engine
        .publish(Event::new(EventKind::UserInputReceived))
        .await
        .unwrap();
    until("pipeline released", || h.engine.stats().released == 1).await;
    h.engine.stop().await;

    assert_eq!(h.engine.stats().active, 0);
    assert!(h.search.queries.lock().unwrap().is_empty());
}
