//! Fan-out/fan-in through the engine: many workers record results for one
//! session, exactly one of them advances the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use eventvisor::{
    Begin, Engine, EngineConfig, Event, EventKind, HandlerFn, Publisher, RecordOutcome, SessionId,
    SessionRegistry, SubResult,
};

#[derive(Clone)]
struct Part {
    session: SessionId,
    index: usize,
}

#[tokio::test]
async fn test_fan_in_fires_exactly_once_across_workers() {
    const FAN_OUT: usize = 16;
    const TOPICS: usize = 4;

    let registry: Arc<SessionRegistry<usize>> = SessionRegistry::shared();
    let winners = Arc::new(AtomicUsize::new(0));

    let reg = Arc::clone(&registry);
    let wins = Arc::clone(&winners);
    let handler = HandlerFn::arc("fan", move |ev: Event, p: Publisher| {
        let reg = Arc::clone(&reg);
        let wins = Arc::clone(&wins);
        async move {
            match ev.kind {
                EventKind::UserInputReceived => {
                    let topic = ev.as_text().unwrap_or_default().to_string();
                    let Ok(Begin::Pending(id)) = reg.begin(SessionId::new(), topic, FAN_OUT) else {
                        return;
                    };
                    for index in 0..FAN_OUT {
                        let part = Part { session: id, index };
                        let _ = p.publish(Event::data(EventKind::SearchRequested, part)).await;
                    }
                }
                EventKind::SearchRequested => {
                    if let Some(part) = ev.data_ref::<Part>() {
                        tokio::task::yield_now().await;
                        let _ = p
                            .publish(Event::data(EventKind::SearchCompleted, part.clone()))
                            .await;
                    }
                }
                EventKind::SearchCompleted => {
                    let Some(part) = ev.data_ref::<Part>() else { return };
                    let result = if part.index % 5 == 0 {
                        SubResult::Failed("no results".into())
                    } else {
                        SubResult::Ok(part.index)
                    };
                    if let RecordOutcome::Complete(done) = reg.record(&part.session, result) {
                        assert_eq!(done.results.len(), FAN_OUT);
                        wins.fetch_add(1, Ordering::SeqCst);
                        let _ = p.publish(Event::new(EventKind::SummaryComplete)).await;
                    }
                }
                _ => {}
            }
        }
    });

    let cfg = EngineConfig {
        worker_count: 5,
        queue_capacity: 256,
        max_concurrent: TOPICS,
        heartbeat_interval: Duration::ZERO,
        ..EngineConfig::default()
    };
    let engine = Engine::new(cfg, handler);
    engine.start().unwrap();

    for t in 0..TOPICS {
        engine
            .publish(Event::text(EventKind::UserInputReceived, format!("topic {t}")))
            .await
            .unwrap();
    }

    let res = tokio::time::timeout(Duration::from_secs(5), async {
        while engine.stats().released < TOPICS as u64 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(res.is_ok(), "pipelines did not finish: {:?}", engine.stats());
    engine.stop().await;

    assert_eq!(winners.load(Ordering::SeqCst), TOPICS);
    assert!(registry.is_empty());
    assert_eq!(engine.stats().active, 0);
}

#[tokio::test]
async fn test_racing_tasks_produce_one_winner() {
    const N: usize = 64;
    let registry: Arc<SessionRegistry<usize>> = SessionRegistry::shared();
    let Begin::Pending(id) = registry.begin(SessionId::new(), "race", N).unwrap() else {
        panic!("session should wait for results");
    };

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                matches!(registry.record(&id, SubResult::Ok(i)), RecordOutcome::Complete(_))
            })
        })
        .collect();

    let mut winners = 0;
    for h in handles {
        if h.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(registry.lookup(&id).is_none());
}
