//! # Heartbeat loop.
//!
//! Publishes a [`Tick`](crate::EventKind::Tick) every interval until the
//! engine's shutdown token fires. The first tick comes one interval after start.
//! A publish waiting on a full queue is abandoned when the token fires, so the
//! heartbeat never holds up shutdown.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::Publisher;
use crate::events::Event;

pub(crate) async fn run(interval: Duration, publisher: Publisher, token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tick = Event::tick();
        let seq = tick.seq;
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            res = publisher.publish(tick) => {
                if res.is_err() {
                    break;
                }
                trace!(seq, "tick");
            }
        }
    }
    debug!("heartbeat stopped");
}
