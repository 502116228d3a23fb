//! Telemetry Publisher (C11): a bounded in-process queue drained by a
//! background worker that fans events out to three topics. Producers
//! never block; a full queue drops the event and bumps a counter.

use crate::bus::BusSink;
use crate::telemetry::{RouteChangeEvent, RouteChangeOp, TelemetryEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct TopicNames {
    pub telemetry: String,
    pub errors: String,
    pub routes: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            telemetry: "gateway-telemetry".into(),
            errors: "gateway-errors".into(),
            routes: "gateway-routes".into(),
        }
    }
}

enum QueuedEvent {
    Telemetry(TelemetryEvent),
    RouteChange(RouteChangeEvent),
}

pub struct TelemetryPublisher {
    tx: mpsc::Sender<QueuedEvent>,
    dropped: Arc<AtomicU64>,
}

impl TelemetryPublisher {
    pub fn start(sink: Arc<dyn BusSink>, queue_capacity: usize, topics: TopicNames) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        tokio::spawn(Self::run(sink, rx, topics));
        Self { tx, dropped }
    }

    /// Non-blocking; drops and counts on a full queue.
    pub fn submit_telemetry(&self, event: TelemetryEvent) {
        if self.tx.try_send(QueuedEvent::Telemetry(event)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("telemetry queue full, dropping event");
        }
    }

    /// Emitted whenever C1 reports a route-changed event.
    pub fn submit_route_change(&self, route_id: impl Into<String>, operation: RouteChangeOp) {
        let event = RouteChangeEvent {
            route_id: route_id.into(),
            operation,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        if self.tx.try_send(QueuedEvent::RouteChange(event)).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("telemetry queue full, dropping route-change event");
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn run(sink: Arc<dyn BusSink>, mut rx: mpsc::Receiver<QueuedEvent>, topics: TopicNames) {
        while let Some(event) = rx.recv().await {
            match event {
                QueuedEvent::Telemetry(e) => {
                    let key = e.route_id.clone();
                    let is_error = e.is_error();
                    if let Ok(payload) = serde_json::to_vec(&e) {
                        deliver_with_backoff(sink.as_ref(), &topics.telemetry, &key, payload.clone()).await;
                        if is_error {
                            deliver_with_backoff(sink.as_ref(), &topics.errors, &key, payload).await;
                        }
                    }
                }
                QueuedEvent::RouteChange(e) => {
                    let key = e.route_id.clone();
                    if let Ok(payload) = serde_json::to_vec(&e) {
                        deliver_with_backoff(sink.as_ref(), &topics.routes, &key, payload).await;
                    }
                }
            }
        }
    }
}

/// At-least-once delivery: retries with exponential backoff while the
/// worker keeps accepting (and drop-if-full) new submissions in the
/// meantime, since this loop only blocks the single consumer task.
async fn deliver_with_backoff(sink: &dyn BusSink, topic: &str, key: &str, payload: Vec<u8>) {
    let mut attempt = 0u32;
    let mut delay = Duration::from_millis(200);
    loop {
        match sink.send(topic, key, payload.clone()).await {
            Ok(()) => return,
            Err(e) => {
                attempt += 1;
                if attempt >= 5 {
                    tracing::error!(topic, error = %e, "giving up on telemetry delivery after 5 attempts");
                    return;
                }
                tracing::warn!(topic, error = %e, attempt, "bus unavailable, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}
