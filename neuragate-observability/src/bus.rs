//! The bus seam (§4.11): delivery to Kafka is feature-gated; a
//! non-feature build logs at debug level through the same code path,
//! so the crate always compiles and runs without a broker.

use async_trait::async_trait;

#[async_trait]
pub trait BusSink: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), String>;
}

/// Standalone/no-bus default: logs every publish at debug level.
pub struct LoggingSink;

#[async_trait]
impl BusSink for LoggingSink {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), String> {
        tracing::debug!(
            topic,
            key,
            bytes = payload.len(),
            "telemetry event (no-bus mode)"
        );
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub struct KafkaSink {
    producer: rdkafka::producer::FutureProducer,
}

#[cfg(feature = "kafka")]
impl KafkaSink {
    pub fn new(producer: rdkafka::producer::FutureProducer) -> Self {
        Self { producer }
    }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl BusSink for KafkaSink {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), String> {
        use rdkafka::producer::FutureRecord;
        let record = FutureRecord::to(topic).key(key).payload(&payload);
        self.producer
            .send(record, std::time::Duration::from_secs(5))
            .await
            .map(|_| ())
            .map_err(|(e, _)| e.to_string())
    }
}
