use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::config::RelayConfig;
use crate::error::{PublishError, StoreError};
use crate::outbox::{OutboxEvent, OutboxRepo};

/// Background worker draining the outbox to the event bus.
///
/// Single logical poller: one relay instance per outbox. Events are retried
/// with capped exponential backoff inside a tick; exhausted events keep their
/// row with `attempts` bumped and are picked up again next tick.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxRepo>,
    bus: Arc<dyn EventBus>,
    config: RelayConfig,
}

impl OutboxRelay {
    pub fn new(outbox: Arc<dyn OutboxRepo>, bus: Arc<dyn EventBus>, config: RelayConfig) -> Self {
        Self {
            outbox,
            bus,
            config,
        }
    }

    /// Spawn the polling loop as a cancellable task.
    pub fn spawn(self) -> RelayHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let grace = self.config.shutdown_grace;
        let task = tokio::spawn(self.run(shutdown_rx));
        RelayHandle {
            shutdown: shutdown_tx,
            task,
            grace,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            match self.tick().await {
                Ok(published) if published > 0 => {
                    tracing::info!(published, "published outbox events");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "outbox relay tick failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => {
                    tracing::info!("outbox relay stopping");
                    return;
                }
            }
        }
    }

    /// Drain one batch. Returns the number of events published.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let batch = self.outbox.get_unpublished(self.config.batch_size).await?;
        let mut published = 0;

        for event in &batch {
            match self.publish_with_retry(event).await {
                Ok(()) => {
                    // Publish confirmed before the row is marked; a crash in
                    // between re-delivers, which at-least-once allows.
                    self.outbox.mark_published(event.id).await?;
                    published += 1;
                }
                Err(err) => {
                    self.outbox
                        .increment_attempts(event.id, &err.to_string())
                        .await?;
                    tracing::warn!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %err,
                        "failed to publish outbox event"
                    );
                }
            }
        }

        let stuck = self.failed_event_count().await?;
        if stuck > 0 {
            tracing::warn!(stuck, "outbox events past the delivery threshold");
        }

        Ok(published)
    }

    /// Events stuck at or past the configured attempt threshold.
    pub async fn failed_event_count(&self) -> Result<usize, StoreError> {
        Ok(self
            .outbox
            .get_failed(self.config.failed_threshold)
            .await?
            .len())
    }

    async fn publish_with_retry(&self, event: &OutboxEvent) -> Result<(), PublishError> {
        let mut backoff = self.config.retry_backoff_min;
        let mut last_error = PublishError::Connection("no publish attempt made".to_string());

        for attempt in 1..=self.config.publish_attempts {
            match self
                .bus
                .publish(&event.event_type, &event.payload, &routing_key(event))
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    last_error = err;
                    if attempt < self.config.publish_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, self.config.retry_backoff_max);
                    }
                }
            }
        }

        Err(last_error)
    }
}

fn routing_key(event: &OutboxEvent) -> String {
    format!(
        "{}.{}",
        event.aggregate_type.to_ascii_lowercase(),
        event.aggregate_id
    )
}

/// Handle for stopping a spawned relay. Shutdown lets the in-flight tick
/// finish, bounded by the configured grace period.
pub struct RelayHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    grace: std::time::Duration,
}

impl RelayHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if tokio::time::timeout(self.grace, &mut self.task)
            .await
            .is_err()
        {
            tracing::warn!("outbox relay did not stop within grace period, aborting");
            self.task.abort();
        }
    }
}
