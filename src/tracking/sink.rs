//! Tracking sink — buffers analytics events and delivers them in batches.
//!
//! Delivery is best-effort. A failed batch is logged and dropped; nothing
//! here can fail or stall the dialogue.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::event::TrackingEvent;
use crate::error::TrackingError;

/// Accepts analytics events from the engine.
#[async_trait]
pub trait TrackingSink: Send + Sync {
    /// Queue an event. Never blocks on delivery.
    fn record(&self, event: TrackingEvent);

    /// Force delivery of everything queued so far. Errors are swallowed.
    async fn flush(&self);
}

/// Delivers a batch of events somewhere.
#[async_trait]
pub trait TrackingTransport: Send + Sync {
    async fn send(&self, batch: &[TrackingEvent]) -> Result<(), TrackingError>;
}

/// Discards every event.
pub struct NoopTracker;

#[async_trait]
impl TrackingSink for NoopTracker {
    fn record(&self, event: TrackingEvent) {
        debug!(event = event.name(), session_id = %event.session_id, "Tracking disabled, event dropped");
    }

    async fn flush(&self) {}
}

/// In-memory buffer in front of a [`TrackingTransport`].
///
/// A full buffer is shipped on a background task; `flush` ships whatever is
/// left and waits for that delivery attempt.
pub struct BufferedTracker {
    buffer: Mutex<Vec<TrackingEvent>>,
    batch_size: usize,
    transport: Arc<dyn TrackingTransport>,
}

impl BufferedTracker {
    pub fn new(transport: Arc<dyn TrackingTransport>, batch_size: usize) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            batch_size: batch_size.max(1),
            transport,
        }
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackingEvent>> {
        // A poisoned buffer still holds valid events.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_all(&self) -> Vec<TrackingEvent> {
        std::mem::take(&mut *self.lock())
    }
}

async fn deliver(transport: Arc<dyn TrackingTransport>, batch: Vec<TrackingEvent>) {
    if batch.is_empty() {
        return;
    }
    match transport.send(&batch).await {
        Ok(()) => debug!(events = batch.len(), "Tracking batch delivered"),
        Err(e) => warn!(events = batch.len(), error = %e, "Tracking batch dropped"),
    }
}

#[async_trait]
impl TrackingSink for BufferedTracker {
    fn record(&self, event: TrackingEvent) {
        let batch = {
            let mut buffer = self.lock();
            buffer.push(event);
            if buffer.len() < self.batch_size {
                return;
            }
            std::mem::take(&mut *buffer)
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(deliver(Arc::clone(&self.transport), batch));
            }
            Err(_) => {
                // No runtime to deliver on; keep the events for the next flush.
                let mut buffer = self.lock();
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
            }
        }
    }

    async fn flush(&self) {
        let batch = self.take_all();
        deliver(Arc::clone(&self.transport), batch).await;
    }
}
