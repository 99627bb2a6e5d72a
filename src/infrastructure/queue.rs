use crate::domain::ports::{DelayedTaskQueue, DeliveryQueue};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Delayed task queue backed by tokio timers.
///
/// Each scheduled payload is delivered to the receiver returned by `new`
/// once its delay has elapsed. Payloads still waiting when the runtime shuts
/// down are lost.
#[derive(Clone)]
pub struct TokioDelayQueue {
    sender: mpsc::UnboundedSender<String>,
}

impl TokioDelayQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DelayedTaskQueue for TokioDelayQueue {
    async fn schedule(&self, payload: String, delay_ms: u64) -> Result<()> {
        if self.sender.is_closed() {
            return Err(PaymentError::internal("delayed task consumer has shut down"));
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if sender.send(payload).is_err() {
                warn!("delayed task dropped, consumer has shut down");
            }
        });
        Ok(())
    }
}

/// Delivery queue handing notification ids to an in-process worker.
#[derive(Clone)]
pub struct ChannelDeliveryQueue {
    sender: mpsc::UnboundedSender<u64>,
}

impl ChannelDeliveryQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeliveryQueue for ChannelDeliveryQueue {
    async fn enqueue(&self, notify_id: u64) -> Result<()> {
        self.sender
            .send(notify_id)
            .map_err(|_| PaymentError::internal("notification delivery worker has shut down"))
    }
}
