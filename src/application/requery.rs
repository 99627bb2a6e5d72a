use crate::domain::ports::DelayedTaskQueueRef;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const DEFAULT_REQUERY_DELAY_MS: u64 = 5_000;

/// Payload of a delayed upstream re-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOrderQueryTask {
    pub pay_order_id: String,
    /// Attempt number, starting at 1.
    pub count: u32,
}

impl ChannelOrderQueryTask {
    pub fn first(pay_order_id: impl Into<String>) -> Self {
        Self {
            pay_order_id: pay_order_id.into(),
            count: 1,
        }
    }

    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Schedules re-checks of orders the channel left undecided.
#[derive(Clone)]
pub struct RequeryScheduler {
    queue: DelayedTaskQueueRef,
    initial_delay_ms: u64,
}

impl RequeryScheduler {
    pub fn new(queue: DelayedTaskQueueRef, initial_delay_ms: u64) -> Self {
        Self {
            queue,
            initial_delay_ms,
        }
    }

    /// Enqueues the first re-query. Failures are logged, never returned.
    pub async fn schedule(&self, pay_order_id: &str) -> bool {
        let task = ChannelOrderQueryTask::first(pay_order_id);
        let scheduled = match task.to_payload() {
            Ok(payload) => self.queue.schedule(payload, self.initial_delay_ms).await,
            Err(e) => Err(e),
        };

        match scheduled {
            Ok(()) => {
                debug!(pay_order_id, delay_ms = self.initial_delay_ms, "re-query scheduled");
                true
            }
            Err(e) => {
                error!(pay_order_id, error = %e, "failed to schedule re-query");
                false
            }
        }
    }
}
