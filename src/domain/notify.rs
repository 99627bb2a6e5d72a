use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyOrderType {
    PayOrder,
    RefundOrder,
}

/// Delivery progress of a merchant callback series.
///
/// Only `Ing` is written here; the delivery worker owns the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyState {
    Ing,
    Success,
    Fail,
}

/// One outbound merchant-callback series. At most one exists per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MchNotifyRecord {
    /// Assigned by the store on insert.
    pub notify_id: u64,
    pub order_id: String,
    pub order_type: NotifyOrderType,
    pub mch_no: String,
    pub isv_no: Option<String>,
    pub app_id: String,
    pub mch_order_no: String,
    /// Fully signed callback URL.
    pub notify_url: String,
    /// Body of the merchant's last answer.
    pub res_result: String,
    pub notify_count: u32,
    pub state: NotifyState,
    pub last_notify_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
