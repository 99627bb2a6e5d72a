use super::merchant::{IsvConfigContext, MchAppConfigContext, MerchantInfo, PayPassage};
use super::notify::{MchNotifyRecord, NotifyOrderType};
use super::order::{PayOrder, TerminalState};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Fields stamped by a terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalUpdate {
    pub state: TerminalState,
    pub channel_order_no: Option<String>,
    pub err_code: Option<String>,
    pub err_msg: Option<String>,
}

impl TerminalUpdate {
    /// Stamps the transition onto an order already known to be `ING`.
    /// Absent channel fields leave the stored values untouched.
    pub fn apply_to(self, order: &mut PayOrder, now: DateTime<Utc>) {
        order.state = self.state.into();
        if self.channel_order_no.is_some() {
            order.channel_order_no = self.channel_order_no;
        }
        if self.err_code.is_some() {
            order.err_code = self.err_code;
        }
        if self.err_msg.is_some() {
            order.err_msg = self.err_msg;
        }
        if self.state == TerminalState::Success {
            order.success_time = Some(now);
        }
        order.updated_at = now;
    }
}

/// Durable order storage.
///
/// The two `update_*` methods are compare-and-swap writes on the current
/// state: they return `false` without touching the record when the order is
/// not in the expected prior state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order, rejecting a second order with the same merchant order ref.
    async fn save(&self, order: PayOrder) -> Result<()>;
    async fn get(&self, pay_order_id: &str) -> Result<Option<PayOrder>>;
    async fn exists_mch_order(&self, mch_no: &str, mch_order_no: &str) -> Result<bool>;
    async fn update_init_to_ing(&self, pay_order_id: &str, if_code: &str, way_code: &str)
    -> Result<bool>;
    async fn update_ing_to_terminal(&self, pay_order_id: &str, update: TerminalUpdate)
    -> Result<bool>;
}

#[async_trait]
pub trait NotifyRecordStore: Send + Sync {
    async fn find_by_order(
        &self,
        order_id: &str,
        order_type: NotifyOrderType,
    ) -> Result<Option<MchNotifyRecord>>;

    async fn get(&self, notify_id: u64) -> Result<Option<MchNotifyRecord>>;

    /// Atomically creates the record unless one exists for the same order.
    /// Returns the assigned id, or `None` when the order already has a record.
    async fn insert_if_absent(&self, record: MchNotifyRecord) -> Result<Option<u64>>;
}

/// Merchant, app, platform and routing configuration.
#[async_trait]
pub trait ConfigLookup: Send + Sync {
    async fn mch_app_context(&self, mch_no: &str, app_id: &str)
    -> Result<Option<MchAppConfigContext>>;
    async fn isv_context(&self, isv_no: &str) -> Result<Option<IsvConfigContext>>;
    async fn merchant_info(&self, mch_no: &str) -> Result<Option<MerchantInfo>>;
    /// The enabled passage routing this app's pay way to a channel interface.
    async fn find_pay_passage(
        &self,
        mch_no: &str,
        app_id: &str,
        way_code: &str,
    ) -> Result<Option<PayPassage>>;
}

/// Fire-and-forget delayed delivery of a task payload.
#[async_trait]
pub trait DelayedTaskQueue: Send + Sync {
    async fn schedule(&self, payload: String, delay_ms: u64) -> Result<()>;
}

/// Hands a notification record to the delivery worker.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn enqueue(&self, notify_id: u64) -> Result<()>;
}

pub trait Signer: Send + Sync {
    fn sign(&self, params: &Map<String, Value>, secret: &str) -> Result<String>;
}

pub type OrderStoreRef = Arc<dyn OrderStore>;
pub type NotifyRecordStoreRef = Arc<dyn NotifyRecordStore>;
pub type ConfigLookupRef = Arc<dyn ConfigLookup>;
pub type DelayedTaskQueueRef = Arc<dyn DelayedTaskQueue>;
pub type DeliveryQueueRef = Arc<dyn DeliveryQueue>;
pub type SignerRef = Arc<dyn Signer>;

/// Every port the order services depend on, wired once by the caller.
#[derive(Clone)]
pub struct ServicePorts {
    pub orders: OrderStoreRef,
    pub notify_records: NotifyRecordStoreRef,
    pub config: ConfigLookupRef,
    pub signer: SignerRef,
    pub tasks: DelayedTaskQueueRef,
    pub delivery: DeliveryQueueRef,
}
