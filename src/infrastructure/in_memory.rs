use crate::config::MerchantCatalog;
use crate::domain::merchant::{
    IsvConfigContext, MchAppConfigContext, MerchantApp, MerchantInfo, PayPassage,
};
use crate::domain::notify::{MchNotifyRecord, NotifyOrderType};
use crate::domain::order::{OrderState, PayOrder};
use crate::domain::ports::{
    ConfigLookup, DelayedTaskQueue, DeliveryQueue, NotifyRecordStore, OrderStore, TerminalUpdate,
};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct OrderTables {
    orders: HashMap<String, PayOrder>,
    mch_orders: HashSet<(String, String)>,
}

/// A thread-safe in-memory order store.
///
/// Both conditional updates check and write under a single write guard, so
/// concurrent callers racing on one order see exactly one winner.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<OrderTables>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored order, oldest first.
    pub async fn get_all(&self) -> Vec<PayOrder> {
        let tables = self.tables.read().await;
        let mut orders: Vec<PayOrder> = tables.orders.values().cloned().collect();
        orders.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pay_order_id.cmp(&b.pay_order_id))
        });
        orders
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: PayOrder) -> Result<()> {
        let mut tables = self.tables.write().await;
        let mch_key = (order.mch_no.clone(), order.mch_order_no.clone());
        if tables.mch_orders.contains(&mch_key) {
            return Err(PaymentError::DuplicateOrder {
                mch_no: order.mch_no,
                mch_order_no: order.mch_order_no,
            });
        }
        if tables.orders.contains_key(&order.pay_order_id) {
            return Err(PaymentError::internal(format!(
                "pay order id {} already exists",
                order.pay_order_id
            )));
        }

        tables.mch_orders.insert(mch_key);
        tables.orders.insert(order.pay_order_id.clone(), order);
        Ok(())
    }

    async fn get(&self, pay_order_id: &str) -> Result<Option<PayOrder>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(pay_order_id).cloned())
    }

    async fn exists_mch_order(&self, mch_no: &str, mch_order_no: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .mch_orders
            .contains(&(mch_no.to_string(), mch_order_no.to_string())))
    }

    async fn update_init_to_ing(
        &self,
        pay_order_id: &str,
        if_code: &str,
        way_code: &str,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(pay_order_id) else {
            return Ok(false);
        };
        if order.state != OrderState::Init {
            return Ok(false);
        }

        order.state = OrderState::Ing;
        order.if_code = Some(if_code.to_string());
        order.way_code = way_code.to_string();
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_ing_to_terminal(
        &self,
        pay_order_id: &str,
        update: TerminalUpdate,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables.orders.get_mut(pay_order_id) else {
            return Ok(false);
        };
        if order.state != OrderState::Ing {
            return Ok(false);
        }

        update.apply_to(order, Utc::now());
        Ok(true)
    }
}

#[derive(Default)]
struct NotifyTables {
    records: HashMap<u64, MchNotifyRecord>,
    by_order: HashMap<(String, NotifyOrderType), u64>,
    last_id: u64,
}

/// In-memory notification records with a unique index on the order.
#[derive(Default, Clone)]
pub struct InMemoryNotifyRecordStore {
    tables: Arc<RwLock<NotifyTables>>,
}

impl InMemoryNotifyRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotifyRecordStore for InMemoryNotifyRecordStore {
    async fn find_by_order(
        &self,
        order_id: &str,
        order_type: NotifyOrderType,
    ) -> Result<Option<MchNotifyRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_order
            .get(&(order_id.to_string(), order_type))
            .and_then(|id| tables.records.get(id))
            .cloned())
    }

    async fn get(&self, notify_id: u64) -> Result<Option<MchNotifyRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.records.get(&notify_id).cloned())
    }

    async fn insert_if_absent(&self, mut record: MchNotifyRecord) -> Result<Option<u64>> {
        let mut tables = self.tables.write().await;
        let key = (record.order_id.clone(), record.order_type);
        if tables.by_order.contains_key(&key) {
            return Ok(None);
        }

        tables.last_id += 1;
        let notify_id = tables.last_id;
        record.notify_id = notify_id;
        tables.by_order.insert(key, notify_id);
        tables.records.insert(notify_id, record);
        Ok(Some(notify_id))
    }
}

/// Merchant configuration held in memory, loaded once at startup.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigLookup {
    merchants: HashMap<String, MerchantInfo>,
    apps: HashMap<String, MerchantApp>,
    isvs: HashMap<String, IsvConfigContext>,
    passages: HashMap<(String, String, String), PayPassage>,
}

impl InMemoryConfigLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: MerchantCatalog) -> Self {
        let mut lookup = Self::new();
        for isv in catalog.isvs {
            lookup.add_isv(isv);
        }
        for merchant in catalog.merchants {
            lookup.add_merchant(merchant);
        }
        for app in catalog.apps {
            lookup.add_app(app);
        }
        for passage in catalog.passages {
            lookup.add_passage(passage);
        }
        lookup
    }

    pub fn add_merchant(&mut self, merchant: MerchantInfo) -> &mut Self {
        self.merchants.insert(merchant.mch_no.clone(), merchant);
        self
    }

    pub fn add_app(&mut self, app: MerchantApp) -> &mut Self {
        self.apps.insert(app.app_id.clone(), app);
        self
    }

    pub fn add_isv(&mut self, isv: IsvConfigContext) -> &mut Self {
        self.isvs.insert(isv.isv_no.clone(), isv);
        self
    }

    pub fn add_passage(&mut self, passage: PayPassage) -> &mut Self {
        let key = (
            passage.mch_no.clone(),
            passage.app_id.clone(),
            passage.way_code.clone(),
        );
        self.passages.insert(key, passage);
        self
    }
}

#[async_trait]
impl ConfigLookup for InMemoryConfigLookup {
    async fn mch_app_context(
        &self,
        mch_no: &str,
        app_id: &str,
    ) -> Result<Option<MchAppConfigContext>> {
        let Some(merchant) = self.merchants.get(mch_no) else {
            return Ok(None);
        };
        Ok(self
            .apps
            .get(app_id)
            .filter(|app| app.mch_no == mch_no)
            .map(|app| MchAppConfigContext::new(merchant.clone(), app.clone())))
    }

    async fn isv_context(&self, isv_no: &str) -> Result<Option<IsvConfigContext>> {
        Ok(self.isvs.get(isv_no).cloned())
    }

    async fn merchant_info(&self, mch_no: &str) -> Result<Option<MerchantInfo>> {
        Ok(self.merchants.get(mch_no).cloned())
    }

    async fn find_pay_passage(
        &self,
        mch_no: &str,
        app_id: &str,
        way_code: &str,
    ) -> Result<Option<PayPassage>> {
        let key = (mch_no.to_string(), app_id.to_string(), way_code.to_string());
        Ok(self.passages.get(&key).cloned())
    }
}

/// A delayed task captured by `RecordingTaskQueue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub payload: String,
    pub delay_ms: u64,
}

/// Delayed task queue that keeps every scheduled task for later inspection.
#[derive(Default, Clone)]
pub struct RecordingTaskQueue {
    tasks: Arc<Mutex<Vec<ScheduledTask>>>,
}

impl RecordingTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn scheduled(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().await.clone()
    }
}

#[async_trait]
impl DelayedTaskQueue for RecordingTaskQueue {
    async fn schedule(&self, payload: String, delay_ms: u64) -> Result<()> {
        self.tasks.lock().await.push(ScheduledTask { payload, delay_ms });
        Ok(())
    }
}

/// Delivery queue that keeps every enqueued notification id.
#[derive(Default, Clone)]
pub struct RecordingDeliveryQueue {
    ids: Arc<Mutex<Vec<u64>>>,
}

impl RecordingDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueued(&self) -> Vec<u64> {
        self.ids.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryQueue for RecordingDeliveryQueue {
    async fn enqueue(&self, notify_id: u64) -> Result<()> {
        self.ids.lock().await.push(notify_id);
        Ok(())
    }
}
