use crate::domain::notify::{MchNotifyRecord, NotifyOrderType};
use crate::domain::order::{OrderState, PayOrder};
use crate::domain::ports::{NotifyRecordStore, OrderStore, TerminalUpdate};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for pay orders, keyed by pay order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family mapping `(mch_no, mch_order_no)` to the pay order id.
pub const CF_MCH_ORDER_INDEX: &str = "mch_order_index";
/// Column Family for notification records, keyed by big-endian notify id.
pub const CF_NOTIFY_RECORDS: &str = "notify_records";
/// Column Family mapping `(order_type, order_id)` to the notify id.
pub const CF_NOTIFY_ORDER_INDEX: &str = "notify_order_index";

const NOTIFY_SEQUENCE_KEY: &[u8] = b"notify_sequence";

/// A persistent store for orders and notification records using RocksDB.
///
/// Every write path reads, checks and writes while holding `write_lock`, and
/// multi-key writes are committed as one `WriteBatch`. Conditional updates
/// are therefore atomic as long as a single `RocksDBStore` (and its clones)
/// owns the database.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_ORDERS,
            CF_MCH_ORDER_INDEX,
            CF_NOTIFY_RECORDS,
            CF_NOTIFY_ORDER_INDEX,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::internal(format!("{name} column family not found")))
    }

    fn read_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        self.db.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn next_notify_id(&self) -> Result<u64> {
        let last = match self.db.get_pinned(NOTIFY_SEQUENCE_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| PaymentError::internal("corrupt notify sequence"))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        Ok(last + 1)
    }
}

fn mch_order_key(mch_no: &str, mch_order_no: &str) -> Vec<u8> {
    format!("{mch_no}\u{1f}{mch_order_no}").into_bytes()
}

fn notify_order_key(order_type: NotifyOrderType, order_id: &str) -> Vec<u8> {
    let prefix = match order_type {
        NotifyOrderType::PayOrder => "PAY",
        NotifyOrderType::RefundOrder => "REFUND",
    };
    format!("{prefix}\u{1f}{order_id}").into_bytes()
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn save(&self, order: PayOrder) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let orders = self.cf(CF_ORDERS)?;
        let index = self.cf(CF_MCH_ORDER_INDEX)?;

        let mch_key = mch_order_key(&order.mch_no, &order.mch_order_no);
        if self.db.get_pinned_cf(index, &mch_key)?.is_some() {
            return Err(PaymentError::DuplicateOrder {
                mch_no: order.mch_no,
                mch_order_no: order.mch_order_no,
            });
        }
        if self.db.get_pinned_cf(orders, order.pay_order_id.as_bytes())?.is_some() {
            return Err(PaymentError::internal(format!(
                "pay order id {} already exists",
                order.pay_order_id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(orders, order.pay_order_id.as_bytes(), serde_json::to_vec(&order)?);
        batch.put_cf(index, &mch_key, order.pay_order_id.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, pay_order_id: &str) -> Result<Option<PayOrder>> {
        self.read_json(CF_ORDERS, pay_order_id.as_bytes())
    }

    async fn exists_mch_order(&self, mch_no: &str, mch_order_no: &str) -> Result<bool> {
        let index = self.cf(CF_MCH_ORDER_INDEX)?;
        Ok(self
            .db
            .get_pinned_cf(index, mch_order_key(mch_no, mch_order_no))?
            .is_some())
    }

    async fn update_init_to_ing(
        &self,
        pay_order_id: &str,
        if_code: &str,
        way_code: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut order) = self.read_json::<PayOrder>(CF_ORDERS, pay_order_id.as_bytes())? else {
            return Ok(false);
        };
        if order.state != OrderState::Init {
            return Ok(false);
        }

        order.state = OrderState::Ing;
        order.if_code = Some(if_code.to_string());
        order.way_code = way_code.to_string();
        order.updated_at = Utc::now();
        self.write_json(CF_ORDERS, pay_order_id.as_bytes(), &order)?;
        Ok(true)
    }

    async fn update_ing_to_terminal(
        &self,
        pay_order_id: &str,
        update: TerminalUpdate,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut order) = self.read_json::<PayOrder>(CF_ORDERS, pay_order_id.as_bytes())? else {
            return Ok(false);
        };
        if order.state != OrderState::Ing {
            return Ok(false);
        }

        update.apply_to(&mut order, Utc::now());
        self.write_json(CF_ORDERS, pay_order_id.as_bytes(), &order)?;
        Ok(true)
    }
}

#[async_trait]
impl NotifyRecordStore for RocksDBStore {
    async fn find_by_order(
        &self,
        order_id: &str,
        order_type: NotifyOrderType,
    ) -> Result<Option<MchNotifyRecord>> {
        let index = self.cf(CF_NOTIFY_ORDER_INDEX)?;
        match self
            .db
            .get_pinned_cf(index, notify_order_key(order_type, order_id))?
        {
            Some(id) => self.read_json(CF_NOTIFY_RECORDS, &id),
            None => Ok(None),
        }
    }

    async fn get(&self, notify_id: u64) -> Result<Option<MchNotifyRecord>> {
        self.read_json(CF_NOTIFY_RECORDS, &notify_id.to_be_bytes())
    }

    async fn insert_if_absent(&self, mut record: MchNotifyRecord) -> Result<Option<u64>> {
        let _guard = self.write_lock.lock().await;
        let records = self.cf(CF_NOTIFY_RECORDS)?;
        let index = self.cf(CF_NOTIFY_ORDER_INDEX)?;

        let index_key = notify_order_key(record.order_type, &record.order_id);
        if self.db.get_pinned_cf(index, &index_key)?.is_some() {
            return Ok(None);
        }

        let notify_id = self.next_notify_id()?;
        record.notify_id = notify_id;
        let id_bytes = notify_id.to_be_bytes();

        let mut batch = WriteBatch::default();
        batch.put_cf(records, id_bytes, serde_json::to_vec(&record)?);
        batch.put_cf(index, &index_key, id_bytes);
        batch.put(NOTIFY_SEQUENCE_KEY, id_bytes);
        self.db.write(batch)?;
        Ok(Some(notify_id))
    }
}
