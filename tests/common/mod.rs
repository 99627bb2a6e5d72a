#![allow(dead_code)]

use std::fs::File;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unipay::application::orchestrator::PayOrderOrchestrator;
use unipay::config::{MerchantCatalog, Settings};
use unipay::domain::channel::ChannelRegistry;
use unipay::domain::ports::ServicePorts;
use unipay::infrastructure::in_memory::{
    InMemoryConfigLookup, InMemoryNotifyRecordStore, InMemoryOrderStore, RecordingDeliveryQueue,
    RecordingTaskQueue,
};
use unipay::infrastructure::signing::HmacSigner;

pub const ORDER_HEADER: [&str; 13] = [
    "mch_no",
    "app_id",
    "mch_order_no",
    "way_code",
    "amount",
    "currency",
    "subject",
    "body",
    "client_ip",
    "notify_url",
    "return_url",
    "channel_extra",
    "ext_param",
];

pub fn merchants_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/merchants.json")
}

/// A row for merchant `M1` / app `A1` with a notify URL set.
pub fn order_row(
    mch_order_no: &str,
    way_code: &str,
    amount: &str,
    channel_extra: &str,
) -> Vec<String> {
    [
        "M1",
        "A1",
        mch_order_no,
        way_code,
        amount,
        "cny",
        "tea",
        "green tea",
        "10.0.0.1",
        "https://shop.example/notify",
        "",
        channel_extra,
        "",
    ]
    .iter()
    .map(|field| field.to_string())
    .collect()
}

pub fn write_orders(path: &Path, rows: &[Vec<String>]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(ORDER_HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// `rows` instantly confirmed orders with distinct merchant order numbers.
pub fn generate_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(ORDER_HEADER)?;
    for i in 1..=rows {
        wtr.write_record(order_row(
            &format!("O{i}"),
            "QR_CODE",
            "1.00",
            "CONFIRM_SUCCESS",
        ))?;
    }

    wtr.flush()?;
    Ok(())
}

/// An orchestrator over in-memory stores, with the recording queues kept
/// so tests can inspect what was scheduled and delivered.
pub struct Harness {
    pub orchestrator: PayOrderOrchestrator,
    pub orders: InMemoryOrderStore,
    pub notify_records: InMemoryNotifyRecordStore,
    pub tasks: RecordingTaskQueue,
    pub delivery: RecordingDeliveryQueue,
}

pub fn harness(registry: ChannelRegistry) -> Harness {
    let catalog = MerchantCatalog::load(merchants_fixture()).unwrap();
    let orders = InMemoryOrderStore::new();
    let notify_records = InMemoryNotifyRecordStore::new();
    let tasks = RecordingTaskQueue::new();
    let delivery = RecordingDeliveryQueue::new();

    let ports = ServicePorts {
        orders: Arc::new(orders.clone()),
        notify_records: Arc::new(notify_records.clone()),
        config: Arc::new(InMemoryConfigLookup::from_catalog(catalog)),
        signer: Arc::new(HmacSigner),
        tasks: Arc::new(tasks.clone()),
        delivery: Arc::new(delivery.clone()),
    };

    Harness {
        orchestrator: PayOrderOrchestrator::new(ports, registry, Settings::default()),
        orders,
        notify_records,
        tasks,
        delivery,
    }
}
