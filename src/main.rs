use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use unipay::application::orchestrator::PayOrderOrchestrator;
use unipay::application::requery::DEFAULT_REQUERY_DELAY_MS;
use unipay::config::{
    DEFAULT_ORDER_EXPIRY_MINUTES, DEFAULT_PAY_SITE_URL, MerchantCatalog, Settings,
};
use unipay::domain::channel::{ChannelRegistry, PaymentChannelRef};
use unipay::domain::ports::{NotifyRecordStoreRef, OrderStoreRef, ServicePorts};
use unipay::domain::request::UnifiedOrderCommand;
use unipay::infrastructure::in_memory::{
    InMemoryConfigLookup, InMemoryNotifyRecordStore, InMemoryOrderStore,
};
use unipay::infrastructure::queue::{ChannelDeliveryQueue, TokioDelayQueue};
use unipay::infrastructure::sandbox::SandboxChannel;
use unipay::infrastructure::signing::HmacSigner;
use unipay::interfaces::csv::order_reader::OrderRequestReader;
use unipay::interfaces::csv::response_writer::{ResponseRow, ResponseWriter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input unified-order requests CSV file
    input: PathBuf,

    /// Merchant catalog (merchants, apps, ISVs and pay passages) as JSON
    #[arg(long, env = "UNIPAY_MERCHANTS")]
    merchants: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "UNIPAY_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Public base URL of the payment site, used in cashier links
    #[arg(long, env = "UNIPAY_PAY_SITE_URL", default_value = DEFAULT_PAY_SITE_URL)]
    pay_site_url: String,

    /// Delay before the first re-query of an undecided order
    #[arg(long, env = "UNIPAY_REQUERY_DELAY_MS", default_value_t = DEFAULT_REQUERY_DELAY_MS)]
    requery_delay_ms: u64,

    /// Minutes until a new order expires
    #[arg(
        long,
        env = "UNIPAY_ORDER_EXPIRY_MINUTES",
        default_value_t = DEFAULT_ORDER_EXPIRY_MINUTES,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    order_expiry_minutes: i64,
}

fn in_memory_stores() -> (OrderStoreRef, NotifyRecordStoreRef) {
    (
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryNotifyRecordStore::new()),
    )
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<PathBuf>) -> Result<(OrderStoreRef, NotifyRecordStoreRef)> {
    use unipay::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(&path).into_diagnostic()?;
            info!(path = %path.display(), "using RocksDB storage");
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<PathBuf>) -> Result<(OrderStoreRef, NotifyRecordStoreRef)> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    let catalog = MerchantCatalog::load(&cli.merchants).into_diagnostic()?;
    let (orders, notify_records) = open_stores(cli.db_path)?;
    let (tasks, _requery_tasks) = TokioDelayQueue::new();
    let (delivery, mut deliveries) = ChannelDeliveryQueue::new();

    let ports = ServicePorts {
        orders,
        notify_records,
        config: Arc::new(InMemoryConfigLookup::from_catalog(catalog)),
        signer: Arc::new(HmacSigner),
        tasks: Arc::new(tasks),
        delivery: Arc::new(delivery),
    };
    let settings = Settings {
        pay_site_url: cli.pay_site_url,
        requery_delay_ms: cli.requery_delay_ms,
        order_expiry_minutes: cli.order_expiry_minutes,
    };
    let sandbox = SandboxChannel::with_settings(settings.clone());
    let registry: ChannelRegistry = [Arc::new(sandbox) as PaymentChannelRef].into_iter().collect();
    let orchestrator = PayOrderOrchestrator::new(ports, registry, settings);

    // Process order requests
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OrderRequestReader::new(file);
    let stdout = io::stdout();
    let mut writer = ResponseWriter::new(stdout.lock());
    for request in reader.requests() {
        match request {
            Ok(request) => {
                let way_code = request.way_code.clone();
                let mch_order_no = request.mch_order_no.clone();
                let response = orchestrator
                    .unified_order(&way_code, UnifiedOrderCommand::NewOrder(request))
                    .await;
                writer
                    .write(&ResponseRow::from_response(&mch_order_no, &response))
                    .into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading order request: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;

    let mut notifications = 0usize;
    while deliveries.try_recv().is_ok() {
        notifications += 1;
    }
    info!(notifications, "merchant notifications queued for delivery");

    Ok(())
}
