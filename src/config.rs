use crate::application::requery::DEFAULT_REQUERY_DELAY_MS;
use crate::domain::merchant::{IsvConfigContext, MerchantApp, MerchantInfo, PayPassage};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use url::form_urlencoded;

pub const DEFAULT_PAY_SITE_URL: &str = "http://127.0.0.1:9216";
pub const DEFAULT_ORDER_EXPIRY_MINUTES: i64 = 120;

/// Runtime settings of the order services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Public base URL of the payment site, used for cashier links.
    pub pay_site_url: String,
    pub requery_delay_ms: u64,
    pub order_expiry_minutes: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pay_site_url: DEFAULT_PAY_SITE_URL.to_string(),
            requery_delay_ms: DEFAULT_REQUERY_DELAY_MS,
            order_expiry_minutes: DEFAULT_ORDER_EXPIRY_MINUTES,
        }
    }
}

impl Settings {
    pub fn order_expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.order_expiry_minutes)
    }

    /// Hosted cashier page of an order.
    pub fn cashier_url(&self, pay_order_id: &str) -> String {
        format!(
            "{}/cashier/index.html#/hub/{}",
            self.site_root(),
            pay_order_id
        )
    }

    /// QR image rendering `target_url`.
    pub fn scan_img_url(&self, target_url: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target_url.as_bytes()).collect();
        format!("{}/api/scan/imgs/{}.png", self.site_root(), encoded)
    }

    /// Webhook address channel `if_code` posts asynchronous results to,
    /// optionally scoped to one order.
    pub fn channel_notify_url(&self, if_code: &str, pay_order_id: Option<&str>) -> String {
        let base = format!("{}/api/pay/notify/{}", self.site_root(), if_code);
        match pay_order_id {
            Some(pay_order_id) => format!("{base}/{pay_order_id}"),
            None => base,
        }
    }

    /// Page channel `if_code` sends the payer back to.
    pub fn channel_return_url(&self, if_code: &str) -> String {
        format!("{}/api/pay/return/{}", self.site_root(), if_code)
    }

    fn site_root(&self) -> &str {
        self.pay_site_url.trim_end_matches('/')
    }
}

/// Merchant configuration loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantCatalog {
    #[serde(default)]
    pub isvs: Vec<IsvConfigContext>,
    #[serde(default)]
    pub merchants: Vec<MerchantInfo>,
    #[serde(default)]
    pub apps: Vec<MerchantApp>,
    #[serde(default)]
    pub passages: Vec<PayPassage>,
}

impl MerchantCatalog {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}
