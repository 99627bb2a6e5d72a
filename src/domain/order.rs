use crate::domain::merchant::MerchantType;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

const PAY_ORDER_PREFIX: &str = "P";

static PAY_ORDER_SEQ: AtomicU32 = AtomicU32::new(0);

/// Generates a pay order id: prefix, millisecond timestamp, 4-digit sequence.
pub fn generate_pay_order_id(now: DateTime<Utc>) -> String {
    let seq = PAY_ORDER_SEQ.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!(
        "{}{}{:04}",
        PAY_ORDER_PREFIX,
        now.format("%Y%m%d%H%M%S%3f"),
        seq
    )
}

/// Represents a positive monetary amount for an order.
///
/// Wraps `rust_decimal::Decimal` so a zero or negative amount can never reach
/// a channel adapter.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::validation("amount must be positive"))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Lifecycle state of a pay order.
///
/// Orders only move `Init -> Ing -> {Success, Fail}`. `Closed` marks expiry and
/// is owned by a sweep outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Init,
    Ing,
    Success,
    Fail,
    Closed,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Success | OrderState::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Init => "INIT",
            OrderState::Ing => "ING",
            OrderState::Success => "SUCCESS",
            OrderState::Fail => "FAIL",
            OrderState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only states `resolve_terminal` may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Success,
    Fail,
}

impl From<TerminalState> for OrderState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Success => OrderState::Success,
            TerminalState::Fail => OrderState::Fail,
        }
    }
}

/// A payment order as persisted by the order store.
///
/// Identity, amount and merchant fields are fixed at creation. After that
/// only state, channel references, error fields and timestamps change, and
/// only through the store's conditional updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayOrder {
    pub pay_order_id: String,
    pub mch_no: String,
    pub isv_no: Option<String>,
    pub mch_name: String,
    pub mch_type: MerchantType,
    pub app_id: String,
    pub mch_order_no: String,
    /// Channel interface code. Unset until a channel is chosen.
    pub if_code: Option<String>,
    pub way_code: String,
    pub amount: Amount,
    pub currency: String,
    pub state: OrderState,
    pub client_ip: Option<String>,
    pub subject: String,
    pub body: String,
    pub channel_user: Option<String>,
    pub channel_extra: Option<String>,
    pub ext_param: Option<String>,
    pub notify_url: Option<String>,
    pub return_url: Option<String>,
    pub channel_order_no: Option<String>,
    pub err_code: Option<String>,
    pub err_msg: Option<String>,
    pub expired_time: DateTime<Utc>,
    pub success_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayOrder {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
