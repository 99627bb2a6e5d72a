use crate::domain::merchant::MchAppConfigContext;
use crate::domain::order::PayOrder;
use crate::domain::request::{PayDataType, UnifiedOrderRequest};
use crate::error::PaymentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Canonical verdict of one channel invocation, shared by every upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    ConfirmSuccess,
    ConfirmFail,
    Waiting,
    Unknown,
    ApiRetError,
    SysError,
}

impl ChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::ConfirmSuccess => "CONFIRM_SUCCESS",
            ChannelState::ConfirmFail => "CONFIRM_FAIL",
            ChannelState::Waiting => "WAITING",
            ChannelState::Unknown => "UNKNOWN",
            ChannelState::ApiRetError => "API_RET_ERROR",
            ChannelState::SysError => "SYS_ERROR",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a raw state reported by an adapter. Anything outside the canonical
/// set breaks the adapter contract.
impl FromStr for ChannelState {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRM_SUCCESS" => Ok(ChannelState::ConfirmSuccess),
            "CONFIRM_FAIL" => Ok(ChannelState::ConfirmFail),
            "WAITING" => Ok(ChannelState::Waiting),
            "UNKNOWN" => Ok(ChannelState::Unknown),
            "API_RET_ERROR" => Ok(ChannelState::ApiRetError),
            "SYS_ERROR" => Ok(ChannelState::SysError),
            other => Err(PaymentError::ContractViolation(format!(
                "unrecognised channel state [{other}]"
            ))),
        }
    }
}

/// Normalized outcome of one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub state: ChannelState,
    pub channel_order_id: Option<String>,
    pub channel_err_code: Option<String>,
    pub channel_err_msg: Option<String>,
    /// The channel gave no final answer and must be polled later.
    pub need_query: bool,
}

impl ChannelResult {
    pub fn new(state: ChannelState) -> Self {
        Self {
            state,
            channel_order_id: None,
            channel_err_code: None,
            channel_err_msg: None,
            need_query: false,
        }
    }

    pub fn confirm_success(channel_order_id: impl Into<String>) -> Self {
        Self::new(ChannelState::ConfirmSuccess).with_channel_order_id(channel_order_id)
    }

    pub fn confirm_fail(err_code: impl Into<String>, err_msg: impl Into<String>) -> Self {
        Self::new(ChannelState::ConfirmFail).with_error(err_code, err_msg)
    }

    /// Upstream accepted the order but has not settled it; polling is required.
    pub fn waiting() -> Self {
        Self::new(ChannelState::Waiting).with_need_query()
    }

    pub fn unknown() -> Self {
        Self::new(ChannelState::Unknown)
    }

    pub fn api_ret_error(err_code: impl Into<String>, err_msg: impl Into<String>) -> Self {
        Self::new(ChannelState::ApiRetError).with_error(err_code, err_msg)
    }

    pub fn sys_error(err_msg: impl Into<String>) -> Self {
        let mut result = Self::new(ChannelState::SysError);
        result.channel_err_msg = Some(err_msg.into());
        result
    }

    pub fn with_channel_order_id(mut self, channel_order_id: impl Into<String>) -> Self {
        self.channel_order_id = Some(channel_order_id.into());
        self
    }

    pub fn with_error(mut self, err_code: impl Into<String>, err_msg: impl Into<String>) -> Self {
        self.channel_err_code = Some(err_code.into());
        self.channel_err_msg = Some(err_msg.into());
        self
    }

    pub fn with_need_query(mut self) -> Self {
        self.need_query = true;
        self
    }
}

/// A failure raised by an adapter instead of a normal response.
///
/// The carried result decides what happens to the order: `SYS_ERROR` means no
/// upstream effect is assumed, any other state is applied like a normal result.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ChannelFault {
    pub message: String,
    pub result: ChannelResult,
}

impl ChannelFault {
    pub fn new(message: impl Into<String>, result: ChannelResult) -> Self {
        Self {
            message: message.into(),
            result,
        }
    }

    /// Network or adapter-internal failure before any confirmed upstream interaction.
    pub fn sys_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            result: ChannelResult::sys_error(message.clone()),
            message,
        }
    }
}

impl From<ChannelFault> for PaymentError {
    fn from(fault: ChannelFault) -> Self {
        PaymentError::ChannelError {
            message: fault.message,
            result: fault.result,
        }
    }
}

/// Successful adapter response: the verdict plus whatever the payer needs next.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPayResponse {
    pub result: ChannelResult,
    pub pay_data_type: PayDataType,
    pub pay_data: Option<String>,
}

impl ChannelPayResponse {
    pub fn new(result: ChannelResult) -> Self {
        Self {
            result,
            pay_data_type: PayDataType::None,
            pay_data: None,
        }
    }

    pub fn with_pay_data(
        mut self,
        pay_data_type: PayDataType,
        pay_data: impl Into<String>,
    ) -> Self {
        self.pay_data_type = pay_data_type;
        self.pay_data = Some(pay_data.into());
        self
    }
}

/// Contract every upstream payment channel adapter implements.
#[async_trait]
pub trait PaymentChannel: Send + Sync {
    /// Interface code this adapter is registered under.
    fn if_code(&self) -> &str;

    fn supports_way(&self, way_code: &str) -> bool;

    /// Business pre-check before the order is persisted. `Some` aborts with that message.
    async fn pre_check(&self, _request: &UnifiedOrderRequest, _order: &PayOrder) -> Option<String> {
        None
    }

    async fn pay(
        &self,
        request: &UnifiedOrderRequest,
        order: &PayOrder,
        ctx: &MchAppConfigContext,
    ) -> Result<ChannelPayResponse, ChannelFault>;
}

pub type PaymentChannelRef = Arc<dyn PaymentChannel>;

/// Adapters registered at startup, looked up by interface code.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<String, PaymentChannelRef>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own interface code, replacing any previous one.
    pub fn register(&mut self, channel: PaymentChannelRef) -> &mut Self {
        self.channels.insert(channel.if_code().to_string(), channel);
        self
    }

    pub fn get(&self, if_code: &str) -> Option<PaymentChannelRef> {
        self.channels.get(if_code).cloned()
    }

    pub fn if_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

impl FromIterator<PaymentChannelRef> for ChannelRegistry {
    fn from_iter<I: IntoIterator<Item = PaymentChannelRef>>(iter: I) -> Self {
        let mut registry = Self::new();
        for channel in iter {
            registry.register(channel);
        }
        registry
    }
}
