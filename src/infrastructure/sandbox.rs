use crate::config::Settings;
use crate::domain::channel::{
    ChannelFault, ChannelPayResponse, ChannelResult, ChannelState, PaymentChannel,
};
use crate::domain::merchant::MchAppConfigContext;
use crate::domain::order::PayOrder;
use crate::domain::request::{PayDataType, QR_CASHIER_WAY_CODE, UnifiedOrderRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;
use url::form_urlencoded;

pub const SANDBOX_IF_CODE: &str = "sandbox";
/// Way code whose requests must carry a payer auth code.
pub const BAR_CODE_WAY_CODE: &str = "BAR_CODE";

/// Scripted answer read from the request's `channel_extra`.
///
/// Either a bare channel state (`CONFIRM_SUCCESS`) or a JSON object such as
/// `{"state": "WAITING", "auth_code": "134..."}`. Defaults to `WAITING`.
#[derive(Debug, Default, Deserialize)]
struct SandboxScript {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    auth_code: Option<String>,
}

impl SandboxScript {
    fn parse(channel_extra: Option<&str>) -> Result<Self, String> {
        let raw = channel_extra.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::default());
        }
        if !raw.starts_with('{') {
            return Ok(Self {
                state: Some(raw.to_string()),
                auth_code: None,
            });
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => {
                serde_json::from_value(value).map_err(|e| format!("invalid channel extra: {e}"))
            }
            _ => Err("channel extra must be a JSON object".to_string()),
        }
    }

    fn state(&self) -> Result<ChannelState, String> {
        match self.state.as_deref() {
            None => Ok(ChannelState::Waiting),
            Some(raw) => ChannelState::from_str(raw).map_err(|e| e.to_string()),
        }
    }
}

/// A channel that never leaves the process. Its verdict is scripted by the
/// merchant through `channel_extra`, which makes every outcome reachable
/// from the command line.
///
/// Pending payments hand out a pay link carrying the webhook and return
/// addresses a real upstream would be registered with.
#[derive(Debug, Default, Clone)]
pub struct SandboxChannel {
    settings: Settings,
}

impl SandboxChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self { settings }
    }

    fn pay_link(&self, pay_order_id: &str) -> String {
        let notify_url = self.settings.channel_notify_url(SANDBOX_IF_CODE, Some(pay_order_id));
        let return_url = self.settings.channel_return_url(SANDBOX_IF_CODE);
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("notify_url", &notify_url)
            .append_pair("return_url", &return_url)
            .finish();
        format!("sandbox://pay/{pay_order_id}?{query}")
    }
}

#[async_trait]
impl PaymentChannel for SandboxChannel {
    fn if_code(&self) -> &str {
        SANDBOX_IF_CODE
    }

    fn supports_way(&self, way_code: &str) -> bool {
        !way_code.is_empty() && way_code != QR_CASHIER_WAY_CODE
    }

    async fn pre_check(&self, request: &UnifiedOrderRequest, _order: &PayOrder) -> Option<String> {
        let script = match SandboxScript::parse(request.channel_extra.as_deref()) {
            Ok(script) => script,
            Err(message) => return Some(message),
        };
        if let Err(message) = script.state() {
            return Some(message);
        }
        if request.way_code == BAR_CODE_WAY_CODE
            && script.auth_code.as_deref().is_none_or(str::is_empty)
        {
            return Some("auth code is required for bar code payments".to_string());
        }
        None
    }

    async fn pay(
        &self,
        request: &UnifiedOrderRequest,
        order: &PayOrder,
        _ctx: &MchAppConfigContext,
    ) -> Result<ChannelPayResponse, ChannelFault> {
        let state = SandboxScript::parse(request.channel_extra.as_deref())
            .and_then(|script| script.state())
            .map_err(ChannelFault::sys_error)?;
        debug!(pay_order_id = %order.pay_order_id, %state, "sandbox answering");

        let channel_order_id = format!("SBX{}", order.pay_order_id);
        let response = match state {
            ChannelState::ConfirmSuccess => {
                ChannelPayResponse::new(ChannelResult::confirm_success(channel_order_id))
            }
            ChannelState::ConfirmFail => ChannelPayResponse::new(
                ChannelResult::confirm_fail("SANDBOX_DECLINED", "declined by sandbox")
                    .with_channel_order_id(channel_order_id),
            ),
            ChannelState::Waiting => ChannelPayResponse::new(
                ChannelResult::waiting().with_channel_order_id(channel_order_id),
            )
            .with_pay_data(PayDataType::CodeUrl, self.pay_link(&order.pay_order_id)),
            ChannelState::Unknown => {
                ChannelPayResponse::new(ChannelResult::unknown().with_need_query())
            }
            ChannelState::ApiRetError => ChannelPayResponse::new(ChannelResult::api_ret_error(
                "SANDBOX_API_ERROR",
                "sandbox rejected the request",
            )),
            ChannelState::SysError => {
                return Err(ChannelFault::sys_error("sandbox connection refused"));
            }
        };
        Ok(response)
    }
}
