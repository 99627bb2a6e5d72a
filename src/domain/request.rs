use crate::domain::order::{OrderState, PayOrder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Way code of the hosted cashier: the order is created first, the payer picks a channel later.
pub const QR_CASHIER_WAY_CODE: &str = "QR_CASHIER";

/// Merchant request to create a payment order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedOrderRequest {
    pub mch_no: String,
    pub app_id: String,
    pub mch_order_no: String,
    #[serde(default)]
    pub way_code: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub notify_url: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
    #[serde(default)]
    pub channel_user: Option<String>,
    /// Channel-specific extra parameters, passed through to the adapter.
    #[serde(default)]
    pub channel_extra: Option<String>,
    /// Opaque merchant data echoed back in callbacks.
    #[serde(default)]
    pub ext_param: Option<String>,
    /// Preferred pay data format for cashier orders.
    #[serde(default)]
    pub pay_data_type: Option<PayDataType>,
}

/// The two ways an order reaches the channel dispatch.
#[derive(Debug, Clone)]
pub enum UnifiedOrderCommand {
    /// Validate the request and create a brand new order.
    NewOrder(UnifiedOrderRequest),
    /// Continue an order that was persisted in `INIT` earlier (cashier flow).
    ResumeOrder {
        order: PayOrder,
        request: UnifiedOrderRequest,
    },
}

impl UnifiedOrderCommand {
    pub fn is_new_order(&self) -> bool {
        matches!(self, UnifiedOrderCommand::NewOrder(_))
    }
}

/// How the payer continues after order creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PayDataType {
    #[serde(rename = "payurl")]
    PayUrl,
    #[serde(rename = "form")]
    Form,
    #[serde(rename = "wxapp")]
    WxApp,
    #[serde(rename = "aliapp")]
    AliApp,
    #[serde(rename = "ysfapp")]
    YsfApp,
    #[serde(rename = "codeUrl")]
    CodeUrl,
    #[serde(rename = "codeImgUrl")]
    CodeImgUrl,
    #[default]
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedOrderResponse {
    pub pay_order_id: String,
    pub mch_order_no: String,
    pub order_state: OrderState,
    pub pay_data_type: PayDataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl UnifiedOrderResponse {
    pub fn from_order(order: &PayOrder) -> Self {
        Self {
            pay_order_id: order.pay_order_id.clone(),
            mch_order_no: order.mch_order_no.clone(),
            order_state: order.state,
            pay_data_type: PayDataType::None,
            pay_data: None,
            err_code: None,
            err_msg: None,
        }
    }
}

/// Caller-facing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

impl ApiResponse {
    pub const SUCCESS: i32 = 0;
    pub const SYS_ERROR: i32 = 10;
    pub const CUSTOM_FAIL: i32 = 9999;

    pub fn ok(data: Value) -> Self {
        Self {
            code: Self::SUCCESS,
            msg: "SUCCESS".to_string(),
            data: Some(data),
            sign: None,
        }
    }

    pub fn custom_fail(msg: impl Into<String>) -> Self {
        Self {
            code: Self::CUSTOM_FAIL,
            msg: msg.into(),
            data: None,
            sign: None,
        }
    }

    pub fn sys_error(msg: impl Into<String>) -> Self {
        Self {
            code: Self::SYS_ERROR,
            msg: msg.into(),
            data: None,
            sign: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// Parameters covered by the signature: the data object on success,
    /// code and message otherwise.
    pub fn sign_params(&self) -> Map<String, Value> {
        match &self.data {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                let mut map = Map::new();
                map.insert("code".to_string(), Value::from(self.code));
                map.insert("msg".to_string(), Value::from(self.msg.clone()));
                map
            }
        }
    }

    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }
}
