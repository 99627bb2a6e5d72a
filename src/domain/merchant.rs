use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MerchantType {
    /// Merchant holding its own channel contract.
    Normal,
    /// Sub-merchant onboarded under an ISV platform.
    IsvSub,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub mch_no: String,
    pub mch_name: String,
    pub mch_type: MerchantType,
    /// Owning platform, set for `IsvSub` merchants.
    #[serde(default)]
    pub isv_no: Option<String>,
    /// Key used to sign merchant callbacks.
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantApp {
    pub app_id: String,
    pub mch_no: String,
    #[serde(default)]
    pub app_name: String,
    /// Key used to sign API responses.
    pub app_secret: String,
    /// Channel parameters of a normal merchant, keyed by interface code.
    #[serde(default)]
    pub normal_params: HashMap<String, Value>,
    /// Sub-merchant parameters of an ISV sub-merchant, keyed by interface code.
    #[serde(default)]
    pub isvsub_params: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsvConfigContext {
    pub isv_no: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl IsvConfigContext {
    pub fn params_by_if_code(&self, if_code: &str) -> Option<&Value> {
        self.params.get(if_code)
    }
}

/// Routes a merchant app's pay way to one channel interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayPassage {
    pub mch_no: String,
    pub app_id: String,
    pub way_code: String,
    pub if_code: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Merchant and application configuration resolved for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct MchAppConfigContext {
    pub mch_info: MerchantInfo,
    pub mch_app: MerchantApp,
}

impl MchAppConfigContext {
    pub fn new(mch_info: MerchantInfo, mch_app: MerchantApp) -> Self {
        Self { mch_info, mch_app }
    }

    pub fn mch_no(&self) -> &str {
        &self.mch_info.mch_no
    }

    pub fn app_id(&self) -> &str {
        &self.mch_app.app_id
    }

    pub fn mch_type(&self) -> MerchantType {
        self.mch_info.mch_type
    }

    pub fn isv_no(&self) -> Option<&str> {
        self.mch_info.isv_no.as_deref()
    }

    pub fn app_secret(&self) -> &str {
        &self.mch_app.app_secret
    }

    pub fn normal_params_by_if_code(&self, if_code: &str) -> Option<&Value> {
        self.mch_app.normal_params.get(if_code)
    }

    pub fn isvsub_params_by_if_code(&self, if_code: &str) -> Option<&Value> {
        self.mch_app.isvsub_params.get(if_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_app_deserialization_defaults() {
        let app: MerchantApp = serde_json::from_value(json!({
            "app_id": "A1",
            "mch_no": "M1",
            "app_secret": "s3cret",
            "normal_params": { "wxpay": { "mch_id": "1900" } }
        }))
        .unwrap();

        assert!(app.isvsub_params.is_empty());
        assert_eq!(app.normal_params["wxpay"]["mch_id"], "1900");
    }

    #[test]
    fn test_passage_enabled_by_default() {
        let passage: PayPassage = serde_json::from_value(json!({
            "mch_no": "M1",
            "app_id": "A1",
            "way_code": "WX_NATIVE",
            "if_code": "wxpay"
        }))
        .unwrap();
        assert!(passage.enabled);
    }

    #[test]
    fn test_context_param_lookup() {
        let info = MerchantInfo {
            mch_no: "M1".into(),
            mch_name: "Shop".into(),
            mch_type: MerchantType::IsvSub,
            isv_no: Some("V1".into()),
            private_key: "pk".into(),
        };
        let mut app = MerchantApp {
            app_id: "A1".into(),
            mch_no: "M1".into(),
            app_name: String::new(),
            app_secret: "s".into(),
            normal_params: HashMap::new(),
            isvsub_params: HashMap::new(),
        };
        app.isvsub_params.insert("alipay".into(), json!({"sub": "2088"}));

        let ctx = MchAppConfigContext::new(info, app);
        assert_eq!(ctx.isv_no(), Some("V1"));
        assert!(ctx.isvsub_params_by_if_code("alipay").is_some());
        assert!(ctx.normal_params_by_if_code("alipay").is_none());
    }
}
