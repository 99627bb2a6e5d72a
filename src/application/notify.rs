use crate::application::url::append_url_query;
use crate::domain::notify::{MchNotifyRecord, NotifyOrderType, NotifyState};
use crate::domain::order::{OrderState, PayOrder};
use crate::domain::ports::{ConfigLookupRef, DeliveryQueueRef, NotifyRecordStoreRef, SignerRef};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

/// Result of one notification trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    NoNotifyUrl,
    NotTerminal,
    /// A record already exists for the order; nothing was sent.
    AlreadyNotified,
    Enqueued(u64),
    Failed,
}

/// Order snapshot sent to merchants in callbacks and return redirects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderNotifyPayload<'a> {
    pay_order_id: &'a str,
    mch_no: &'a str,
    app_id: &'a str,
    mch_order_no: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    if_code: Option<&'a str>,
    way_code: &'a str,
    amount: Decimal,
    currency: &'a str,
    state: OrderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ip: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_order_no: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    err_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    err_msg: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ext_param: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success_time: Option<i64>,
    created_at: i64,
}

impl<'a> OrderNotifyPayload<'a> {
    fn from_order(order: &'a PayOrder) -> Self {
        Self {
            pay_order_id: &order.pay_order_id,
            mch_no: &order.mch_no,
            app_id: &order.app_id,
            mch_order_no: &order.mch_order_no,
            if_code: order.if_code.as_deref(),
            way_code: &order.way_code,
            amount: order.amount.value(),
            currency: &order.currency,
            state: order.state,
            client_ip: order.client_ip.as_deref(),
            subject: &order.subject,
            body: &order.body,
            channel_order_no: order.channel_order_no.as_deref(),
            err_code: order.err_code.as_deref(),
            err_msg: order.err_msg.as_deref(),
            ext_param: order.ext_param.as_deref(),
            success_time: order.success_time.map(|t| t.timestamp_millis()),
            created_at: order.created_at.timestamp_millis(),
        }
    }
}

/// Turns a terminal order into exactly one persisted notification record and
/// one delivery enqueue. Retries belong to the delivery worker.
#[derive(Clone)]
pub struct MerchantNotifier {
    records: NotifyRecordStoreRef,
    config: ConfigLookupRef,
    signer: SignerRef,
    delivery: DeliveryQueueRef,
}

impl MerchantNotifier {
    pub fn new(
        records: NotifyRecordStoreRef,
        config: ConfigLookupRef,
        signer: SignerRef,
        delivery: DeliveryQueueRef,
    ) -> Self {
        Self {
            records,
            config,
            signer,
            delivery,
        }
    }

    /// Never fails: errors are logged and reported as `NotifyOutcome::Failed`.
    pub async fn notify_on_terminal_outcome(&self, order: &PayOrder) -> NotifyOutcome {
        match self.try_notify(order).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    pay_order_id = %order.pay_order_id,
                    error = %e,
                    "merchant notification failed"
                );
                NotifyOutcome::Failed
            }
        }
    }

    async fn try_notify(&self, order: &PayOrder) -> Result<NotifyOutcome> {
        if order.notify_url.as_deref().is_none_or(str::is_empty) {
            return Ok(NotifyOutcome::NoNotifyUrl);
        }

        if !order.is_terminal() {
            warn!(
                pay_order_id = %order.pay_order_id,
                state = %order.state,
                "notification requested for non-terminal order"
            );
            return Ok(NotifyOutcome::NotTerminal);
        }

        if self
            .records
            .find_by_order(&order.pay_order_id, NotifyOrderType::PayOrder)
            .await?
            .is_some()
        {
            info!(
                pay_order_id = %order.pay_order_id,
                "notification already exists, not sending again"
            );
            return Ok(NotifyOutcome::AlreadyNotified);
        }

        let merchant = self
            .config
            .merchant_info(&order.mch_no)
            .await?
            .ok_or_else(|| PaymentError::internal(format!("merchant {} not found", order.mch_no)))?;

        let notify_url = self.build_callback_url(order, &merchant.private_key)?;
        let now = Utc::now();
        let record = MchNotifyRecord {
            notify_id: 0,
            order_id: order.pay_order_id.clone(),
            order_type: NotifyOrderType::PayOrder,
            mch_no: order.mch_no.clone(),
            isv_no: order.isv_no.clone(),
            app_id: order.app_id.clone(),
            mch_order_no: order.mch_order_no.clone(),
            notify_url,
            res_result: String::new(),
            notify_count: 0,
            state: NotifyState::Ing,
            last_notify_time: None,
            created_at: now,
            updated_at: now,
        };

        let Some(notify_id) = self.records.insert_if_absent(record).await? else {
            info!(
                pay_order_id = %order.pay_order_id,
                "notification created concurrently, not sending again"
            );
            return Ok(NotifyOutcome::AlreadyNotified);
        };

        self.delivery.enqueue(notify_id).await?;
        info!(pay_order_id = %order.pay_order_id, notify_id, "merchant notification enqueued");
        Ok(NotifyOutcome::Enqueued(notify_id))
    }

    /// Signed callback URL for the order's notify URL.
    pub fn build_callback_url(&self, order: &PayOrder, mch_key: &str) -> Result<String> {
        let notify_url = order
            .notify_url
            .as_deref()
            .ok_or_else(|| PaymentError::validation("order has no notify url"))?;
        let params = self.signed_params(order, mch_key)?;
        append_url_query(notify_url, &params)
    }

    /// Signed return URL, or an empty string when the order has none.
    pub fn build_return_url(&self, order: &PayOrder, mch_key: &str) -> Result<String> {
        match order.return_url.as_deref() {
            Some(return_url) if !return_url.is_empty() => {
                let params = self.signed_params(order, mch_key)?;
                append_url_query(return_url, &params)
            }
            _ => Ok(String::new()),
        }
    }

    fn signed_params(&self, order: &PayOrder, mch_key: &str) -> Result<Map<String, Value>> {
        let mut params = match serde_json::to_value(OrderNotifyPayload::from_order(order))? {
            Value::Object(map) => map,
            _ => return Err(PaymentError::internal("order payload is not an object")),
        };
        params.insert(
            "reqTime".to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        let sign = self.signer.sign(&params, mch_key)?;
        params.insert("sign".to_string(), Value::from(sign));
        Ok(params)
    }
}
