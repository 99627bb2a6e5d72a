mod common;

use std::sync::Arc;
use unipay::domain::channel::{ChannelRegistry, PaymentChannelRef};
use unipay::domain::order::OrderState;
use unipay::domain::ports::OrderStore;
use unipay::domain::request::{
    ApiResponse, PayDataType, UnifiedOrderCommand, UnifiedOrderRequest, UnifiedOrderResponse,
};
use unipay::infrastructure::sandbox::SandboxChannel;
use unipay::infrastructure::signing::HmacSigner;

fn sandbox_registry() -> ChannelRegistry {
    [Arc::new(SandboxChannel::new()) as PaymentChannelRef]
        .into_iter()
        .collect()
}

fn request(mch_order_no: &str, way_code: &str) -> UnifiedOrderRequest {
    UnifiedOrderRequest {
        mch_no: "M1".into(),
        app_id: "A1".into(),
        mch_order_no: mch_order_no.into(),
        way_code: way_code.into(),
        amount: "15.00".parse().unwrap(),
        currency: "cny".into(),
        subject: "tea set".into(),
        body: "porcelain".into(),
        notify_url: Some("https://shop.example/notify".into()),
        return_url: Some("https://shop.example/return".into()),
        ..UnifiedOrderRequest::default()
    }
}

fn assert_signed(response: &ApiResponse, secret: &str) {
    let sign = response.sign.as_deref().expect("response is signed");
    assert!(
        HmacSigner
            .verify(&response.sign_params(), secret, sign)
            .unwrap()
    );
}

#[tokio::test]
async fn test_cashier_order_resumed_with_chosen_way() {
    let harness = common::harness(sandbox_registry());

    let created = harness
        .orchestrator
        .unified_order("QR_CASHIER", UnifiedOrderCommand::NewOrder(request("O1", "QR_CASHIER")))
        .await;
    assert!(created.is_success(), "{}", created.msg);
    assert_signed(&created, "app-secret");
    let cashier: UnifiedOrderResponse = created.data_as().unwrap();
    assert_eq!(cashier.order_state, OrderState::Init);
    assert_eq!(cashier.pay_data_type, PayDataType::PayUrl);
    assert_eq!(
        cashier.pay_data,
        Some(format!(
            "http://127.0.0.1:9216/cashier/index.html#/hub/{}",
            cashier.pay_order_id
        ))
    );

    // The payer picks a way on the cashier page
    let stored = harness.orders.get(&cashier.pay_order_id).await.unwrap().unwrap();
    let choice = UnifiedOrderRequest {
        channel_extra: Some("CONFIRM_SUCCESS".into()),
        ..UnifiedOrderRequest::default()
    };
    let resumed = harness
        .orchestrator
        .unified_order(
            "QR_CODE",
            UnifiedOrderCommand::ResumeOrder {
                order: stored,
                request: choice,
            },
        )
        .await;
    assert!(resumed.is_success(), "{}", resumed.msg);
    assert_signed(&resumed, "app-secret");

    let paid: UnifiedOrderResponse = resumed.data_as().unwrap();
    assert_eq!(paid.pay_order_id, cashier.pay_order_id);
    assert_eq!(paid.mch_order_no, "O1");
    assert_eq!(paid.order_state, OrderState::Success);

    let order = harness.orders.get(&paid.pay_order_id).await.unwrap().unwrap();
    assert_eq!(order.way_code, "QR_CODE");
    assert_eq!(order.if_code.as_deref(), Some("sandbox"));
    assert!(order.channel_extra.is_none());
    assert_eq!(harness.delivery.enqueued().await.len(), 1);

    // A settled order cannot be resumed again
    let again = harness
        .orchestrator
        .unified_order(
            "QR_CODE",
            UnifiedOrderCommand::ResumeOrder {
                order,
                request: UnifiedOrderRequest::default(),
            },
        )
        .await;
    assert_eq!(again.code, ApiResponse::CUSTOM_FAIL);
    assert!(again.msg.ends_with("only INIT orders can be resumed"));
}

#[tokio::test]
async fn test_cashier_code_img_url() {
    let harness = common::harness(sandbox_registry());
    let mut cashier = request("O1", "QR_CASHIER");
    cashier.pay_data_type = Some(PayDataType::CodeImgUrl);

    let response = harness
        .orchestrator
        .unified_order("QR_CASHIER", UnifiedOrderCommand::NewOrder(cashier))
        .await;
    let data: UnifiedOrderResponse = response.data_as().unwrap();
    assert_eq!(data.pay_data_type, PayDataType::CodeImgUrl);
    assert!(
        data.pay_data
            .unwrap()
            .starts_with("http://127.0.0.1:9216/api/scan/imgs/http%3A%2F%2F127.0.0.1%3A9216%2Fcashier")
    );
}

#[tokio::test]
async fn test_unknown_result_waits_for_requery() {
    let harness = common::harness(sandbox_registry());
    let mut unknown = request("O1", "QR_CODE");
    unknown.channel_extra = Some("UNKNOWN".into());

    let response = harness
        .orchestrator
        .unified_order("QR_CODE", UnifiedOrderCommand::NewOrder(unknown))
        .await;
    let data: UnifiedOrderResponse = response.data_as().unwrap();
    assert_eq!(data.order_state, OrderState::Ing);

    let scheduled = harness.tasks.scheduled().await;
    assert_eq!(scheduled.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&scheduled[0].payload).unwrap();
    assert_eq!(payload["payOrderId"], data.pay_order_id.as_str());
    assert_eq!(payload["count"], 1);
    assert!(harness.delivery.enqueued().await.is_empty());
}

#[tokio::test]
async fn test_unknown_merchant_gets_unsigned_failure() {
    let harness = common::harness(sandbox_registry());
    let mut stranger = request("O1", "QR_CODE");
    stranger.mch_no = "M9".into();

    let response = harness
        .orchestrator
        .unified_order("QR_CODE", UnifiedOrderCommand::NewOrder(stranger))
        .await;
    assert_eq!(response.code, ApiResponse::CUSTOM_FAIL);
    assert_eq!(response.msg, "merchant app config not found");
    assert!(response.sign.is_none());
    assert!(harness.orders.get_all().await.is_empty());
}
