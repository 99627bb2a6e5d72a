mod common;

use std::sync::Arc;
use unipay::application::outcome::PendingResolution;
use unipay::domain::channel::{ChannelRegistry, ChannelResult, PaymentChannelRef};
use unipay::domain::notify::NotifyOrderType;
use unipay::domain::order::OrderState;
use unipay::domain::ports::{NotifyRecordStore, OrderStore};
use unipay::domain::request::{UnifiedOrderCommand, UnifiedOrderRequest, UnifiedOrderResponse};
use unipay::error::PaymentError;
use unipay::infrastructure::sandbox::SandboxChannel;

fn sandbox_registry() -> ChannelRegistry {
    [Arc::new(SandboxChannel::new()) as PaymentChannelRef]
        .into_iter()
        .collect()
}

fn waiting_request(mch_order_no: &str) -> UnifiedOrderRequest {
    UnifiedOrderRequest {
        mch_no: "M1".into(),
        app_id: "A1".into(),
        mch_order_no: mch_order_no.into(),
        way_code: "QR_CODE".into(),
        amount: "20.00".parse().unwrap(),
        currency: "cny".into(),
        subject: "tea".into(),
        body: "pu-erh".into(),
        notify_url: Some("https://shop.example/notify".into()),
        channel_extra: Some("WAITING".into()),
        ..UnifiedOrderRequest::default()
    }
}

#[tokio::test]
async fn test_racing_webhooks_notify_once() {
    let harness = common::harness(sandbox_registry());
    let response = harness
        .orchestrator
        .unified_order("QR_CODE", UnifiedOrderCommand::NewOrder(waiting_request("O1")))
        .await;
    let data: UnifiedOrderResponse = response.data_as().unwrap();
    assert_eq!(data.order_state, OrderState::Ing);
    assert_eq!(harness.tasks.scheduled().await.len(), 1);

    let mut handles = Vec::new();
    for i in 0..16 {
        let handler = harness.orchestrator.outcome_handler().clone();
        let pay_order_id = data.pay_order_id.clone();
        handles.push(tokio::spawn(async move {
            let result = ChannelResult::confirm_success(format!("CH-{i}"));
            handler.handle_pending(&pay_order_id, &result).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(PendingResolution::Resolved(OrderState::Success)) => winners += 1,
            Err(PaymentError::StateConflict { expected, .. }) => {
                assert_eq!(expected, OrderState::Ing)
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(harness.delivery.enqueued().await.len(), 1);
    let record = harness
        .notify_records
        .find_by_order(&data.pay_order_id, NotifyOrderType::PayOrder)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.notify_url.split('?').next(), Some("https://shop.example/notify"));

    let stored = harness.orders.get(&data.pay_order_id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Success);
    assert!(stored.channel_order_no.unwrap().starts_with("CH-"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_verdict_race_settles_on_one_winner() {
    for round in 0..8 {
        let harness = common::harness(sandbox_registry());
        let response = harness
            .orchestrator
            .unified_order(
                "QR_CODE",
                UnifiedOrderCommand::NewOrder(waiting_request(&format!("O{round}"))),
            )
            .await;
        let data: UnifiedOrderResponse = response.data_as().unwrap();
        assert_eq!(data.order_state, OrderState::Ing);

        let mut handles = Vec::new();
        for i in 0..16 {
            let handler = harness.orchestrator.outcome_handler().clone();
            let pay_order_id = data.pay_order_id.clone();
            handles.push(tokio::spawn(async move {
                let result = if (i + round) % 2 == 0 {
                    ChannelResult::confirm_fail("CLOSED", "payer cancelled")
                } else {
                    ChannelResult::confirm_success(format!("CH-{i}"))
                };
                handler.handle_pending(&pay_order_id, &result).await
            }));
        }

        let mut verdicts = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(PendingResolution::Resolved(state)) => verdicts.push(state),
                Err(PaymentError::StateConflict { expected, .. }) => {
                    assert_eq!(expected, OrderState::Ing)
                }
                other => panic!("unexpected resolution: {other:?}"),
            }
        }
        assert_eq!(verdicts.len(), 1, "round {round}: {verdicts:?}");
        let winner = verdicts[0];

        let stored = harness.orders.get(&data.pay_order_id).await.unwrap().unwrap();
        assert_eq!(stored.state, winner);

        let record = harness
            .notify_records
            .find_by_order(&data.pay_order_id, NotifyOrderType::PayOrder)
            .await
            .unwrap();
        let enqueued = harness.delivery.enqueued().await.len();
        match winner {
            OrderState::Success => {
                assert!(record.is_some());
                assert_eq!(enqueued, 1);
                assert!(stored.err_code.is_none());
                assert!(stored.success_time.is_some());
            }
            OrderState::Fail => {
                assert!(record.is_none());
                assert_eq!(enqueued, 0);
                assert_eq!(stored.err_code.as_deref(), Some("CLOSED"));
                assert!(stored.channel_order_no.is_none());
                assert!(stored.success_time.is_none());
            }
            other => panic!("non-terminal winner {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_fail_then_success_keeps_first_verdict() {
    let harness = common::harness(sandbox_registry());
    let response = harness
        .orchestrator
        .unified_order("QR_CODE", UnifiedOrderCommand::NewOrder(waiting_request("O1")))
        .await;
    let data: UnifiedOrderResponse = response.data_as().unwrap();
    let handler = harness.orchestrator.outcome_handler();

    let still = handler
        .handle_pending(&data.pay_order_id, &ChannelResult::waiting())
        .await
        .unwrap();
    assert_eq!(still, PendingResolution::StillPending);

    let failed = handler
        .handle_pending(
            &data.pay_order_id,
            &ChannelResult::confirm_fail("CLOSED", "payer cancelled"),
        )
        .await
        .unwrap();
    assert_eq!(failed, PendingResolution::Resolved(OrderState::Fail));

    let late = handler
        .handle_pending(&data.pay_order_id, &ChannelResult::confirm_success("CH-9"))
        .await;
    assert!(matches!(late, Err(PaymentError::StateConflict { .. })));

    let stored = harness.orders.get(&data.pay_order_id).await.unwrap().unwrap();
    assert_eq!(stored.state, OrderState::Fail);
    assert_eq!(stored.err_code.as_deref(), Some("CLOSED"));
    assert!(harness.delivery.enqueued().await.is_empty());
}

#[tokio::test]
async fn test_parallel_orders_with_shared_merchant_number() {
    let harness = Arc::new(common::harness(sandbox_registry()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move {
            let mut request = waiting_request("SAME");
            request.channel_extra = Some("CONFIRM_SUCCESS".into());
            harness
                .orchestrator
                .unified_order("QR_CODE", UnifiedOrderCommand::NewOrder(request))
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_success() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(harness.orders.get_all().await.len(), 1);
    assert_eq!(harness.delivery.enqueued().await.len(), 1);
}
