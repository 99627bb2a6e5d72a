use crate::application::dispatcher::ChannelDispatcher;
use crate::application::notify::MerchantNotifier;
use crate::application::outcome::OutcomeHandler;
use crate::application::requery::RequeryScheduler;
use crate::application::state_machine::OrderStateMachine;
use crate::application::url::is_available_url;
use crate::config::Settings;
use crate::domain::channel::{ChannelRegistry, ChannelState};
use crate::domain::merchant::MchAppConfigContext;
use crate::domain::order::{Amount, OrderState, PayOrder, generate_pay_order_id};
use crate::domain::ports::{ConfigLookupRef, OrderStoreRef, ServicePorts, SignerRef};
use crate::domain::request::{
    ApiResponse, PayDataType, QR_CASHIER_WAY_CODE, UnifiedOrderCommand, UnifiedOrderRequest,
    UnifiedOrderResponse,
};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

/// The create-or-resume unified order use case.
///
/// Every order write goes through the state machine held by the outcome
/// handler; the orchestrator only inserts the initial `INIT` record.
pub struct PayOrderOrchestrator {
    orders: OrderStoreRef,
    config: ConfigLookupRef,
    signer: SignerRef,
    dispatcher: ChannelDispatcher,
    outcome: OutcomeHandler,
    settings: Settings,
}

impl PayOrderOrchestrator {
    /// Wires the dispatcher, outcome handler, notifier and re-query scheduler.
    ///
    /// # Arguments
    ///
    /// * `ports` - Stores, configuration lookup, signer and queues.
    /// * `registry` - The channel adapters available for dispatch.
    /// * `settings` - Pay site URL, re-query delay and order expiry.
    pub fn new(ports: ServicePorts, registry: ChannelRegistry, settings: Settings) -> Self {
        let notifier = MerchantNotifier::new(
            ports.notify_records,
            ports.config.clone(),
            ports.signer.clone(),
            ports.delivery,
        );
        let outcome = OutcomeHandler::new(
            OrderStateMachine::new(ports.orders.clone()),
            ports.orders.clone(),
            notifier,
            RequeryScheduler::new(ports.tasks, settings.requery_delay_ms),
        );

        Self {
            orders: ports.orders,
            config: ports.config.clone(),
            signer: ports.signer,
            dispatcher: ChannelDispatcher::new(registry, ports.config),
            outcome,
            settings,
        }
    }

    /// Entry point for the asynchronous path (webhooks, re-query workers).
    pub fn outcome_handler(&self) -> &OutcomeHandler {
        &self.outcome
    }

    /// Creates a new order or continues a pre-created one, and answers with a
    /// signed envelope. Failures are folded into the envelope.
    #[instrument(skip(self, command), fields(new_order = command.is_new_order()))]
    pub async fn unified_order(&self, way_code: &str, command: UnifiedOrderCommand) -> ApiResponse {
        let mut app_secret = None;
        let response = match self.process(way_code, command, &mut app_secret).await {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => self.failure_response(e),
        };
        self.sign(response, app_secret.as_deref())
    }

    async fn process(
        &self,
        way_code: &str,
        command: UnifiedOrderCommand,
        app_secret: &mut Option<String>,
    ) -> Result<Value> {
        let (existing, mut request) = match command {
            UnifiedOrderCommand::NewOrder(request) => (None, request),
            UnifiedOrderCommand::ResumeOrder { order, mut request } => {
                // The caller's copy may be stale; only the stored record decides.
                let pay_order_id = order.pay_order_id;
                let mut order = self
                    .orders
                    .get(&pay_order_id)
                    .await?
                    .ok_or_else(|| {
                        PaymentError::validation(format!("order {pay_order_id} not found"))
                    })?;
                if order.state != OrderState::Init {
                    return Err(PaymentError::validation(format!(
                        "order {} is {}, only INIT orders can be resumed",
                        order.pay_order_id, order.state
                    )));
                }
                order.way_code = way_code.to_string();
                overlay_stored_order(&mut request, &order, way_code);
                (Some(order), request)
            }
        };
        let is_new_order = existing.is_none();

        let ctx = self
            .config
            .mch_app_context(&request.mch_no, &request.app_id)
            .await?
            .ok_or_else(|| PaymentError::validation("merchant app config not found"))?;
        *app_secret = Some(ctx.app_secret().to_string());

        if is_new_order
            && self
                .orders
                .exists_mch_order(&request.mch_no, &request.mch_order_no)
                .await?
        {
            return Err(PaymentError::DuplicateOrder {
                mch_no: request.mch_no.clone(),
                mch_order_no: request.mch_order_no.clone(),
            });
        }

        if let Some(notify_url) = non_empty(&request.notify_url)
            && !is_available_url(notify_url)
        {
            return Err(PaymentError::validation(
                "notify url must use http:// or https://",
            ));
        }
        if let Some(return_url) = non_empty(&request.return_url)
            && !is_available_url(return_url)
        {
            return Err(PaymentError::validation(
                "return url must use http:// or https://",
            ));
        }

        if is_new_order && way_code == QR_CASHIER_WAY_CODE {
            return self.create_cashier_order(&request, &ctx).await;
        }

        let channel = self.dispatcher.resolve_adapter(&ctx, way_code).await?;
        let mut order = match existing {
            Some(order) => order,
            None => {
                request.way_code = way_code.to_string();
                self.new_order(&request, &ctx)?
            }
        };
        order.if_code = Some(channel.if_code().to_string());

        self.dispatcher.pre_check(&channel, &request, &order).await?;

        if is_new_order {
            self.orders.save(order.clone()).await?;
            info!(
                pay_order_id = %order.pay_order_id,
                mch_order_no = %order.mch_order_no,
                "order created"
            );
        }

        let dispatched = self
            .dispatcher
            .invoke(&channel, &request, &order, &ctx)
            .await;
        self.outcome.handle(&mut order, &dispatched.result).await?;

        if dispatched.result.state == ChannelState::SysError {
            let message = dispatched
                .fault
                .or_else(|| dispatched.result.channel_err_msg.clone())
                .unwrap_or_else(|| "channel system error".to_string());
            return Err(PaymentError::ChannelError {
                message,
                result: dispatched.result,
            });
        }

        let mut response = UnifiedOrderResponse::from_order(&order);
        response.pay_data_type = dispatched.pay_data_type;
        response.pay_data = dispatched.pay_data;
        if order.state == OrderState::Fail {
            response.err_code = dispatched.result.channel_err_code;
            response.err_msg = dispatched.result.channel_err_msg;
        }
        Ok(serde_json::to_value(response)?)
    }

    /// Persists an `INIT` order with no channel yet and answers with the
    /// cashier link the payer opens to pick one.
    async fn create_cashier_order(
        &self,
        request: &UnifiedOrderRequest,
        ctx: &MchAppConfigContext,
    ) -> Result<Value> {
        let mut request = request.clone();
        request.way_code = QR_CASHIER_WAY_CODE.to_string();
        let order = self.new_order(&request, ctx)?;
        self.orders.save(order.clone()).await?;
        info!(pay_order_id = %order.pay_order_id, "cashier order created");

        let cashier_url = self.settings.cashier_url(&order.pay_order_id);
        let mut response = UnifiedOrderResponse::from_order(&order);
        if request.pay_data_type == Some(PayDataType::CodeImgUrl) {
            response.pay_data_type = PayDataType::CodeImgUrl;
            response.pay_data = Some(self.settings.scan_img_url(&cashier_url));
        } else {
            response.pay_data_type = PayDataType::PayUrl;
            response.pay_data = Some(cashier_url);
        }
        Ok(serde_json::to_value(response)?)
    }

    fn new_order(
        &self,
        request: &UnifiedOrderRequest,
        ctx: &MchAppConfigContext,
    ) -> Result<PayOrder> {
        let now = Utc::now();
        Ok(PayOrder {
            pay_order_id: generate_pay_order_id(now),
            mch_no: ctx.mch_info.mch_no.clone(),
            isv_no: ctx.mch_info.isv_no.clone(),
            mch_name: ctx.mch_info.mch_name.clone(),
            mch_type: ctx.mch_type(),
            app_id: ctx.mch_app.app_id.clone(),
            mch_order_no: request.mch_order_no.clone(),
            if_code: None,
            way_code: request.way_code.clone(),
            amount: Amount::new(request.amount)?,
            currency: request.currency.clone(),
            state: OrderState::Init,
            client_ip: non_empty(&request.client_ip).map(str::to_string),
            subject: request.subject.clone(),
            body: request.body.clone(),
            channel_user: request.channel_user.clone(),
            // Transport-only: auth codes and the like are not persisted.
            channel_extra: None,
            ext_param: request.ext_param.clone(),
            notify_url: non_empty(&request.notify_url).map(str::to_string),
            return_url: non_empty(&request.return_url).map(str::to_string),
            channel_order_no: None,
            err_code: None,
            err_msg: None,
            expired_time: now + self.settings.order_expiry(),
            success_time: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn failure_response(&self, err: PaymentError) -> ApiResponse {
        match err {
            e if e.is_business() => {
                info!(error = %e, "order rejected");
                ApiResponse::custom_fail(e.to_string())
            }
            PaymentError::ChannelError { message, .. } => {
                warn!(error = %message, "channel system error");
                ApiResponse::custom_fail(message)
            }
            e @ PaymentError::StateConflict { .. } => {
                warn!(error = %e, "order resolved concurrently");
                ApiResponse::sys_error(e.to_string())
            }
            e => {
                error!(error = ?e, "unexpected failure while placing order");
                ApiResponse::sys_error("system error")
            }
        }
    }

    fn sign(&self, mut response: ApiResponse, app_secret: Option<&str>) -> ApiResponse {
        let Some(secret) = app_secret else {
            return response;
        };
        match self.signer.sign(&response.sign_params(), secret) {
            Ok(sign) => response.sign = Some(sign),
            Err(e) => error!(error = %e, "failed to sign response"),
        }
        response
    }
}

/// Resume mode: the stored order wins over whatever the request carries.
fn overlay_stored_order(request: &mut UnifiedOrderRequest, order: &PayOrder, way_code: &str) {
    request.mch_no = order.mch_no.clone();
    request.app_id = order.app_id.clone();
    request.mch_order_no = order.mch_order_no.clone();
    request.way_code = way_code.to_string();
    request.amount = order.amount.value();
    request.currency = order.currency.clone();
    request.client_ip = order.client_ip.clone();
    request.subject = order.subject.clone();
    request.body = order.body.clone();
    request.notify_url = order.notify_url.clone();
    request.return_url = order.return_url.clone();
    request.ext_param = order.ext_param.clone();
    if order.channel_user.is_some() {
        request.channel_user = order.channel_user.clone();
    }
    if order.channel_extra.is_some() {
        request.channel_extra = order.channel_extra.clone();
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
