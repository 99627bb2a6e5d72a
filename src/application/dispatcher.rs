use crate::domain::channel::{ChannelRegistry, ChannelResult, PaymentChannelRef};
use crate::domain::merchant::{MchAppConfigContext, MerchantType};
use crate::domain::order::PayOrder;
use crate::domain::ports::ConfigLookupRef;
use crate::domain::request::{PayDataType, UnifiedOrderRequest};
use crate::error::{PaymentError, Result};
use tracing::{info, warn};

/// What one adapter invocation produced, fault or not.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub result: ChannelResult,
    pub pay_data_type: PayDataType,
    pub pay_data: Option<String>,
    /// Message of the adapter fault, when the adapter failed instead of answering.
    pub fault: Option<String>,
}

/// Picks and calls the channel adapter for a merchant app and pay way.
///
/// Never writes order state: it only turns an adapter call into a
/// `DispatchOutcome` for the outcome handler.
#[derive(Clone)]
pub struct ChannelDispatcher {
    registry: ChannelRegistry,
    config: ConfigLookupRef,
}

impl ChannelDispatcher {
    pub fn new(registry: ChannelRegistry, config: ConfigLookupRef) -> Self {
        Self { registry, config }
    }

    /// Resolves the adapter enabled for `way_code` and checks the channel
    /// parameters it needs are configured for this merchant.
    pub async fn resolve_adapter(
        &self,
        ctx: &MchAppConfigContext,
        way_code: &str,
    ) -> Result<PaymentChannelRef> {
        let passage = self
            .config
            .find_pay_passage(ctx.mch_no(), ctx.app_id(), way_code)
            .await?
            .filter(|passage| passage.enabled)
            .ok_or_else(|| PaymentError::validation("merchant app does not support this pay way"))?;

        let if_code = passage.if_code.as_str();
        let channel = self
            .registry
            .get(if_code)
            .ok_or_else(|| PaymentError::validation("no such channel interface"))?;

        if !channel.supports_way(way_code) {
            return Err(PaymentError::validation(
                "channel interface does not support this pay way",
            ));
        }

        match ctx.mch_type() {
            MerchantType::Normal => {
                if ctx.normal_params_by_if_code(if_code).is_none() {
                    return Err(PaymentError::validation("merchant app params not configured"));
                }
            }
            MerchantType::IsvSub => {
                if ctx.isvsub_params_by_if_code(if_code).is_none() {
                    return Err(PaymentError::validation(
                        "isv sub-merchant params not configured",
                    ));
                }

                let isv = match ctx.isv_no() {
                    Some(isv_no) => self.config.isv_context(isv_no).await?,
                    None => None,
                };
                if isv
                    .as_ref()
                    .and_then(|isv| isv.params_by_if_code(if_code))
                    .is_none()
                {
                    return Err(PaymentError::validation("isv params not configured"));
                }
            }
        }

        Ok(channel)
    }

    /// Runs the adapter's own pre-check. Its message is returned verbatim.
    pub async fn pre_check(
        &self,
        channel: &PaymentChannelRef,
        request: &UnifiedOrderRequest,
        order: &PayOrder,
    ) -> Result<()> {
        match channel.pre_check(request, order).await {
            Some(message) if !message.is_empty() => Err(PaymentError::ValidationError(message)),
            _ => Ok(()),
        }
    }

    /// Calls the adapter. A raised fault is captured into the outcome, never propagated.
    pub async fn invoke(
        &self,
        channel: &PaymentChannelRef,
        request: &UnifiedOrderRequest,
        order: &PayOrder,
        ctx: &MchAppConfigContext,
    ) -> DispatchOutcome {
        match channel.pay(request, order, ctx).await {
            Ok(response) => {
                info!(
                    pay_order_id = %order.pay_order_id,
                    if_code = channel.if_code(),
                    channel_state = %response.result.state,
                    "channel answered"
                );
                DispatchOutcome {
                    result: response.result,
                    pay_data_type: response.pay_data_type,
                    pay_data: response.pay_data,
                    fault: None,
                }
            }
            Err(fault) => {
                warn!(
                    pay_order_id = %order.pay_order_id,
                    if_code = channel.if_code(),
                    channel_state = %fault.result.state,
                    error = %fault.message,
                    "channel fault"
                );
                DispatchOutcome {
                    result: fault.result,
                    pay_data_type: PayDataType::None,
                    pay_data: None,
                    fault: Some(fault.message),
                }
            }
        }
    }
}
