use crate::application::notify::MerchantNotifier;
use crate::application::requery::RequeryScheduler;
use crate::application::state_machine::OrderStateMachine;
use crate::domain::channel::{ChannelResult, ChannelState};
use crate::domain::order::{OrderState, PayOrder, TerminalState};
use crate::domain::ports::OrderStoreRef;
use crate::error::{PaymentError, Result};
use tracing::{debug, info};

/// How an asynchronous channel result landed on a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingResolution {
    Resolved(OrderState),
    /// The channel still has no final answer; the order stays `ING`.
    StillPending,
}

/// Applies a channel verdict to an order: state transition first, then side effects.
///
/// A lost conditional update aborts before any side effect runs, so a path
/// that loses the race never notifies or schedules twice.
#[derive(Clone)]
pub struct OutcomeHandler {
    machine: OrderStateMachine,
    store: OrderStoreRef,
    notifier: MerchantNotifier,
    requery: RequeryScheduler,
}

impl OutcomeHandler {
    pub fn new(
        machine: OrderStateMachine,
        store: OrderStoreRef,
        notifier: MerchantNotifier,
        requery: RequeryScheduler,
    ) -> Self {
        Self {
            machine,
            store,
            notifier,
            requery,
        }
    }

    /// Applies the result of the synchronous channel call to a fresh `INIT` order.
    pub async fn handle(&self, order: &mut PayOrder, result: &ChannelResult) -> Result<()> {
        match result.state {
            ChannelState::ConfirmSuccess => {
                self.machine
                    .transition_from_init(order, TerminalState::Success, result)
                    .await?;
                self.notifier.notify_on_terminal_outcome(order).await;
            }
            ChannelState::ConfirmFail => {
                self.machine
                    .transition_from_init(order, TerminalState::Fail, result)
                    .await?;
            }
            ChannelState::Waiting | ChannelState::Unknown | ChannelState::ApiRetError => {
                self.machine.start(order).await?;
            }
            ChannelState::SysError => {
                debug!(
                    pay_order_id = %order.pay_order_id,
                    "system error from channel, order left as persisted"
                );
                return Ok(());
            }
        }

        if result.need_query {
            self.requery.schedule(&order.pay_order_id).await;
        }

        info!(
            pay_order_id = %order.pay_order_id,
            channel_state = %result.state,
            order_state = %order.state,
            "channel outcome applied"
        );
        Ok(())
    }

    /// Applies a result from the asynchronous path (webhook or re-query) to an
    /// order already in `ING`. Only the caller whose update wins notifies.
    pub async fn handle_pending(
        &self,
        pay_order_id: &str,
        result: &ChannelResult,
    ) -> Result<PendingResolution> {
        let mut order = self
            .store
            .get(pay_order_id)
            .await?
            .ok_or_else(|| PaymentError::validation(format!("order {pay_order_id} not found")))?;

        let target = match result.state {
            ChannelState::ConfirmSuccess => TerminalState::Success,
            ChannelState::ConfirmFail => TerminalState::Fail,
            ChannelState::Waiting
            | ChannelState::Unknown
            | ChannelState::ApiRetError
            | ChannelState::SysError => return Ok(PendingResolution::StillPending),
        };

        self.machine.complete(&mut order, target, result).await?;
        if target == TerminalState::Success {
            self.notifier.notify_on_terminal_outcome(&order).await;
        }

        info!(pay_order_id, order_state = %order.state, "pending order resolved");
        Ok(PendingResolution::Resolved(order.state))
    }
}
