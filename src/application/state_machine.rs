use crate::domain::channel::ChannelResult;
use crate::domain::order::{OrderState, PayOrder, TerminalState};
use crate::domain::ports::{OrderStoreRef, TerminalUpdate};
use crate::error::{PaymentError, Result};
use tracing::{debug, warn};

/// Owns every write to an order's state.
///
/// Each transition is a single conditional write in the store, so the
/// synchronous dispatch path, webhooks and re-queries can race on one order
/// and exactly one of them wins.
#[derive(Clone)]
pub struct OrderStateMachine {
    store: OrderStoreRef,
}

impl OrderStateMachine {
    pub fn new(store: OrderStoreRef) -> Self {
        Self { store }
    }

    /// `INIT -> ING`, stamping the chosen interface and way code.
    /// Returns `false` when the order is not currently `INIT`.
    pub async fn advance_to_in_progress(
        &self,
        pay_order_id: &str,
        if_code: &str,
        way_code: &str,
    ) -> Result<bool> {
        let updated = self
            .store
            .update_init_to_ing(pay_order_id, if_code, way_code)
            .await?;
        debug!(pay_order_id, if_code, way_code, updated, "INIT -> ING");
        Ok(updated)
    }

    /// `ING -> SUCCESS | FAIL`. Returns `false` when the order is not currently `ING`.
    pub async fn resolve_terminal(
        &self,
        pay_order_id: &str,
        state: TerminalState,
        channel_order_no: Option<String>,
        err_code: Option<String>,
        err_msg: Option<String>,
    ) -> Result<bool> {
        let update = TerminalUpdate {
            state,
            channel_order_no,
            err_code,
            err_msg,
        };
        let updated = self
            .store
            .update_ing_to_terminal(pay_order_id, update)
            .await?;
        debug!(pay_order_id, ?state, updated, "ING -> terminal");
        Ok(updated)
    }

    /// Moves a fresh order to `ING` and updates the snapshot.
    pub async fn start(&self, order: &mut PayOrder) -> Result<()> {
        let if_code = order.if_code.clone().ok_or_else(|| {
            PaymentError::internal(format!(
                "order {} has no channel interface",
                order.pay_order_id
            ))
        })?;

        if !self
            .advance_to_in_progress(&order.pay_order_id, &if_code, &order.way_code)
            .await?
        {
            warn!(pay_order_id = %order.pay_order_id, "order left INIT concurrently");
            return Err(PaymentError::StateConflict {
                pay_order_id: order.pay_order_id.clone(),
                expected: OrderState::Init,
            });
        }

        self.reload(order).await
    }

    /// Resolves an `ING` order with the channel's verdict and updates the snapshot.
    pub async fn complete(
        &self,
        order: &mut PayOrder,
        target: TerminalState,
        result: &ChannelResult,
    ) -> Result<()> {
        if !self
            .resolve_terminal(
                &order.pay_order_id,
                target,
                result.channel_order_id.clone(),
                result.channel_err_code.clone(),
                result.channel_err_msg.clone(),
            )
            .await?
        {
            warn!(
                pay_order_id = %order.pay_order_id,
                ?target,
                "order already resolved concurrently"
            );
            return Err(PaymentError::StateConflict {
                pay_order_id: order.pay_order_id.clone(),
                expected: OrderState::Ing,
            });
        }

        self.reload(order).await
    }

    /// `INIT -> ING -> target`; either lost race aborts with `StateConflict`.
    pub async fn transition_from_init(
        &self,
        order: &mut PayOrder,
        target: TerminalState,
        result: &ChannelResult,
    ) -> Result<()> {
        self.start(order).await?;
        self.complete(order, target, result).await
    }

    /// Replaces the snapshot with what the store wrote, timestamps included.
    async fn reload(&self, order: &mut PayOrder) -> Result<()> {
        let stored = self.store.get(&order.pay_order_id).await?.ok_or_else(|| {
            PaymentError::internal(format!(
                "order {} vanished after update",
                order.pay_order_id
            ))
        })?;
        *order = stored;
        Ok(())
    }
}
