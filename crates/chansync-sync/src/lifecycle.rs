//! # Order Lifecycle Driver
//!
//! Applies a resolved state-map entry to a local order.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. write invoice / shipment method from the entry                      │
//! │  2. for step in plan(action):                                           │
//! │       Quote             draft → quotation                               │
//! │       Confirm           quotation → confirmed                           │
//! │                         ✋ unresolved exception on the order:           │
//! │                            UnresolvedExceptionBlock, order unchanged    │
//! │       Process           confirmed → processing, draft shipment when     │
//! │                         the shipment method is `order`                  │
//! │       AdvanceShipments  draft → waiting → assigned (failures logged)    │
//! │       MarkDone          any → done                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cancelled order is left as it is: no methods written, no steps run.
//! Channels keep reporting orders the operator cancelled locally, and those
//! reports must not stop the rest of an import.

use tracing::{debug, info, warn};

use chansync_core::lifecycle::{next_state, plan};
use chansync_core::{
    CoreError, ExceptionTarget, LifecycleStep, Order, OrderState, ResolvedState, ShipmentMethod,
};
use chansync_db::Database;

use crate::error::SyncResult;

/// Drives orders through the local workflow.
#[derive(Debug, Clone)]
pub struct LifecycleDriver {
    db: Database,
}

impl LifecycleDriver {
    pub fn new(db: Database) -> Self {
        LifecycleDriver { db }
    }

    /// Applies a resolved entry to an order and returns the updated order.
    ///
    /// ## Returns
    /// * `Err(UnresolvedExceptionBlock)` - confirmation was blocked; steps
    ///   before it (methods, quote) stay applied
    pub async fn apply(&self, order: &Order, resolved: ResolvedState) -> SyncResult<Order> {
        let orders = self.db.orders();
        let stored = orders.get(&order.id).await?;
        if stored.state == OrderState::Cancelled {
            warn!(
                order_id = %stored.id,
                reference = %stored.reference,
                action = %resolved.action,
                "Order is cancelled, lifecycle not applied"
            );
            return Ok(stored);
        }

        orders
            .set_methods(&order.id, resolved.invoice_method, resolved.shipment_method)
            .await?;

        let mut current = orders.get(&order.id).await?;
        for &step in plan(resolved.action) {
            current = match self.step(&current, step).await {
                Ok(next) => next,
                Err(err) if step.is_best_effort() => {
                    warn!(order_id = %current.id, step = %step, error = %err, "Lifecycle step failed, continuing");
                    current
                }
                Err(err) => return Err(err),
            };
        }

        debug!(order_id = %current.id, action = %resolved.action, state = %current.state, "Lifecycle applied");
        Ok(current)
    }

    /// Confirms a quotation.
    ///
    /// Blocked while an unresolved exception targets the order.
    pub async fn confirm(&self, order_id: &str) -> SyncResult<Order> {
        let order = self.db.orders().get(order_id).await?;
        self.step(&order, LifecycleStep::Confirm).await
    }

    /// Runs one step. A step whose target state is already reached does
    /// nothing.
    async fn step(&self, order: &Order, step: LifecycleStep) -> SyncResult<Order> {
        let orders = self.db.orders();

        if step == LifecycleStep::AdvanceShipments {
            next_state(&order.id, order.state, step)?;
            self.advance_shipments(order).await?;
            return Ok(order.clone());
        }

        let Some(target) = next_state(&order.id, order.state, step)? else {
            return Ok(order.clone());
        };

        if step == LifecycleStep::Confirm {
            let target_ref = ExceptionTarget::Order(order.id.clone());
            if self.db.exceptions().has_unresolved(&target_ref).await? {
                return Err(CoreError::UnresolvedExceptionBlock {
                    order_reference: order.reference.clone(),
                }
                .into());
            }
        }

        orders.set_state(&order.id, target).await?;

        if step == LifecycleStep::Process
            && order.shipment_method == ShipmentMethod::Order
            && orders.shipments(&order.id).await?.is_empty()
        {
            orders
                .create_shipment(&order.id, order.carrier_id.as_deref())
                .await?;
            debug!(order_id = %order.id, "Draft shipment created");
        }

        info!(order_id = %order.id, step = %step, state = %target, "Order advanced");
        Ok(orders.get(&order.id).await?)
    }

    async fn advance_shipments(&self, order: &Order) -> SyncResult<()> {
        let orders = self.db.orders();
        for shipment in orders.shipments(&order.id).await? {
            let mut state = shipment.state;
            while let Some(next) = state.advance() {
                orders.set_shipment_state(&shipment.id, next).await?;
                state = next;
            }
        }
        Ok(())
    }
}
