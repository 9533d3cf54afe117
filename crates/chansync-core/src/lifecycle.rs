//! # Order Lifecycle Plans
//!
//! Pure part of the order lifecycle driver: which workflow steps a resolved
//! action implies, and which order state each step leads to.
//!
//! ## Plans
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  do_not_import          (nothing)                                       │
//! │  process_manually       Quote ─▶ Confirm                                │
//! │  process_automatically  Quote ─▶ Confirm ─▶ Process ─▶ AdvanceShipments │
//! │  import_as_past         MarkDone                                        │
//! │                                                                         │
//! │  draft ─Quote─▶ quotation ─Confirm─▶ confirmed ─Process─▶ processing    │
//! │    └──────────────────MarkDone────────────────────────────▶ done       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps are idempotent: a step whose target state the order has already
//! reached is a no-op, so re-applying a plan to an existing order is safe.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::state_map::OrderAction;
use crate::types::OrderState;

/// One step of the local order workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStep {
    Quote,
    /// Blocked while the order has unresolved exceptions.
    Confirm,
    Process,
    /// Moves draft shipments towards assigned. Failures are not fatal.
    AdvanceShipments,
    /// Historical import, straight to done.
    MarkDone,
}

impl LifecycleStep {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LifecycleStep::Quote => "quote",
            LifecycleStep::Confirm => "confirm",
            LifecycleStep::Process => "process",
            LifecycleStep::AdvanceShipments => "advance shipments",
            LifecycleStep::MarkDone => "mark done",
        }
    }

    /// Checks if a failure of this step is logged instead of propagated.
    pub const fn is_best_effort(&self) -> bool {
        matches!(self, LifecycleStep::AdvanceShipments)
    }
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The steps a resolved action applies, in order.
pub fn plan(action: OrderAction) -> &'static [LifecycleStep] {
    match action {
        OrderAction::DoNotImport => &[],
        OrderAction::ProcessManually => &[LifecycleStep::Quote, LifecycleStep::Confirm],
        OrderAction::ProcessAutomatically => &[
            LifecycleStep::Quote,
            LifecycleStep::Confirm,
            LifecycleStep::Process,
            LifecycleStep::AdvanceShipments,
        ],
        OrderAction::ImportAsPast => &[LifecycleStep::MarkDone],
    }
}

/// Order state after applying `step` to an order in `current`.
///
/// ## Returns
/// * `Ok(Some(state))` - the order moves to `state`
/// * `Ok(None)` - nothing to change (already there, or a shipment-only step)
/// * `Err(InvalidTransition)` - the current state forbids the step
pub fn next_state(
    order_id: &str,
    current: OrderState,
    step: LifecycleStep,
) -> CoreResult<Option<OrderState>> {
    let invalid = || CoreError::InvalidTransition {
        entity: "Order".to_string(),
        id: order_id.to_string(),
        current: current.to_string(),
        step: step.to_string(),
    };

    let (from, to) = match step {
        LifecycleStep::Quote => (OrderState::Draft, OrderState::Quotation),
        LifecycleStep::Confirm => (OrderState::Quotation, OrderState::Confirmed),
        LifecycleStep::Process => (OrderState::Confirmed, OrderState::Processing),
        LifecycleStep::AdvanceShipments => {
            return match current {
                OrderState::Cancelled => Err(invalid()),
                _ => Ok(None),
            };
        }
        LifecycleStep::MarkDone => {
            return match current {
                OrderState::Done => Ok(None),
                OrderState::Cancelled => Err(invalid()),
                _ => Ok(Some(OrderState::Done)),
            };
        }
    };

    let rank = current.rank().ok_or_else(invalid)?;
    let (from_rank, to_rank) = (from.rank(), to.rank());
    if Some(rank) >= to_rank {
        Ok(None)
    } else if Some(rank) == from_rank {
        Ok(Some(to))
    } else {
        Err(invalid())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plans() {
        assert!(plan(OrderAction::DoNotImport).is_empty());
        assert_eq!(plan(OrderAction::ProcessManually).len(), 2);
        assert_eq!(
            plan(OrderAction::ProcessAutomatically).last(),
            Some(&LifecycleStep::AdvanceShipments)
        );
        assert_eq!(plan(OrderAction::ImportAsPast), &[LifecycleStep::MarkDone]);
    }

    #[test]
    fn test_forward_walk() {
        let mut state = OrderState::Draft;
        for step in plan(OrderAction::ProcessAutomatically) {
            if let Some(next) = next_state("o", state, *step).unwrap() {
                state = next;
            }
        }
        assert_eq!(state, OrderState::Processing);
    }

    #[test]
    fn test_steps_are_idempotent() {
        assert_eq!(
            next_state("o", OrderState::Confirmed, LifecycleStep::Quote).unwrap(),
            None
        );
        assert_eq!(
            next_state("o", OrderState::Done, LifecycleStep::MarkDone).unwrap(),
            None
        );
    }

    #[test]
    fn test_confirm_requires_quotation() {
        let err = next_state("o-7", OrderState::Draft, LifecycleStep::Confirm).unwrap_err();
        assert!(err.to_string().contains("o-7"));
        assert!(next_state("o", OrderState::Cancelled, LifecycleStep::MarkDone).is_err());
    }

    #[test]
    fn test_mark_done_from_draft() {
        assert_eq!(
            next_state("o", OrderState::Draft, LifecycleStep::MarkDone).unwrap(),
            Some(OrderState::Done)
        );
    }
}
