use crate::error::StoreError;
use crate::types::PlanStatus;

/// Validates a plan status transition.
///
/// Stores call this inside their compare-and-set, so an illegal transition
/// never reaches persistence.
pub fn validate_transition(from: PlanStatus, to: PlanStatus) -> Result<(), StoreError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: PlanStatus) -> Vec<PlanStatus> {
    use PlanStatus::*;
    match from {
        Proposed => vec![Superseded, Confirmed],
        Confirmed => vec![Running],
        Running => vec![Completed, Failed],
        Superseded => vec![],
        Completed => vec![],
        Failed => vec![],
    }
}

fn allowed(from: PlanStatus, to: PlanStatus) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
