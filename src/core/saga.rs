//! Explicit saga for multi-entity mutations
//!
//! A saga is an ordered list of steps, each paired with a compensating
//! action. Steps apply in order; if one fails, the compensations of the
//! already-applied steps run in reverse order and the original error is
//! surfaced. What rolls back on partial failure is thereby a declared
//! part of the operation, not implicit control flow.
//!
//! Compensation is best-effort: if a compensating action itself fails,
//! the ledger may be left in a detectably inconsistent state. That
//! failure is logged at error level and surfaced as an integrity error
//! carrying the compensation failure, displacing the original error.

use crate::types::LedgerError;
use tracing::{error, warn};

type Action = Box<dyn FnOnce() -> Result<(), LedgerError>>;

/// One step of a saga: an action and its compensation
pub struct Step {
    name: &'static str,
    apply: Action,
    compensate: Action,
}

impl Step {
    /// Create a step
    ///
    /// `compensate` runs only if `apply` succeeded and a later step
    /// failed; it must restore whatever `apply` changed.
    pub fn new(
        name: &'static str,
        apply: impl FnOnce() -> Result<(), LedgerError> + 'static,
        compensate: impl FnOnce() -> Result<(), LedgerError> + 'static,
    ) -> Self {
        Step {
            name,
            apply: Box::new(apply),
            compensate: Box::new(compensate),
        }
    }

    /// Create a final step with nothing to undo
    ///
    /// Useful for the last step of a saga, whose compensation can never
    /// run.
    pub fn irreversible(
        name: &'static str,
        apply: impl FnOnce() -> Result<(), LedgerError> + 'static,
    ) -> Self {
        Step::new(name, apply, || Ok(()))
    }
}

/// An ordered, compensating sequence of mutations
pub struct Saga {
    name: &'static str,
    steps: Vec<Step>,
}

impl Saga {
    /// Start building a saga
    pub fn new(name: &'static str) -> Self {
        Saga {
            name,
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Apply all steps in order, compensating on failure
    ///
    /// # Errors
    ///
    /// On a step failure, returns that step's error after all completed
    /// steps were compensated in reverse order. If a compensation fails,
    /// returns [`LedgerError::Integrity`] describing the failed
    /// compensation instead.
    pub fn run(self) -> Result<(), LedgerError> {
        let mut applied: Vec<(&'static str, Action)> = Vec::new();

        for step in self.steps {
            match (step.apply)() {
                Ok(()) => applied.push((step.name, step.compensate)),
                Err(err) => {
                    warn!(
                        saga = self.name,
                        step = step.name,
                        error = %err,
                        "saga step failed, compensating"
                    );
                    for (name, compensate) in applied.into_iter().rev() {
                        if let Err(comp_err) = compensate() {
                            error!(
                                saga = self.name,
                                step = name,
                                error = %comp_err,
                                "compensation failed, ledger may be inconsistent"
                            );
                            return Err(LedgerError::integrity(format!(
                                "compensation of {name} in {} failed: {comp_err}",
                                self.name
                            )));
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
