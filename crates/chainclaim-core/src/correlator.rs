//! Ordinal-indexed result slots.
//!
//! Outcomes arrive in completion order; the slot array puts them back in
//! ordinal order and enforces "exactly one outcome per ordinal".

use crate::error::DispatchError;
use crate::task::Outcome;

/// Fixed-size slot array, one slot per task ordinal (`ordinal - 1`).
#[derive(Debug)]
pub struct ResultSlots {
    slots: Vec<Option<Outcome>>,
    filled: usize,
}

impl ResultSlots {
    /// Pre-allocate `len` empty slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| None).collect(),
            filled: 0,
        }
    }

    /// Record the outcome for its ordinal.
    ///
    /// A second write to the same slot means an outcome was delivered twice
    /// and is reported as [`DispatchError::DuplicateOutcome`]; the slot keeps
    /// its first value.
    pub fn record(&mut self, outcome: Outcome) -> Result<(), DispatchError> {
        let ordinal = outcome.ordinal;
        let batch = self.slots.len();
        let slot = ordinal
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| self.slots.get_mut(idx))
            .ok_or(DispatchError::UnknownOrdinal { ordinal, batch })?;

        if slot.is_some() {
            return Err(DispatchError::DuplicateOutcome { ordinal });
        }
        *slot = Some(outcome);
        self.filled += 1;
        Ok(())
    }

    /// Outcome recorded for `ordinal`, if any.
    pub fn get(&self, ordinal: u64) -> Option<&Outcome> {
        let idx = usize::try_from(ordinal.checked_sub(1)?).ok()?;
        self.slots.get(idx)?.as_ref()
    }

    /// Total number of slots (the batch size).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots holding an outcome.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Ordinals that have no outcome yet, ascending.
    pub fn missing(&self) -> Vec<u64> {
        self.slots
            .iter()
            .zip(1u64..)
            .filter(|(slot, _)| slot.is_none())
            .map(|(_, ordinal)| ordinal)
            .collect()
    }

    /// Consume the slots in ordinal order.
    pub fn into_outcomes(self) -> Vec<Option<Outcome>> {
        self.slots
    }
}
