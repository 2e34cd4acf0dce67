use serde::{Deserialize, Serialize};

use crate::turns::Turn;

/// Maximum number of turns kept in a transcript after a session cycle.
pub const MAX_HISTORY: usize = 20;

/// Ordered, length-bounded conversation transcript. Pure data structure:
/// no I/O, safe to use from concurrent cycles without coordination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(Vec<Turn>);

impl Ledger {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Sanitize stored input: an absent document field is an empty transcript.
    pub fn from_stored(turns: Option<Vec<Turn>>) -> Self {
        Self(turns.unwrap_or_default())
    }

    /// Append a turn at the tail.
    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    /// Drop the oldest turns until at most `max_len` remain.
    /// Never touches the tail; the drop count floors at zero.
    pub fn trim(&mut self, max_len: usize) {
        let excess = self.0.len().saturating_sub(max_len);
        if excess > 0 {
            drop(self.0.drain(..excess));
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.0
    }
}

impl From<Vec<Turn>> for Ledger {
    fn from(turns: Vec<Turn>) -> Self {
        Self(turns)
    }
}
