use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::shared::expression::Expression;

/// Tally shared between the annotation loop (writer) and the shell (reader).
pub type SharedTally = Arc<Mutex<ExpressionTally>>;

/// Running count of dominant expressions, one increment per detected face.
///
/// Counts only grow until [`reset`](Self::reset) zeroes all of them at once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpressionTally {
    counts: [u64; Expression::COUNT],
}

impl ExpressionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTally {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn increment(&mut self, expression: Expression) {
        let slot = &mut self.counts[expression.index()];
        *slot = slot.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.counts = [0; Expression::COUNT];
    }

    pub fn count(&self, expression: Expression) -> u64 {
        self.counts[expression.index()]
    }

    /// Owned copy of the current counts.
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            counts: self.counts,
        }
    }
}

/// Point-in-time copy of an [`ExpressionTally`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    counts: [u64; Expression::COUNT],
}

impl TallySnapshot {
    pub fn get(&self, expression: Expression) -> u64 {
        self.counts[expression.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Expression, u64)> + '_ {
        Expression::ALL.into_iter().zip(self.counts.iter().copied())
    }
}

impl Serialize for TallySnapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Expression::COUNT))?;
        for (expression, count) in self.iter() {
            map.serialize_entry(&expression, &count)?;
        }
        map.end()
    }
}

impl fmt::Display for TallySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (expression, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{expression}: {count}")?;
        }
        Ok(())
    }
}
