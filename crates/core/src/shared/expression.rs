use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of facial expression labels.
///
/// Declaration order is the canonical order used for tie-breaking and for
/// every per-label array in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const COUNT: usize = 7;

    pub const ALL: [Expression; Self::COUNT] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    /// Position in canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Expression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.label() == s)
            .ok_or_else(|| format!("unknown expression label '{s}'"))
    }
}

/// Per-label probabilities for one detected face.
///
/// Scores are independent (they need not sum to 1) and are clamped to `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    scores: [f64; Expression::COUNT],
}

impl ExpressionScores {
    pub fn new(scores: [f64; Expression::COUNT]) -> Self {
        let mut clamped = scores;
        for s in &mut clamped {
            *s = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) };
        }
        Self { scores: clamped }
    }

    pub fn get(&self, expression: Expression) -> f64 {
        self.scores[expression.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Expression, f64)> + '_ {
        Expression::ALL.into_iter().zip(self.scores.iter().copied())
    }

    /// Highest-scoring label; ties go to the earlier label in canonical order.
    pub fn dominant(&self) -> Expression {
        let mut best = Expression::Neutral;
        let mut best_score = self.scores[0];
        for (expression, score) in self.iter().skip(1) {
            if score > best_score {
                best = expression;
                best_score = score;
            }
        }
        best
    }
}
