//! Diagram labels and signed literals over them.
use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Deref, str::FromStr};

/// Representation of a diagram label.
/// Each theory atom of a compiled formula is abstracted to exactly one label,
/// numbered from `1` onwards in the order the atoms were first seen.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Label(pub u32);

impl Deref for Label {
    type Target = u32;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<u32> for Label {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Label({})", self.0)
    }
}

impl Label {
    /// Marks the terminal node "Top" in a node table.
    pub const TOP: Label = Label(u32::MAX);
    /// Marks the terminal node "Bot" in a node table.
    pub const BOT: Label = Label(u32::MAX - 1);

    /// Returns the value of the [Label] as [u32].
    pub fn value(self) -> u32 {
        self.0
    }

    /// Returns the value as an index into label-indexed tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true if the label marks a terminal (i.e. Top or Bot).
    pub fn is_constant(&self) -> bool {
        self.value() >= Label::BOT.value()
    }
}

/// A [Label] together with a polarity.
///
/// The textual form follows the usual DIMACS convention: `3` is the positive
/// literal of label 3 and `-3` its negation.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Literal {
    /// The label the literal is about.
    pub label: Label,
    /// `true` for the positive occurrence.
    pub positive: bool,
}

impl Literal {
    /// Creates a new literal.
    pub fn new(label: Label, positive: bool) -> Self {
        Self { label, positive }
    }

    /// Returns the literal with flipped polarity.
    pub fn negated(self) -> Self {
        Self {
            label: self.label,
            positive: !self.positive,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.positive {
            write!(f, "{}", self.label.0)
        } else {
            write!(f, "-{}", self.label.0)
        }
    }
}

impl From<i32> for Literal {
    fn from(val: i32) -> Self {
        Self::new(Label(val.unsigned_abs()), val >= 0)
    }
}

/// Error returned when a [Literal] cannot be read from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a literal, expected a non-zero integer such as 3 or -3")]
pub struct ParseLiteralError(pub String);

impl FromStr for Literal {
    type Err = ParseLiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (positive, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, trimmed),
        };
        match digits.parse::<u32>() {
            Ok(value) if value > 0 && value < Label::BOT.value() => {
                Ok(Literal::new(Label(value), positive))
            }
            _ => Err(ParseLiteralError(s.to_string())),
        }
    }
}
