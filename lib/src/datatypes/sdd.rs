//! Handles for sentential decision diagrams and their vtrees.
use super::Label;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Handle of an SDD node inside an [SddManager][crate::sdd::SddManager].
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct SddId(pub u32);

impl SddId {
    /// The constant false.
    pub const FALSE: SddId = SddId(0);
    /// The constant true.
    pub const TRUE: SddId = SddId(1);

    /// Returns the position of the node in the manager's node table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks whether the handle is one of the two constants.
    pub fn is_constant(self) -> bool {
        self.0 <= Self::TRUE.0
    }
}

impl Display for SddId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SddId({})", self.0)
    }
}

/// Handle of a node in a [Vtree][crate::sdd::Vtree].
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct VtreeId(pub usize);

impl Display for VtreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VtreeId({})", self.0)
    }
}

/// A (prime, sub) pair of a decision node.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub struct Element {
    /// The guard of the element.
    pub prime: SddId,
    /// The value under the guard.
    pub sub: SddId,
}

impl Element {
    /// Creates a new element.
    pub fn new(prime: SddId, sub: SddId) -> Self {
        Self { prime, sub }
    }
}

/// One node of the SDD node table.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum SddNode {
    /// The constant false.
    False,
    /// The constant true.
    True,
    /// A literal over a label, normalized at the label's vtree leaf.
    Literal(Label, bool),
    /// A decision node normalized at an internal vtree node.
    /// The elements are compressed, trimmed and sorted.
    Decision(VtreeId, Vec<Element>),
}

impl Display for SddNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SddNode::False => write!(f, "False"),
            SddNode::True => write!(f, "True"),
            SddNode::Literal(label, true) => write!(f, "{}", label),
            SddNode::Literal(label, false) => write!(f, "¬{}", label),
            SddNode::Decision(vtree, elements) => {
                write!(f, "Decision@{}[", vtree)?;
                for (idx, element) in elements.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({}, {})", element.prime, element.sub)?;
                }
                write!(f, "]")
            }
        }
    }
}
