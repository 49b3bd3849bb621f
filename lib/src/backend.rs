/*!
The interface every decision diagram engine offers to the compiler.

A [Backend] owns its node table; diagrams are plain [Copy] handles into that
table. Model enumeration is implemented once on top of the cofactor operation,
see [ModelIter].
*/
use crate::{
    datatypes::{Label, Literal},
    error::Result,
};
use derivative::Derivative;
use num_bigint::BigUint;
use serde::{de::DeserializeOwned, Serialize};
use std::{cell::RefCell, collections::HashMap, fmt::Debug, hash::Hash, rc::Rc};

/// Binary connectives understood by [Backend::apply].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// Conjunction
    And,
    /// Disjunction
    Or,
    /// Equivalence
    Iff,
    /// Exclusive disjunction
    Xor,
    /// Implication, left to right
    Implies,
}

/// A manager of canonical decision diagrams over [labels][Label].
pub trait Backend: Sized + Debug {
    /// Handle of a diagram.
    type Node: Copy + Eq + Hash + Debug;
    /// Variable order or vtree the manager is built on.
    type Layout: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    /// Parameters to derive a [Backend::Layout] from a label order.
    type Shape: Clone + Copy + Debug + Default;
    /// Persisted form of a single diagram.
    type Blob: Serialize + DeserializeOwned;
    /// Name of the backend as written to persisted state.
    const KIND: &'static str;

    /// Derives a layout over exactly the given labels, in the given order.
    /// Fails with [TddError::OrderingMismatch][crate::error::TddError::OrderingMismatch] if a label repeats.
    fn layout_for(order: &[Label], shape: Self::Shape) -> Result<Self::Layout>;

    /// The label order used when the caller supplies neither a layout nor an ordering.
    /// `qvars` are the labels which get projected away after the build.
    fn default_order(labels: &[Label], qvars: &[Label]) -> Vec<Label> {
        let _ = qvars;
        labels.to_vec()
    }

    /// Checks that `layout` covers exactly `labels`.
    /// Fails with [TddError::OrderingMismatch][crate::error::TddError::OrderingMismatch] otherwise.
    fn check_layout(layout: &Self::Layout, labels: &[Label]) -> Result<()>;

    /// Creates an empty manager on the given layout.
    fn with_layout(layout: Self::Layout) -> Result<Self>;

    /// The layout of the manager.
    fn layout(&self) -> &Self::Layout;

    /// The constant diagram.
    fn terminal(&self, value: bool) -> Self::Node;

    /// The diagram of a single positive label.
    fn variable(&mut self, label: Label) -> Result<Self::Node>;

    /// Negation.
    fn negate(&mut self, node: Self::Node) -> Self::Node;

    /// Combines two diagrams.
    fn apply(&mut self, op: BoolOp, lhs: Self::Node, rhs: Self::Node) -> Self::Node;

    /// If-then-else.
    fn ite(&mut self, cond: Self::Node, then: Self::Node, other: Self::Node) -> Self::Node {
        let pos = self.apply(BoolOp::And, cond, then);
        let neg_cond = self.negate(cond);
        let neg = self.apply(BoolOp::And, neg_cond, other);
        self.apply(BoolOp::Or, pos, neg)
    }

    /// Fixes `label` to `value`.
    fn cofactor(&mut self, node: Self::Node, label: Label, value: bool) -> Self::Node;

    /// Existential quantification of `label`.
    fn exists(&mut self, node: Self::Node, label: Label) -> Self::Node {
        let hi = self.cofactor(node, label, true);
        let lo = self.cofactor(node, label, false);
        self.apply(BoolOp::Or, hi, lo)
    }

    /// `Some(value)` if `node` is a constant.
    fn constant_value(&self, node: Self::Node) -> Option<bool>;

    /// Returns true if `node` is the constant true.
    fn is_true(&self, node: Self::Node) -> bool {
        self.constant_value(node) == Some(true)
    }

    /// Returns true if `node` is the constant false.
    fn is_false(&self, node: Self::Node) -> bool {
        self.constant_value(node) == Some(false)
    }

    /// Number of nodes of the diagram, never zero.
    fn node_count(&self, node: Self::Node) -> usize;

    /// Number of edges of the diagram.
    fn edge_count(&self, node: Self::Node) -> usize;

    /// Number of satisfying assignments over `universe`.
    /// Labels of the diagram outside `universe` must have been quantified away.
    fn model_count(&self, node: Self::Node, universe: &[Label]) -> BigUint;

    /// All labels of the layout, in the order enumeration visits them.
    fn label_order(&self) -> Vec<Label>;

    /// Serialises the diagram rooted at `node`.
    fn export(&self, node: Self::Node) -> Self::Blob;

    /// Rebuilds a diagram written by [Backend::export] on this manager.
    fn import(&mut self, blob: &Self::Blob) -> Result<Self::Node>;
}

/// Lazily enumerates the satisfying assignments of a diagram over a set of care labels.
///
/// Each assignment is total over the care labels, listed in the backend's
/// [label order][Backend::label_order]; labels the diagram does not depend on
/// are expanded into both polarities.
/// The iterator borrows the manager mutably on every step, so the manager must not be
/// borrowed elsewhere while [Iterator::next] runs.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ModelIter<B: Backend> {
    #[derivative(Debug = "ignore")]
    backend: Rc<RefCell<B>>,
    care: Vec<Label>,
    stack: Vec<(B::Node, Vec<bool>)>,
}

impl<B: Backend> ModelIter<B> {
    /// Starts the enumeration of `root` over `care`.
    pub fn new(backend: Rc<RefCell<B>>, root: B::Node, care: &[Label]) -> Self {
        let care = sort_by_backend_order(&*backend.borrow(), care);
        Self {
            backend,
            care,
            stack: vec![(root, Vec::new())],
        }
    }
}

impl<B: Backend> Iterator for ModelIter<B> {
    type Item = Vec<Literal>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, mut values)) = self.stack.pop() {
            let mut backend = self.backend.borrow_mut();
            if backend.is_false(node) {
                continue;
            }
            let depth = values.len();
            if depth == self.care.len() {
                return Some(
                    self.care
                        .iter()
                        .zip(values)
                        .map(|(label, positive)| Literal::new(*label, positive))
                        .collect(),
                );
            }
            let label = self.care[depth];
            let lo = backend.cofactor(node, label, false);
            let hi = backend.cofactor(node, label, true);
            if !backend.is_false(lo) {
                let mut lo_values = values.clone();
                lo_values.push(false);
                self.stack.push((lo, lo_values));
            }
            if !backend.is_false(hi) {
                values.push(true);
                self.stack.push((hi, values));
            }
        }
        None
    }
}

fn sort_by_backend_order<B: Backend>(backend: &B, care: &[Label]) -> Vec<Label> {
    let position: HashMap<Label, usize> = backend
        .label_order()
        .into_iter()
        .enumerate()
        .map(|(idx, label)| (label, idx))
        .collect();
    let mut sorted = care.to_vec();
    sorted.sort_by_key(|label| (position.get(label).copied().unwrap_or(usize::MAX), *label));
    sorted.dedup();
    sorted
}
