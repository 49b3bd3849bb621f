//! Module which represents obdds.
//!
//! Variables are [labels][Label]; their order is fixed when the [Bdd] is created
//! and may differ from the numeric order of the labels.
use crate::{
    backend::{Backend, BoolOp},
    datatypes::*,
    error::{Result, TddError},
};
use derivative::Derivative;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};

/// Contains the data of (possibly) multiple roBDDs, managed over one collection of nodes.
/// It has a couple of methods to instantiate, update, and query properties on a given roBDD.
/// Each roBDD is identified by its corresponding [`Term`], which implicitly identifies the root node of a roBDD.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Bdd {
    pub(crate) nodes: Vec<BddNode>,
    cache: HashMap<BddNode, Term>,
    order: Vec<Label>,
    levels: HashMap<Label, usize>,
    #[derivative(Debug = "ignore")]
    ite_cache: HashMap<(Term, Term, Term), Term>,
}

/// Persisted form of one roBDD.
///
/// Nodes are listed children first; a child refers to `0` (⊥), `1` (⊤) or to the
/// entry `i - 2` of `nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BddBlob {
    /// Always [Bdd::KIND].
    pub kind: String,
    /// `(label, lo, hi)` triples.
    pub nodes: Vec<(Label, usize, usize)>,
    /// Index of the root.
    pub root: usize,
}

impl Display for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " ")?;
        for (idx, elem) in self.nodes.iter().enumerate() {
            writeln!(f, "{} {}", idx, *elem)?;
        }
        Ok(())
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Self::new()
    }
}

impl Bdd {
    /// Instantiate a new roBDD structure without any declared label.
    /// Constants for the [`⊤`][crate::datatypes::Term::TOP] and [`⊥`][crate::datatypes::Term::BOT] concepts are prepared in that step too.
    pub fn new() -> Self {
        Self {
            nodes: vec![BddNode::bot_node(), BddNode::top_node()],
            cache: HashMap::new(),
            order: Vec::new(),
            levels: HashMap::new(),
            ite_cache: HashMap::new(),
        }
    }

    /// Instantiate a new roBDD structure, where `order` lists the labels from the root downwards.
    pub fn with_order(order: Vec<Label>) -> Result<Self> {
        let mut result = Self::new();
        for label in order {
            if label.is_constant() || result.levels.contains_key(&label) {
                return Err(TddError::OrderingMismatch(format!(
                    "{} is listed twice or reserved",
                    label
                )));
            }
            result.declare(label);
        }
        Ok(result)
    }

    fn declare(&mut self, label: Label) -> usize {
        match self.levels.get(&label) {
            Some(level) => *level,
            None => {
                let level = self.order.len();
                self.order.push(label);
                self.levels.insert(label, level);
                log::trace!("declared {} at level {}", label, level);
                level
            }
        }
    }

    /// Position of `label` in the order; terminals are below every label.
    fn level(&self, label: Label) -> usize {
        self.levels.get(&label).copied().unwrap_or(usize::MAX)
    }

    fn term_level(&self, term: Term) -> usize {
        self.level(self.nodes[term.value()].var())
    }

    /// The variable order, from the root downwards.
    pub fn order(&self) -> &[Label] {
        &self.order
    }

    /// Instantiates a [label][Label] and returns the representing roBDD as a [`Term`].
    /// Labels unknown so far are appended to the bottom of the order.
    pub fn variable(&mut self, var: Label) -> Term {
        self.declare(var);
        self.node(var, Term::BOT, Term::TOP)
    }

    /// Instantiates a constant, which is either [true] or [false].
    pub fn constant(val: bool) -> Term {
        if val {
            Term::TOP
        } else {
            Term::BOT
        }
    }

    /// Returns an roBDD, which represents the negation of the given roBDD.
    pub fn not(&mut self, term: Term) -> Term {
        self.if_then_else(term, Term::BOT, Term::TOP)
    }

    /// Returns an roBDD, which represents the conjunction of the two given roBDDs.
    pub fn and(&mut self, term_a: Term, term_b: Term) -> Term {
        self.if_then_else(term_a, term_b, Term::BOT)
    }

    /// Returns an roBDD, which represents the disjunction of the two given roBDDs.
    pub fn or(&mut self, term_a: Term, term_b: Term) -> Term {
        self.if_then_else(term_a, Term::TOP, term_b)
    }

    /// Returns an roBDD, which represents the implication of the two given roBDDs.
    pub fn imp(&mut self, term_a: Term, term_b: Term) -> Term {
        self.if_then_else(term_a, term_b, Term::TOP)
    }

    /// Returns an roBDD, which represents the if and only if relation  of the two given roBDDs.
    pub fn iff(&mut self, term_a: Term, term_b: Term) -> Term {
        let not_b = self.not(term_b);
        self.if_then_else(term_a, term_b, not_b)
    }

    /// Returns an roBDD, which represents the exclusive disjunction of the two given roBDDs.
    pub fn xor(&mut self, term_a: Term, term_b: Term) -> Term {
        let not_b = self.not(term_b);
        self.if_then_else(term_a, not_b, term_b)
    }

    /// Restrict the value of a given [label][Label] to **val**.
    pub fn restrict(&mut self, tree: Term, var: Label, val: bool) -> Term {
        let mut memo = HashMap::new();
        self.restrict_memo(tree, var, val, &mut memo)
    }

    fn restrict_memo(
        &mut self,
        tree: Term,
        var: Label,
        val: bool,
        memo: &mut HashMap<Term, Term>,
    ) -> Term {
        if let Some(result) = memo.get(&tree) {
            return *result;
        }
        let node = self.nodes[tree.value()];
        let (node_level, var_level) = (self.level(node.var()), self.level(var));
        #[allow(clippy::collapsible_else_if)]
        let result = if tree.is_truth_value() || node_level > var_level {
            tree
        } else if node_level < var_level {
            let lonode = self.restrict_memo(node.lo(), var, val, memo);
            let hinode = self.restrict_memo(node.hi(), var, val, memo);
            self.node(node.var(), lonode, hinode)
        } else {
            if val {
                node.hi()
            } else {
                node.lo()
            }
        };
        memo.insert(tree, result);
        result
    }

    /// Cofactor with respect to the topmost label; the label must not be below `tree`'s root.
    fn top_cofactor(&self, tree: Term, level: usize, val: bool) -> Term {
        let node = self.nodes[tree.value()];
        if tree.is_truth_value() || self.level(node.var()) != level {
            tree
        } else if val {
            node.hi()
        } else {
            node.lo()
        }
    }

    /// Creates an roBDD, based on the relation of three roBDDs, which are in an `if-then-else` relation.
    pub fn if_then_else(&mut self, i: Term, t: Term, e: Term) -> Term {
        if i == Term::TOP {
            t
        } else if i == Term::BOT {
            e
        } else if t == e {
            t
        } else if t == Term::TOP && e == Term::BOT {
            i
        } else if let Some(result) = self.ite_cache.get(&(i, t, e)) {
            *result
        } else {
            let level = self
                .term_level(i)
                .min(self.term_level(t))
                .min(self.term_level(e));
            let minvar = self.order[level];
            let itop = self.top_cofactor(i, level, true);
            let ttop = self.top_cofactor(t, level, true);
            let etop = self.top_cofactor(e, level, true);
            let ibot = self.top_cofactor(i, level, false);
            let tbot = self.top_cofactor(t, level, false);
            let ebot = self.top_cofactor(e, level, false);

            let top_ite = self.if_then_else(itop, ttop, etop);
            let bot_ite = self.if_then_else(ibot, tbot, ebot);
            let result = self.node(minvar, bot_ite, top_ite);
            self.ite_cache.insert((i, t, e), result);
            result
        }
    }

    /// Creates a new node in the roBDD.
    /// It will not create duplicate nodes and uses already existing nodes, if applicable.
    pub fn node(&mut self, var: Label, lo: Term, hi: Term) -> Term {
        if lo == hi {
            lo
        } else {
            let node = BddNode::new(var, lo, hi);
            match self.cache.get(&node) {
                Some(t) => *t,
                None => {
                    let new_term = Term(self.nodes.len());
                    self.nodes.push(node);
                    self.cache.insert(node, new_term);
                    log::debug!("newterm: {} as {:?}", new_term, node);
                    new_term
                }
            }
        }
    }

    /// All terms reachable from `term`, including the terminals reached.
    fn reachable(&self, term: Term) -> HashSet<Term> {
        let mut seen = HashSet::new();
        let mut stack = vec![term];
        while let Some(current) = stack.pop() {
            if seen.insert(current) && !current.is_truth_value() {
                let node = self.nodes[current.value()];
                stack.push(node.lo());
                stack.push(node.hi());
            }
        }
        seen
    }

    /// Returns the set of labels the given roBDD depends on.
    pub fn var_dependencies(&self, tree: Term) -> HashSet<Label> {
        self.reachable(tree)
            .into_iter()
            .filter(|term| !term.is_truth_value())
            .map(|term| self.nodes[term.value()].var())
            .collect()
    }

    /// Computes the number of models of the roBDD over the labels in `universe`.
    ///
    /// Every label the roBDD depends on has to be part of `universe`; labels of `universe`
    /// which are skipped on a path count twice.
    pub fn models(&self, term: Term, universe: &[Label]) -> BigUint {
        // undeclared labels sit below the order but above the terminals
        let mut levels: Vec<usize> = universe
            .iter()
            .enumerate()
            .map(|(idx, label)| match self.levels.get(label) {
                Some(level) => *level,
                None => self.order.len() + idx,
            })
            .collect();
        levels.sort_unstable();
        levels.dedup();
        let in_universe: HashSet<usize> = levels.iter().copied().collect();
        // number of universe labels at or below a level
        let below = |level: usize| levels.len() - levels.partition_point(|l| *l < level);
        let mut memo: HashMap<Term, BigUint> = HashMap::new();
        let count = self.count_below(term, &below, &in_universe, &mut memo);
        count << (levels.len() - below(self.term_level(term)))
    }

    fn count_below(
        &self,
        term: Term,
        below: &dyn Fn(usize) -> usize,
        in_universe: &HashSet<usize>,
        memo: &mut HashMap<Term, BigUint>,
    ) -> BigUint {
        if term.is_false() {
            return BigUint::zero();
        }
        if term.is_true() {
            return BigUint::one();
        }
        if let Some(result) = memo.get(&term) {
            return result.clone();
        }
        let node = self.nodes[term.value()];
        let level = self.level(node.var());
        let own = usize::from(in_universe.contains(&level));
        let mut result = BigUint::zero();
        for child in [node.lo(), node.hi()] {
            let gap = below(level) - own - below(self.term_level(child));
            result += self.count_below(child, below, in_universe, memo) << gap;
        }
        memo.insert(term, result.clone());
        result
    }
}

impl Backend for Bdd {
    type Node = Term;
    type Layout = Vec<Label>;
    type Shape = ();
    type Blob = BddBlob;
    const KIND: &'static str = "bdd";

    fn layout_for(order: &[Label], _shape: ()) -> Result<Vec<Label>> {
        let layout = order.to_vec();
        Self::check_layout(&layout, order)?;
        Ok(layout)
    }

    /// Quantified labels go on top, where projecting them is cheapest.
    fn default_order(labels: &[Label], qvars: &[Label]) -> Vec<Label> {
        let quantified: HashSet<Label> = qvars.iter().copied().collect();
        qvars
            .iter()
            .copied()
            .chain(labels.iter().copied().filter(|label| !quantified.contains(label)))
            .collect()
    }

    fn check_layout(layout: &Vec<Label>, labels: &[Label]) -> Result<()> {
        let listed: HashSet<Label> = layout.iter().copied().collect();
        let expected: HashSet<Label> = labels.iter().copied().collect();
        if listed.len() != layout.len() {
            return Err(TddError::OrderingMismatch(
                "a label is listed more than once".to_string(),
            ));
        }
        if let Some(missing) = expected.difference(&listed).min() {
            return Err(TddError::OrderingMismatch(format!("{} is missing", missing)));
        }
        if let Some(extra) = listed.difference(&expected).min() {
            return Err(TddError::OrderingMismatch(format!("{} is not in use", extra)));
        }
        Ok(())
    }

    fn with_layout(layout: Vec<Label>) -> Result<Self> {
        Self::with_order(layout)
    }

    fn layout(&self) -> &Vec<Label> {
        &self.order
    }

    fn terminal(&self, value: bool) -> Term {
        Self::constant(value)
    }

    fn variable(&mut self, label: Label) -> Result<Term> {
        if label.is_constant() {
            return Err(TddError::UnknownLabel(label));
        }
        Ok(Bdd::variable(self, label))
    }

    fn negate(&mut self, node: Term) -> Term {
        self.not(node)
    }

    fn apply(&mut self, op: BoolOp, lhs: Term, rhs: Term) -> Term {
        match op {
            BoolOp::And => self.and(lhs, rhs),
            BoolOp::Or => self.or(lhs, rhs),
            BoolOp::Iff => self.iff(lhs, rhs),
            BoolOp::Xor => self.xor(lhs, rhs),
            BoolOp::Implies => self.imp(lhs, rhs),
        }
    }

    fn ite(&mut self, cond: Term, then: Term, other: Term) -> Term {
        self.if_then_else(cond, then, other)
    }

    fn cofactor(&mut self, node: Term, label: Label, value: bool) -> Term {
        self.restrict(node, label, value)
    }

    fn constant_value(&self, node: Term) -> Option<bool> {
        node.is_truth_value().then(|| node.is_true())
    }

    fn node_count(&self, node: Term) -> usize {
        self.reachable(node).len()
    }

    fn edge_count(&self, node: Term) -> usize {
        2 * self
            .reachable(node)
            .into_iter()
            .filter(|term| !term.is_truth_value())
            .count()
    }

    fn model_count(&self, node: Term, universe: &[Label]) -> BigUint {
        self.models(node, universe)
    }

    fn label_order(&self) -> Vec<Label> {
        self.order.clone()
    }

    fn export(&self, node: Term) -> BddBlob {
        let mut index: HashMap<Term, usize> = HashMap::from([(Term::BOT, 0), (Term::TOP, 1)]);
        let mut nodes = Vec::new();
        let mut stack = vec![(node, false)];
        while let Some((term, expanded)) = stack.pop() {
            if index.contains_key(&term) {
                continue;
            }
            let bdd_node = self.nodes[term.value()];
            if expanded {
                nodes.push((bdd_node.var(), index[&bdd_node.lo()], index[&bdd_node.hi()]));
                index.insert(term, nodes.len() + 1);
            } else {
                stack.push((term, true));
                stack.push((bdd_node.hi(), false));
                stack.push((bdd_node.lo(), false));
            }
        }
        BddBlob {
            kind: Self::KIND.to_string(),
            root: index[&node],
            nodes,
        }
    }

    fn import(&mut self, blob: &BddBlob) -> Result<Term> {
        const COMPONENT: &str = "diagram";
        if blob.kind != Self::KIND {
            return Err(TddError::corrupt(
                COMPONENT,
                format!("expected a {} diagram, found '{}'", Self::KIND, blob.kind),
            ));
        }
        let mut terms = vec![Term::BOT, Term::TOP];
        for (idx, (label, lo, hi)) in blob.nodes.iter().enumerate() {
            let level = match self.levels.get(label) {
                Some(level) => *level,
                None => {
                    return Err(TddError::corrupt(
                        COMPONENT,
                        format!("{} is not part of the variable order", label),
                    ))
                }
            };
            let (lo, hi) = match (terms.get(*lo), terms.get(*hi)) {
                (Some(lo), Some(hi)) => (*lo, *hi),
                _ => {
                    return Err(TddError::corrupt(
                        COMPONENT,
                        format!("node {} refers to a node not defined before it", idx + 2),
                    ))
                }
            };
            if self.term_level(lo) <= level || self.term_level(hi) <= level {
                return Err(TddError::corrupt(
                    COMPONENT,
                    format!("node {} violates the variable order", idx + 2),
                ));
            }
            terms.push(self.node(*label, lo, hi));
        }
        terms.get(blob.root).copied().ok_or_else(|| {
            TddError::corrupt(COMPONENT, format!("root {} does not exist", blob.root))
        })
    }
}
