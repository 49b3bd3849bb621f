//! Module which represents sentential decision diagrams.
//!
//! All diagrams of an [SddManager] are compressed and trimmed with respect to
//! one fixed [Vtree], hence equivalent diagrams share the same [SddId].
mod vtree;

pub use vtree::{Vtree, VtreeNode, VtreeShape};

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

/// Node table and caches of all SDDs over one vtree.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SddManager {
    vtree: Vtree,
    nodes: Vec<SddNode>,
    unique: HashMap<SddNode, SddId>,
    #[derivative(Debug = "ignore")]
    negations: HashMap<SddId, SddId>,
    #[derivative(Debug = "ignore")]
    apply_cache: HashMap<(bool, SddId, SddId), SddId>,
}

/// One entry of an [SddBlob].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SddEntry {
    /// A literal.
    Literal(Label, bool),
    /// A decision node with `(prime, sub)` references.
    Decision(VtreeId, Vec<(usize, usize)>),
}

/// Persisted form of one SDD.
///
/// Entries are listed children first; a reference is `0` (false), `1` (true) or
/// the entry `i - 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SddBlob {
    /// Always [SddManager::KIND].
    pub kind: String,
    /// The nodes.
    pub nodes: Vec<SddEntry>,
    /// Index of the root.
    pub root: usize,
}

impl Display for SddManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " ")?;
        for (idx, elem) in self.nodes.iter().enumerate() {
            writeln!(f, "{} {}", idx, elem)?;
        }
        Ok(())
    }
}

impl SddManager {
    /// Creates a manager on `vtree` with the two constants in place.
    pub fn new(vtree: Vtree) -> Self {
        Self {
            vtree,
            nodes: vec![SddNode::False, SddNode::True],
            unique: HashMap::new(),
            negations: HashMap::from([(SddId::FALSE, SddId::TRUE), (SddId::TRUE, SddId::FALSE)]),
            apply_cache: HashMap::new(),
        }
    }

    /// The vtree of the manager.
    pub fn vtree(&self) -> &Vtree {
        &self.vtree
    }

    /// The node behind `id`.
    pub fn node(&self, id: SddId) -> &SddNode {
        &self.nodes[id.index()]
    }

    /// The constant [SddId] of `value`.
    pub fn constant(value: bool) -> SddId {
        if value {
            SddId::TRUE
        } else {
            SddId::FALSE
        }
    }

    fn insert(&mut self, node: SddNode) -> SddId {
        match self.unique.get(&node) {
            Some(id) => *id,
            None => {
                let id = SddId(self.nodes.len() as u32);
                log::debug!("newterm: {} as {}", id, node);
                self.nodes.push(node.clone());
                self.unique.insert(node, id);
                id
            }
        }
    }

    /// The literal of `label`; fails if the vtree has no leaf for it.
    pub fn literal(&mut self, label: Label, positive: bool) -> Result<SddId> {
        if self.vtree.leaf(label).is_none() {
            return Err(TddError::UnknownLabel(label));
        }
        Ok(self.insert(SddNode::Literal(label, positive)))
    }

    /// The vtree node `id` is normalized for; `None` for the constants.
    pub fn node_vtree(&self, id: SddId) -> Option<VtreeId> {
        match self.node(id) {
            SddNode::False | SddNode::True => None,
            SddNode::Literal(label, _) => self.vtree.leaf(*label),
            SddNode::Decision(vtree, _) => Some(*vtree),
        }
    }

    /// Negation, computed by negating the subs.
    pub fn not(&mut self, id: SddId) -> SddId {
        if let Some(result) = self.negations.get(&id) {
            return *result;
        }
        let result = match self.node(id).clone() {
            SddNode::False => SddId::TRUE,
            SddNode::True => SddId::FALSE,
            SddNode::Literal(label, positive) => self.insert(SddNode::Literal(label, !positive)),
            SddNode::Decision(vtree, elements) => {
                let negated = elements
                    .into_iter()
                    .map(|e| Element::new(e.prime, self.not(e.sub)))
                    .collect();
                self.build_node(vtree, negated)
            }
        };
        self.negations.insert(id, result);
        self.negations.insert(result, id);
        result
    }

    /// Conjunction.
    pub fn and(&mut self, f: SddId, g: SddId) -> SddId {
        self.apply_and_or(f, g, true)
    }

    /// Disjunction.
    pub fn or(&mut self, f: SddId, g: SddId) -> SddId {
        self.apply_and_or(f, g, false)
    }

    fn apply_and_or(&mut self, f: SddId, g: SddId, is_and: bool) -> SddId {
        let (zero, one) = if is_and {
            (SddId::FALSE, SddId::TRUE)
        } else {
            (SddId::TRUE, SddId::FALSE)
        };
        if f == zero || g == zero {
            return zero;
        }
        if f == one || f == g {
            return g;
        }
        if g == one {
            return f;
        }
        if self.negations.get(&f) == Some(&g) {
            return zero;
        }
        let key = (is_and, f.min(g), f.max(g));
        if let Some(result) = self.apply_cache.get(&key) {
            return *result;
        }
        let result = match (self.node_vtree(f), self.node_vtree(g)) {
            (Some(vf), Some(vg)) if vf == vg && self.vtree.left(vf).is_none() => {
                // two different literals of the same label are complementary
                zero
            }
            (Some(vf), Some(vg)) => {
                let lca = self.vtree.lca(vf, vg);
                let lhs = self.elements(f, lca);
                let rhs = self.elements(g, lca);
                let mut product = Vec::with_capacity(lhs.len() * rhs.len());
                for e1 in &lhs {
                    for e2 in &rhs {
                        let prime = self.and(e1.prime, e2.prime);
                        if prime == SddId::FALSE {
                            continue;
                        }
                        let sub = self.apply_and_or(e1.sub, e2.sub, is_and);
                        product.push(Element::new(prime, sub));
                    }
                }
                self.build_node(lca, product)
            }
            _ => unreachable!("constants are handled above"),
        };
        self.apply_cache.insert(key, result);
        result
    }

    /// The elements of `id` as a partition at the vtree node `at`, which is `id`'s
    /// vtree node or one of its ancestors.
    fn elements(&mut self, id: SddId, at: VtreeId) -> Vec<Element> {
        if let SddNode::Decision(vtree, elements) = self.node(id) {
            if *vtree == at {
                return elements.clone();
            }
        }
        match self.node_vtree(id) {
            Some(vtree) if self.vtree.is_left_of(vtree, at) => {
                let negated = self.not(id);
                vec![Element::new(id, SddId::TRUE), Element::new(negated, SddId::FALSE)]
            }
            _ => vec![Element::new(SddId::TRUE, id)],
        }
    }

    /// Compresses and trims the elements and looks the node up in the unique table.
    fn build_node(&mut self, vtree: VtreeId, elements: Vec<Element>) -> SddId {
        let mut compressed: Vec<Element> = Vec::with_capacity(elements.len());
        let mut by_sub: HashMap<SddId, usize> = HashMap::new();
        for element in elements.into_iter().filter(|e| e.prime != SddId::FALSE) {
            match by_sub.get(&element.sub) {
                Some(idx) => {
                    let idx = *idx;
                    compressed[idx].prime = self.or(compressed[idx].prime, element.prime);
                }
                None => {
                    by_sub.insert(element.sub, compressed.len());
                    compressed.push(element);
                }
            }
        }
        match compressed.as_slice() {
            [] => SddId::FALSE,
            [single] => single.sub,
            [a, b] if a.sub == SddId::TRUE && b.sub == SddId::FALSE => a.prime,
            [a, b] if a.sub == SddId::FALSE && b.sub == SddId::TRUE => b.prime,
            _ => {
                compressed.sort_unstable();
                self.insert(SddNode::Decision(vtree, compressed))
            }
        }
    }

    /// Fixes `label` to `value`.
    pub fn condition(&mut self, id: SddId, label: Label, value: bool) -> SddId {
        let leaf = match self.vtree.leaf(label) {
            Some(leaf) => leaf,
            None => return id,
        };
        let mut memo = HashMap::new();
        self.condition_memo(id, label, leaf, value, &mut memo)
    }

    fn condition_memo(
        &mut self,
        id: SddId,
        label: Label,
        leaf: VtreeId,
        value: bool,
        memo: &mut HashMap<SddId, SddId>,
    ) -> SddId {
        if let Some(result) = memo.get(&id) {
            return *result;
        }
        let result = match self.node(id).clone() {
            SddNode::False | SddNode::True => id,
            SddNode::Literal(lit, positive) if lit == label => Self::constant(positive == value),
            SddNode::Literal(..) => id,
            SddNode::Decision(vtree, _) if !self.vtree.is_within(leaf, vtree) => id,
            SddNode::Decision(vtree, elements) => {
                let in_primes = self.vtree.is_left_of(leaf, vtree);
                let conditioned = elements
                    .into_iter()
                    .map(|e| {
                        if in_primes {
                            let prime = self.condition_memo(e.prime, label, leaf, value, memo);
                            Element::new(prime, e.sub)
                        } else {
                            let sub = self.condition_memo(e.sub, label, leaf, value, memo);
                            Element::new(e.prime, sub)
                        }
                    })
                    .collect();
                self.build_node(vtree, conditioned)
            }
        };
        memo.insert(id, result);
        result
    }

    /// All decision nodes reachable from `id`.
    fn decisions(&self, id: SddId) -> HashSet<SddId> {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let SddNode::Decision(_, elements) = self.node(current) {
                if seen.insert(current) {
                    for e in elements {
                        stack.push(e.prime);
                        stack.push(e.sub);
                    }
                }
            }
        }
        seen
    }

    /// Number of models over the labels of `universe`.
    ///
    /// Labels of the diagram outside `universe` are assumed to be quantified away.
    pub fn models(&self, id: SddId, universe: &[Label]) -> BigUint {
        let mut inside: Vec<usize> = Vec::new();
        let mut outside = 0usize;
        for label in universe.iter().collect::<HashSet<_>>() {
            match self.vtree.leaf(*label) {
                Some(leaf) => inside.push(self.vtree.position(leaf)),
                None => outside += 1,
            }
        }
        inside.sort_unstable();
        let count_under = |vtree: Option<VtreeId>| match vtree {
            None => 0,
            Some(vtree) => {
                let (start, end) = self.vtree.span(vtree);
                inside.partition_point(|p| *p <= end) - inside.partition_point(|p| *p < start)
            }
        };
        let mut memo = HashMap::new();
        let local = self.count_local(id, &count_under, &mut memo);
        local << (inside.len() - count_under(self.node_vtree(id)) + outside)
    }

    fn count_local(
        &self,
        id: SddId,
        count_under: &dyn Fn(Option<VtreeId>) -> usize,
        memo: &mut HashMap<SddId, BigUint>,
    ) -> BigUint {
        if let Some(result) = memo.get(&id) {
            return result.clone();
        }
        let result = match self.node(id) {
            SddNode::False => BigUint::zero(),
            SddNode::True | SddNode::Literal(..) => BigUint::one(),
            SddNode::Decision(vtree, elements) => {
                let left = count_under(self.vtree.left(*vtree));
                let right = count_under(self.vtree.right(*vtree));
                let mut total = BigUint::zero();
                for e in elements.iter().filter(|e| e.sub != SddId::FALSE) {
                    let prime = self.count_local(e.prime, count_under, memo)
                        << (left - count_under(self.node_vtree(e.prime)));
                    let sub = self.count_local(e.sub, count_under, memo)
                        << (right - count_under(self.node_vtree(e.sub)));
                    total += prime * sub;
                }
                total
            }
        };
        memo.insert(id, result.clone());
        result
    }
}

impl Backend for SddManager {
    type Node = SddId;
    type Layout = Vtree;
    type Shape = VtreeShape;
    type Blob = SddBlob;
    const KIND: &'static str = "sdd";

    fn layout_for(order: &[Label], shape: VtreeShape) -> Result<Vtree> {
        Vtree::new(order, shape)
    }

    fn check_layout(layout: &Vtree, labels: &[Label]) -> Result<()> {
        let listed: HashSet<Label> = layout.labels().into_iter().collect();
        let expected: HashSet<Label> = labels.iter().copied().collect();
        if let Some(missing) = expected.difference(&listed).min() {
            return Err(TddError::OrderingMismatch(format!(
                "{} has no leaf in the vtree",
                missing
            )));
        }
        if let Some(extra) = listed.difference(&expected).min() {
            return Err(TddError::OrderingMismatch(format!("{} is not in use", extra)));
        }
        Ok(())
    }

    fn with_layout(layout: Vtree) -> Result<Self> {
        Ok(Self::new(layout))
    }

    fn layout(&self) -> &Vtree {
        &self.vtree
    }

    fn terminal(&self, value: bool) -> SddId {
        Self::constant(value)
    }

    fn variable(&mut self, label: Label) -> Result<SddId> {
        self.literal(label, true)
    }

    fn negate(&mut self, node: SddId) -> SddId {
        self.not(node)
    }

    fn apply(&mut self, op: BoolOp, lhs: SddId, rhs: SddId) -> SddId {
        match op {
            BoolOp::And => self.and(lhs, rhs),
            BoolOp::Or => self.or(lhs, rhs),
            BoolOp::Implies => {
                let not_lhs = self.not(lhs);
                self.or(not_lhs, rhs)
            }
            BoolOp::Xor => {
                let not_lhs = self.not(lhs);
                let not_rhs = self.not(rhs);
                let left = self.and(lhs, not_rhs);
                let right = self.and(not_lhs, rhs);
                self.or(left, right)
            }
            BoolOp::Iff => {
                let xor = self.apply(BoolOp::Xor, lhs, rhs);
                self.not(xor)
            }
        }
    }

    fn cofactor(&mut self, node: SddId, label: Label, value: bool) -> SddId {
        self.condition(node, label, value)
    }

    fn constant_value(&self, node: SddId) -> Option<bool> {
        node.is_constant().then(|| node == SddId::TRUE)
    }

    fn node_count(&self, node: SddId) -> usize {
        self.decisions(node).len().max(1)
    }

    fn edge_count(&self, node: SddId) -> usize {
        self.decisions(node)
            .into_iter()
            .map(|id| match self.node(id) {
                SddNode::Decision(_, elements) => elements.len(),
                _ => 0,
            })
            .sum()
    }

    fn model_count(&self, node: SddId, universe: &[Label]) -> BigUint {
        self.models(node, universe)
    }

    fn label_order(&self) -> Vec<Label> {
        self.vtree.labels()
    }

    fn export(&self, node: SddId) -> SddBlob {
        let mut index: HashMap<SddId, usize> =
            HashMap::from([(SddId::FALSE, 0), (SddId::TRUE, 1)]);
        let mut nodes = Vec::new();
        let mut stack = vec![(node, false)];
        while let Some((id, expanded)) = stack.pop() {
            if index.contains_key(&id) {
                continue;
            }
            match self.node(id) {
                SddNode::Literal(label, positive) => {
                    nodes.push(SddEntry::Literal(*label, *positive));
                    index.insert(id, nodes.len() + 1);
                }
                SddNode::Decision(vtree, elements) if expanded => {
                    let refs = elements
                        .iter()
                        .map(|e| (index[&e.prime], index[&e.sub]))
                        .collect();
                    nodes.push(SddEntry::Decision(*vtree, refs));
                    index.insert(id, nodes.len() + 1);
                }
                SddNode::Decision(_, elements) => {
                    stack.push((id, true));
                    for e in elements {
                        stack.push((e.sub, false));
                        stack.push((e.prime, false));
                    }
                }
                SddNode::False | SddNode::True => {}
            }
        }
        SddBlob {
            kind: Self::KIND.to_string(),
            root: index[&node],
            nodes,
        }
    }

    fn import(&mut self, blob: &SddBlob) -> Result<SddId> {
        const COMPONENT: &str = "diagram";
        if blob.kind != Self::KIND {
            return Err(TddError::corrupt(
                COMPONENT,
                format!("expected a {} diagram, found '{}'", Self::KIND, blob.kind),
            ));
        }
        let mut ids = vec![SddId::FALSE, SddId::TRUE];
        for (idx, entry) in blob.nodes.iter().enumerate() {
            let id = match entry {
                SddEntry::Literal(label, positive) => self
                    .literal(*label, *positive)
                    .map_err(|err| TddError::corrupt(COMPONENT, err))?,
                SddEntry::Decision(vtree, refs) => {
                    if vtree.0 >= self.vtree.len() || self.vtree.left(*vtree).is_none() {
                        return Err(TddError::corrupt(
                            COMPONENT,
                            format!("entry {} uses {} which is not an internal vtree node", idx + 2, vtree),
                        ));
                    }
                    let mut result = SddId::FALSE;
                    for (prime, sub) in refs {
                        let (prime, sub) = match (ids.get(*prime), ids.get(*sub)) {
                            (Some(prime), Some(sub)) => (*prime, *sub),
                            _ => {
                                return Err(TddError::corrupt(
                                    COMPONENT,
                                    format!("entry {} refers to an entry not defined before it", idx + 2),
                                ))
                            }
                        };
                        let element = self.and(prime, sub);
                        result = self.or(result, element);
                    }
                    result
                }
            };
            ids.push(id);
        }
        ids.get(blob.root).copied().ok_or_else(|| {
            TddError::corrupt(COMPONENT, format!("root {} does not exist", blob.root))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn labels(n: u32) -> Vec<Label> {
        (1..=n).map(Label).collect()
    }

    fn manager(n: u32, shape: VtreeShape) -> SddManager {
        SddManager::new(Vtree::new(&labels(n), shape).unwrap())
    }

    #[test]
    fn constants_and_literals() {
        let mut sdd = manager(2, VtreeShape::Balanced);
        let a = sdd.literal(Label(1), true).unwrap();
        let na = sdd.not(a);
        assert_eq!(sdd.literal(Label(1), false).unwrap(), na);
        assert_eq!(sdd.and(a, na), SddId::FALSE);
        assert_eq!(sdd.or(a, na), SddId::TRUE);
        assert_eq!(sdd.and(a, SddId::TRUE), a);
        assert!(matches!(
            sdd.literal(Label(9), true),
            Err(TddError::UnknownLabel(Label(9)))
        ));
    }

    #[test]
    fn canonicity() {
        for shape in [VtreeShape::Balanced, VtreeShape::Right, VtreeShape::Left, VtreeShape::Vertical] {
            let mut sdd = manager(3, shape);
            let a = sdd.literal(Label(1), true).unwrap();
            let b = sdd.literal(Label(2), true).unwrap();
            let c = sdd.literal(Label(3), true).unwrap();
            // a & (b | c) == (a & b) | (a & c)
            let b_or_c = sdd.or(b, c);
            let lhs = sdd.and(a, b_or_c);
            let ab = sdd.and(a, b);
            let ac = sdd.and(a, c);
            let rhs = sdd.or(ab, ac);
            assert_eq!(lhs, rhs);
            // de morgan
            let nab = sdd.not(ab);
            let na = sdd.not(a);
            let nb = sdd.not(b);
            assert_eq!(nab, sdd.or(na, nb));
            // tautology collapses
            let imp = sdd.apply(BoolOp::Implies, ab, a);
            assert_eq!(imp, SddId::TRUE);
            let iff = sdd.apply(BoolOp::Iff, lhs, rhs);
            assert_eq!(iff, SddId::TRUE);
        }
    }

    #[test]
    fn conditioning_and_quantification() {
        let mut sdd = manager(3, VtreeShape::Balanced);
        let a = sdd.literal(Label(1), true).unwrap();
        let b = sdd.literal(Label(2), true).unwrap();
        let c = sdd.literal(Label(3), true).unwrap();
        let ab = sdd.and(a, b);
        let f = sdd.or(ab, c);
        assert_eq!(sdd.condition(f, Label(1), false), c);
        let b_or_c = sdd.or(b, c);
        assert_eq!(sdd.condition(f, Label(1), true), b_or_c);
        let a_or_c = sdd.or(a, c);
        assert_eq!(sdd.condition(f, Label(2), true), a_or_c);
        assert_eq!(sdd.condition(f, Label(3), true), SddId::TRUE);
        assert_eq!(Backend::exists(&mut sdd, ab, Label(2)), a);
        let xor = sdd.apply(BoolOp::Xor, a, c);
        assert_eq!(Backend::exists(&mut sdd, xor, Label(1)), SddId::TRUE);
    }

    #[test]
    fn counting() {
        let mut sdd = manager(3, VtreeShape::Right);
        let a = sdd.literal(Label(1), true).unwrap();
        let b = sdd.literal(Label(2), true).unwrap();
        let c = sdd.literal(Label(3), true).unwrap();
        let three = labels(3);
        assert_eq!(sdd.models(SddId::TRUE, &three), BigUint::from(8u32));
        assert_eq!(sdd.models(SddId::FALSE, &three), BigUint::zero());
        assert_eq!(sdd.models(a, &three), BigUint::from(4u32));
        let ac = sdd.and(a, c);
        assert_eq!(sdd.models(ac, &three), BigUint::from(2u32));
        let a_or_b = sdd.or(a, b);
        let f = sdd.and(c, a_or_b);
        assert_eq!(sdd.models(f, &three), BigUint::from(3u32));
        assert_eq!(sdd.models(a_or_b, &labels(2)), BigUint::from(3u32));
        assert_eq!(sdd.models(SddId::TRUE, &[]), BigUint::one());
    }

    #[test]
    fn sizes() {
        let mut sdd = manager(2, VtreeShape::Balanced);
        let a = sdd.literal(Label(1), true).unwrap();
        let b = sdd.literal(Label(2), true).unwrap();
        assert_eq!(sdd.node_count(a), 1);
        assert_eq!(sdd.edge_count(a), 0);
        let ab = sdd.and(a, b);
        assert_eq!(sdd.node_count(ab), 1);
        assert_eq!(sdd.edge_count(ab), 2);
        assert_eq!(sdd.node_count(SddId::FALSE), 1);
    }

    #[test]
    fn export_import() {
        let mut sdd = manager(4, VtreeShape::Balanced);
        let lits: Vec<SddId> = labels(4)
            .into_iter()
            .map(|label| sdd.literal(label, true).unwrap())
            .collect();
        let x = sdd.apply(BoolOp::Xor, lits[0], lits[3]);
        let y = sdd.and(lits[1], lits[2]);
        let f = sdd.or(x, y);
        let blob = sdd.export(f);
        let json = serde_json::to_string(&blob).unwrap();

        let mut other = SddManager::new(sdd.vtree().clone());
        let g = other.import(&serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(other.models(g, &labels(4)), sdd.models(f, &labels(4)));
        assert_eq!(other.export(g), blob);

        let broken = SddBlob {
            kind: "sdd".to_string(),
            nodes: vec![SddEntry::Decision(VtreeId(0), vec![(0, 1)])],
            root: 2,
        };
        assert!(matches!(
            other.import(&broken),
            Err(TddError::CorruptPersistedState { .. })
        ));
        let unknown = SddBlob {
            kind: "sdd".to_string(),
            nodes: vec![SddEntry::Literal(Label(11), true)],
            root: 2,
        };
        assert!(other.import(&unknown).is_err());
    }

    #[test]
    fn empty_vtree() {
        let mut sdd = manager(0, VtreeShape::Balanced);
        assert!(sdd.literal(Label(1), true).is_err());
        assert_eq!(sdd.models(SddId::TRUE, &[]), BigUint::one());
        assert!(sdd.label_order().is_empty());
    }
}
