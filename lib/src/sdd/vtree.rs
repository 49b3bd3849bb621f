//! Variable trees.
//!
//! A vtree is a full binary tree whose leaves are the [labels][Label] of an
//! [SddManager][super::SddManager]. Every internal node splits the labels below
//! it into a left (prime) and a right (sub) part.
use crate::{
    datatypes::{Label, VtreeId},
    error::{Result, TddError},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strum::{EnumString, EnumVariantNames};

/// How [Vtree::new] arranges an ordered list of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum VtreeShape {
    /// Both halves of every split have (almost) the same number of labels.
    #[default]
    Balanced,
    /// Every right child is a leaf.
    Left,
    /// Every left child is a leaf.
    Right,
    /// Alternates between a leaf on the left and a leaf on the right.
    Vertical,
    /// Splits at random positions, seeded by the number of labels.
    Random,
}

/// A vtree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VtreeNode {
    /// A leaf carrying one label.
    Leaf(Label),
    /// An internal node with its left and right child.
    Internal(VtreeId, VtreeId),
}

#[derive(Serialize, Deserialize)]
struct RawVtree {
    nodes: Vec<VtreeNode>,
    root: Option<VtreeId>,
}

/// A variable tree; the tree without labels has no root.
///
/// The in-order traversal of the leaves lists the labels in the order they were
/// given to [Vtree::new].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVtree", into = "RawVtree")]
pub struct Vtree {
    nodes: Vec<VtreeNode>,
    root: Option<VtreeId>,
    parents: Vec<Option<VtreeId>>,
    depths: Vec<usize>,
    positions: Vec<usize>,
    spans: Vec<(usize, usize)>,
    leaves: HashMap<Label, VtreeId>,
}

impl Vtree {
    /// Arranges the labels of `order` in the given shape.
    pub fn new(order: &[Label], shape: VtreeShape) -> Result<Self> {
        let mut nodes = Vec::new();
        let root = if order.is_empty() {
            None
        } else {
            let mut rng = StdRng::seed_from_u64(order.len() as u64);
            Some(Self::build(order, shape, true, &mut rng, &mut nodes))
        };
        Self::from_parts(nodes, root)
    }

    fn build(
        labels: &[Label],
        shape: VtreeShape,
        right_turn: bool,
        rng: &mut StdRng,
        nodes: &mut Vec<VtreeNode>,
    ) -> VtreeId {
        if let [label] = labels {
            nodes.push(VtreeNode::Leaf(*label));
            return VtreeId(nodes.len() - 1);
        }
        let mid = match shape {
            VtreeShape::Balanced => labels.len() / 2,
            VtreeShape::Left => labels.len() - 1,
            VtreeShape::Right => 1,
            VtreeShape::Vertical if right_turn => 1,
            VtreeShape::Vertical => labels.len() - 1,
            VtreeShape::Random => rng.gen_range(1..labels.len()),
        };
        let left = Self::build(&labels[..mid], shape, !right_turn, rng, nodes);
        let right = Self::build(&labels[mid..], shape, !right_turn, rng, nodes);
        nodes.push(VtreeNode::Internal(left, right));
        VtreeId(nodes.len() - 1)
    }

    /// Validates the tree structure and computes the navigation tables.
    fn from_parts(nodes: Vec<VtreeNode>, root: Option<VtreeId>) -> Result<Self> {
        let invalid = |reason: String| Err(TddError::OrderingMismatch(reason));
        let mut vtree = Self {
            parents: vec![None; nodes.len()],
            depths: vec![0; nodes.len()],
            positions: vec![0; nodes.len()],
            spans: vec![(0, 0); nodes.len()],
            leaves: HashMap::new(),
            nodes,
            root,
        };
        let root = match root {
            Some(root) if root.0 < vtree.nodes.len() => root,
            Some(root) => return invalid(format!("root {} does not exist", root)),
            None if vtree.nodes.is_empty() => return Ok(vtree),
            None => return invalid("a vtree with nodes needs a root".to_string()),
        };

        // in-order traversal: (node, children visited)
        let mut visited = HashSet::new();
        let mut stack = vec![(root, false)];
        let mut position = 0;
        while let Some((id, expanded)) = stack.pop() {
            match vtree.nodes[id.0] {
                VtreeNode::Leaf(label) => {
                    if !visited.insert(id) {
                        return invalid(format!("{} is reachable twice", id));
                    }
                    if label.is_constant() || vtree.leaves.insert(label, id).is_some() {
                        return invalid(format!("{} appears on more than one leaf", label));
                    }
                    vtree.positions[id.0] = position;
                    vtree.spans[id.0] = (position, position);
                    position += 1;
                }
                VtreeNode::Internal(left, right) if !expanded => {
                    if !visited.insert(id) {
                        return invalid(format!("{} is reachable twice", id));
                    }
                    for child in [left, right] {
                        if child.0 >= vtree.nodes.len() {
                            return invalid(format!("child {} of {} does not exist", child, id));
                        }
                        vtree.parents[child.0] = Some(id);
                        vtree.depths[child.0] = vtree.depths[id.0] + 1;
                    }
                    // the right subtree is finished after the node itself is placed
                    stack.push((right, false));
                    stack.push((id, true));
                    stack.push((left, false));
                }
                VtreeNode::Internal(left, _) => {
                    vtree.positions[id.0] = position;
                    vtree.spans[id.0].0 = vtree.spans[left.0].0;
                    position += 1;
                }
            }
        }
        if visited.len() != vtree.nodes.len() {
            return invalid("some vtree nodes are not reachable from the root".to_string());
        }
        // spans end at the last position of the right subtree, children before parents
        let mut by_depth: Vec<usize> = (0..vtree.nodes.len()).collect();
        by_depth.sort_unstable_by_key(|idx| std::cmp::Reverse(vtree.depths[*idx]));
        for idx in by_depth {
            if let VtreeNode::Internal(_, right) = vtree.nodes[idx] {
                vtree.spans[idx].1 = vtree.spans[right.0].1;
            }
        }
        Ok(vtree)
    }

    /// The root, `None` for the vtree without labels.
    pub fn root(&self) -> Option<VtreeId> {
        self.root
    }

    /// The node behind `id`.
    pub fn node(&self, id: VtreeId) -> VtreeNode {
        self.nodes[id.0]
    }

    /// Number of vtree nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the vtree has no labels.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The leaf of `label`.
    pub fn leaf(&self, label: Label) -> Option<VtreeId> {
        self.leaves.get(&label).copied()
    }

    /// The left child of an internal node.
    pub fn left(&self, id: VtreeId) -> Option<VtreeId> {
        match self.nodes[id.0] {
            VtreeNode::Internal(left, _) => Some(left),
            VtreeNode::Leaf(_) => None,
        }
    }

    /// The right child of an internal node.
    pub fn right(&self, id: VtreeId) -> Option<VtreeId> {
        match self.nodes[id.0] {
            VtreeNode::Internal(_, right) => Some(right),
            VtreeNode::Leaf(_) => None,
        }
    }

    /// In-order position of `id`.
    pub fn position(&self, id: VtreeId) -> usize {
        self.positions[id.0]
    }

    /// Returns true if `id` lies in the subtree rooted at `ancestor` (inclusive).
    pub fn is_within(&self, id: VtreeId, ancestor: VtreeId) -> bool {
        let (start, end) = self.spans[ancestor.0];
        (start..=end).contains(&self.positions[id.0])
    }

    /// Returns true if `id` lies in the left subtree of `ancestor`.
    pub fn is_left_of(&self, id: VtreeId, ancestor: VtreeId) -> bool {
        self.left(ancestor)
            .map_or(false, |left| self.is_within(id, left))
    }

    /// The lowest common ancestor of two nodes.
    pub fn lca(&self, mut a: VtreeId, mut b: VtreeId) -> VtreeId {
        while a != b {
            if self.depths[a.0] >= self.depths[b.0] {
                match self.parents[a.0] {
                    Some(parent) => a = parent,
                    None => return a,
                }
            } else {
                match self.parents[b.0] {
                    Some(parent) => b = parent,
                    None => return b,
                }
            }
        }
        a
    }

    /// The labels from left to right.
    pub fn labels(&self) -> Vec<Label> {
        let mut leaves: Vec<(usize, Label)> = self
            .leaves
            .iter()
            .map(|(label, id)| (self.positions[id.0], *label))
            .collect();
        leaves.sort_unstable();
        leaves.into_iter().map(|(_, label)| label).collect()
    }

    /// In-order positions spanned by the subtree of `id`.
    pub(crate) fn span(&self, id: VtreeId) -> (usize, usize) {
        self.spans[id.0]
    }
}

impl TryFrom<RawVtree> for Vtree {
    type Error = TddError;

    fn try_from(raw: RawVtree) -> Result<Self> {
        Self::from_parts(raw.nodes, raw.root)
    }
}

impl From<Vtree> for RawVtree {
    fn from(vtree: Vtree) -> Self {
        RawVtree {
            nodes: vtree.nodes,
            root: vtree.root,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;
    use test_log::test;

    fn labels(n: u32) -> Vec<Label> {
        (1..=n).map(Label).collect()
    }

    fn depth_of(vtree: &Vtree, label: Label) -> usize {
        let mut depth = 0;
        let mut current = vtree.leaf(label).unwrap();
        while let Some(parent) = vtree.parents[current.0] {
            current = parent;
            depth += 1;
        }
        depth
    }

    #[test]
    fn shapes() {
        let order = labels(4);
        let right = Vtree::new(&order, VtreeShape::Right).unwrap();
        let root = right.root().unwrap();
        assert_eq!(right.node(right.left(root).unwrap()), VtreeNode::Leaf(Label(1)));
        assert_eq!(depth_of(&right, Label(4)), 3);

        let left = Vtree::new(&order, VtreeShape::Left).unwrap();
        let root = left.root().unwrap();
        assert_eq!(left.node(left.right(root).unwrap()), VtreeNode::Leaf(Label(4)));
        assert_eq!(depth_of(&left, Label(1)), 3);

        let balanced = Vtree::new(&order, VtreeShape::Balanced).unwrap();
        assert!(order.iter().all(|label| depth_of(&balanced, *label) == 2));

        let vertical = Vtree::new(&order, VtreeShape::Vertical).unwrap();
        let root = vertical.root().unwrap();
        assert_eq!(vertical.node(vertical.left(root).unwrap()), VtreeNode::Leaf(Label(1)));
        let inner = vertical.right(root).unwrap();
        assert_eq!(vertical.node(vertical.right(inner).unwrap()), VtreeNode::Leaf(Label(4)));

        for shape in [
            VtreeShape::Balanced,
            VtreeShape::Left,
            VtreeShape::Right,
            VtreeShape::Vertical,
            VtreeShape::Random,
        ] {
            let vtree = Vtree::new(&order, shape).unwrap();
            assert_eq!(vtree.labels(), order);
            assert_eq!(vtree.len(), 7);
        }
    }

    #[test]
    fn random_is_reproducible() {
        let order = labels(9);
        assert_eq!(
            Vtree::new(&order, VtreeShape::Random).unwrap(),
            Vtree::new(&order, VtreeShape::Random).unwrap()
        );
    }

    #[test]
    fn empty_and_single() {
        let empty = Vtree::new(&[], VtreeShape::Balanced).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.root(), None);
        assert!(empty.labels().is_empty());

        let single = Vtree::new(&[Label(5)], VtreeShape::Left).unwrap();
        assert_eq!(single.root(), single.leaf(Label(5)));
    }

    #[test]
    fn navigation() {
        let vtree = Vtree::new(&labels(4), VtreeShape::Balanced).unwrap();
        let root = vtree.root().unwrap();
        let one = vtree.leaf(Label(1)).unwrap();
        let two = vtree.leaf(Label(2)).unwrap();
        let three = vtree.leaf(Label(3)).unwrap();
        assert_eq!(vtree.lca(one, three), root);
        let left = vtree.left(root).unwrap();
        assert_eq!(vtree.lca(one, two), left);
        assert_eq!(vtree.lca(one, left), left);
        assert!(vtree.is_left_of(one, root));
        assert!(vtree.is_left_of(one, left));
        assert!(!vtree.is_left_of(two, left));
        assert!(vtree.is_within(two, left));
        assert!(!vtree.is_within(three, left));
        assert_eq!(vtree.span(root), (0, 6));
        assert_eq!(vtree.position(root), 3);
    }

    #[test]
    fn serde_validates() {
        let vtree = Vtree::new(&labels(3), VtreeShape::Right).unwrap();
        let json = serde_json::to_string(&vtree).unwrap();
        let back: Vtree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vtree);

        let twice = r#"{"nodes":[{"Leaf":1},{"Leaf":1},{"Internal":[0,1]}],"root":2}"#;
        assert!(serde_json::from_str::<Vtree>(twice).is_err());
        let dangling = r#"{"nodes":[{"Leaf":1},{"Internal":[0,5]}],"root":1}"#;
        assert!(serde_json::from_str::<Vtree>(dangling).is_err());
        let unreachable = r#"{"nodes":[{"Leaf":1},{"Leaf":2}],"root":0}"#;
        assert!(serde_json::from_str::<Vtree>(unreachable).is_err());
        let shared = r#"{"nodes":[{"Leaf":1},{"Internal":[0,0]}],"root":1}"#;
        assert!(serde_json::from_str::<Vtree>(shared).is_err());
    }

    #[quickcheck]
    fn leaves_keep_order(n: u8, shape: u8) -> bool {
        let order = labels(u32::from(n % 40));
        let shape = match shape % 5 {
            0 => VtreeShape::Balanced,
            1 => VtreeShape::Left,
            2 => VtreeShape::Right,
            3 => VtreeShape::Vertical,
            _ => VtreeShape::Random,
        };
        let vtree = Vtree::new(&order, shape).unwrap();
        vtree.labels() == order && vtree.len() == (2 * order.len()).saturating_sub(1)
    }
}
