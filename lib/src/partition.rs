//! Partitioning of atoms by shared theory variables.
//!
//! Two atoms end up in the same partition if they share a free variable,
//! directly or through a chain of other atoms. Propositional symbols have no
//! free variables and form singleton partitions.
use crate::formula::Atom;
use std::collections::HashMap;

/// Union-find over `0..n` with union by rank and path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Creates `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merges the sets of `a` and `b`.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

/// Splits `atoms` into partitions of atoms connected by shared free variables.
///
/// Partitions are returned in order of their first atom, atoms keep their relative order.
pub fn atom_partitioning(atoms: &[Atom]) -> Vec<Vec<Atom>> {
    let mut sets = DisjointSet::new(atoms.len());
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, atom) in atoms.iter().enumerate() {
        for var in atom.free_vars() {
            match owner.get(var) {
                Some(&other) => sets.union(idx, other),
                None => {
                    owner.insert(var, idx);
                }
            }
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut partitions: Vec<Vec<Atom>> = Vec::new();
    for (idx, atom) in atoms.iter().enumerate() {
        let root = sets.find(idx);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(atom.clone());
    }
    log::debug!(
        "partitioned {} atoms into {} groups",
        atoms.len(),
        partitions.len()
    );
    partitions
}
