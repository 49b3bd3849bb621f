//! Consistency checks for conjunctions of difference-logic literals.
//!
//! Every literal is translated into bounds `u - v <= c` over the integer
//! variables and an implicit zero; a set of bounds is consistent iff the
//! induced constraint graph has no negative cycle. Negated equalities are
//! disjunctions and are decided by case split.
use crate::formula::{Atom, Constraint, Relation};
use std::collections::HashMap;

/// `u - v <= weight`, where `None` is the constant zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bound<'a> {
    u: Option<&'a str>,
    v: Option<&'a str>,
    weight: i128,
}

enum Bounds<'a> {
    All(Vec<Bound<'a>>),
    Either(Bound<'a>, Bound<'a>),
}

fn bounds(c: &Constraint, positive: bool) -> Bounds<'_> {
    let l = Some(c.lhs.as_str());
    let r = c.rhs.as_deref();
    let k = i128::from(c.bound);
    // d = l - r
    let le = |w: i128| Bound { u: l, v: r, weight: w }; // d <= w
    let ge = |w: i128| Bound { u: r, v: l, weight: -w }; // d >= w
    match (c.relation, positive) {
        (Relation::Le, true) | (Relation::Gt, false) => Bounds::All(vec![le(k)]),
        (Relation::Le, false) | (Relation::Gt, true) => Bounds::All(vec![ge(k + 1)]),
        (Relation::Lt, true) | (Relation::Ge, false) => Bounds::All(vec![le(k - 1)]),
        (Relation::Lt, false) | (Relation::Ge, true) => Bounds::All(vec![ge(k)]),
        (Relation::Eq, true) => Bounds::All(vec![le(k), ge(k)]),
        (Relation::Eq, false) => Bounds::Either(le(k - 1), ge(k + 1)),
    }
}

/// Decides consistency of difference-logic literal sets and explains conflicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DifferenceLogic;

impl DifferenceLogic {
    /// Checks whether the conjunction of the given literals has an integer solution.
    /// Propositional symbols are ignored.
    pub fn consistent(&self, literals: &[(&Atom, bool)]) -> bool {
        let mut fixed = Vec::new();
        let mut choices = Vec::new();
        for (atom, positive) in literals {
            if let Atom::Diff(c) = atom {
                match bounds(c, *positive) {
                    Bounds::All(bs) => fixed.extend(bs),
                    Bounds::Either(a, b) => choices.push((a, b)),
                }
            }
        }
        if !feasible(&fixed) {
            return false;
        }
        Self::split(&mut fixed, &choices)
    }

    fn split<'a>(fixed: &mut Vec<Bound<'a>>, choices: &[(Bound<'a>, Bound<'a>)]) -> bool {
        match choices.split_first() {
            None => feasible(fixed),
            Some((&(a, b), rest)) => [a, b].into_iter().any(|choice| {
                fixed.push(choice);
                let result = feasible(fixed) && Self::split(fixed, rest);
                fixed.pop();
                result
            }),
        }
    }

    /// Shrinks an inconsistent literal set to a minimal inconsistent subset.
    /// Returns `None` if the literals are consistent.
    pub fn explain<'a>(&self, literals: &[(&'a Atom, bool)]) -> Option<Vec<(&'a Atom, bool)>> {
        if self.consistent(literals) {
            return None;
        }
        let mut core: Vec<(&Atom, bool)> = literals
            .iter()
            .filter(|(atom, _)| !atom.is_bool())
            .copied()
            .collect();
        let mut idx = 0;
        while idx < core.len() {
            let removed = core.remove(idx);
            if self.consistent(&core) {
                core.insert(idx, removed);
                idx += 1;
            }
        }
        Some(core)
    }
}

/// Bellman-Ford negative cycle detection from a virtual source.
fn feasible(bounds: &[Bound<'_>]) -> bool {
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();
    let mut edges = Vec::with_capacity(bounds.len());
    for b in bounds {
        let next = index.len();
        let u = *index.entry(b.u).or_insert(next);
        let next = index.len();
        let v = *index.entry(b.v).or_insert(next);
        // u - v <= w  is the edge v -> u with weight w
        edges.push((v, u, b.weight));
    }
    let mut dist = vec![0i128; index.len()];
    for _ in 0..=index.len() {
        let mut changed = false;
        for &(from, to, weight) in &edges {
            if dist[from] + weight < dist[to] {
                dist[to] = dist[from] + weight;
                changed = true;
            }
        }
        if !changed {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn gt(var: &str, k: i64) -> Atom {
        Atom::bound(var, Relation::Gt, k)
    }

    #[test]
    fn bounds_on_one_variable() {
        let t = DifferenceLogic;
        let (a, b) = (gt("x", 0), gt("x", 5));
        assert!(t.consistent(&[(&a, true), (&b, true)]));
        assert!(t.consistent(&[(&a, true), (&b, false)]));
        assert!(!t.consistent(&[(&a, false), (&b, true)]));
        assert!(t.consistent(&[(&a, false), (&b, false)]));
        assert_eq!(
            t.explain(&[(&a, false), (&b, true)]),
            Some(vec![(&a, false), (&b, true)])
        );
    }

    #[test]
    fn integer_semantics() {
        let t = DifferenceLogic;
        // 0 < x < 1 has no integer solution
        let (a, b) = (gt("x", 0), Atom::bound("x", Relation::Lt, 1));
        assert!(!t.consistent(&[(&a, true), (&b, true)]));
    }

    #[test]
    fn transitive_chain() {
        let t = DifferenceLogic;
        let xy = Atom::diff("x", "y", Relation::Le, -1); // x < y
        let yz = Atom::diff("y", "z", Relation::Le, -1); // y < z
        let zx = Atom::diff("z", "x", Relation::Le, -1); // z < x
        let p = Atom::boolean("p");
        let unrelated = gt("w", 3);
        let lits = [(&p, true), (&xy, true), (&unrelated, false), (&yz, true), (&zx, true)];
        assert!(!t.consistent(&lits));
        assert_eq!(
            t.explain(&lits),
            Some(vec![(&xy, true), (&yz, true), (&zx, true)])
        );
        assert_eq!(t.explain(&lits[..4]), None);
    }

    #[test]
    fn disequalities() {
        let t = DifferenceLogic;
        let eq = Atom::bound("x", Relation::Eq, 2);
        let ge = Atom::bound("x", Relation::Ge, 2);
        let le = Atom::bound("x", Relation::Le, 2);
        assert!(t.consistent(&[(&eq, false), (&ge, true)]));
        assert!(!t.consistent(&[(&eq, false), (&ge, true), (&le, true)]));
        assert!(!t.consistent(&[(&eq, true), (&le, false)]));
    }
}
