/*!
Theory reasoners.

A [Reasoner] decides T-satisfiability of a formula by all-SAT enumeration and
collects the theory lemmas which rule out T-inconsistent Boolean assignments.
The crate ships one background theory, integer difference logic, with three
enumeration strategies:

- [TotalEnumerator]: enumerates total assignments, optionally over Boolean surrogates
- [PartialEnumerator]: stops at partial models, ignores surrogates
- [ExtendedPartialEnumerator]: partial models which are afterwards extended to learn every conflict
*/
pub mod enumerator;
pub mod theory;

use crate::{
    error::Result,
    formula::{Assignment, Atom, Formula},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
};
use strum::{EnumString, EnumVariantNames};

pub use enumerator::{EnumeratorOptions, ExtendedPartialEnumerator, PartialEnumerator, TotalEnumerator};

/// Verdict of a satisfiability check.
#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum SatResult {
    /// At least one theory-consistent model exists.
    Sat,
    /// No theory-consistent model exists.
    Unsat,
}

impl Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SatResult::Sat => write!(f, "SAT"),
            SatResult::Unsat => write!(f, "UNSAT"),
        }
    }
}

/// Everything an all-SAT call produces.
#[derive(Debug, Clone)]
pub struct AllSat {
    /// The verdict.
    pub verdict: SatResult,
    /// Theory lemmas over the atoms of the decided formula, in order of discovery.
    pub lemmas: Vec<Formula>,
    /// The models found, possibly partial.
    pub models: Vec<Assignment>,
}

/// Canonicalisation of atoms, applied before atoms are abstracted to labels.
pub trait Converter {
    /// Returns the canonical form of `atom`.
    fn normalize(&self, atom: &Atom) -> Atom;

    /// Rewrites every atom of `phi` into its canonical form.
    fn normalize_formula(&self, phi: &Formula) -> Formula {
        phi.map_atoms(&mut |atom| Formula::atom(self.normalize(atom)))
    }
}

/// Capability interface of a theory reasoner.
pub trait Reasoner: std::fmt::Debug {
    /// Decides `phi` by all-SAT enumeration and returns the verdict with the lemmas and models found.
    ///
    /// If `surrogates` is given the reasoner may enumerate over the surrogate symbols instead
    /// of the theory atoms; reported models then use the surrogates as keys.
    fn decide(&mut self, phi: &Formula, surrogates: Option<&BooleanMapping>) -> Result<AllSat>;

    /// The normalisation this reasoner applies to atoms.
    fn converter(&self) -> &dyn Converter;
}

/// Selects one of the shipped reasoners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReasonerKind {
    /// [TotalEnumerator]
    #[default]
    Total,
    /// [PartialEnumerator]
    Partial,
    /// [ExtendedPartialEnumerator]
    Extended,
}

impl ReasonerKind {
    /// Instantiates the selected reasoner.
    pub fn build(self, options: EnumeratorOptions) -> Box<dyn Reasoner> {
        match self {
            ReasonerKind::Total => Box::new(TotalEnumerator::new(options)),
            ReasonerKind::Partial => Box::new(PartialEnumerator::new(options)),
            ReasonerKind::Extended => Box::new(ExtendedPartialEnumerator::new(options)),
        }
    }
}

/// Normalisation of difference constraints over the integers.
///
/// Strict and non-strict relations are reduced to `<=`, `=` and `>`, and the two
/// variables of a difference are ordered lexicographically.
#[derive(Debug, Default, Clone, Copy)]
pub struct DifferenceConverter;

impl Converter for DifferenceConverter {
    fn normalize(&self, atom: &Atom) -> Atom {
        let mut c = match atom {
            Atom::Bool(_) => return atom.clone(),
            Atom::Diff(c) => c.clone(),
        };
        if let Some(rhs) = c.rhs.take() {
            if rhs < c.lhs {
                c.rhs = Some(std::mem::replace(&mut c.lhs, rhs));
                c.relation = c.relation.mirrored();
                c.bound = c.bound.saturating_neg();
            } else {
                c.rhs = Some(rhs);
            }
        }
        use crate::formula::Relation::*;
        match c.relation {
            Lt => {
                c.relation = Le;
                c.bound = c.bound.saturating_sub(1);
            }
            Ge => {
                c.relation = Gt;
                c.bound = c.bound.saturating_sub(1);
            }
            Le | Eq | Gt => {}
        }
        Atom::Diff(c)
    }
}

/// Bidirectional map between theory atoms and fresh Boolean surrogate symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanMapping {
    to_surrogate: HashMap<Atom, Atom>,
    to_atom: HashMap<Atom, Atom>,
}

impl BooleanMapping {
    /// Allocates one fresh surrogate per distinct non-Boolean atom of `atoms`.
    /// Surrogate names never clash with Boolean symbols among `atoms`.
    pub fn fresh(atoms: &[Atom]) -> Self {
        let taken: HashSet<&str> = atoms
            .iter()
            .filter_map(|atom| match atom {
                Atom::Bool(name) => Some(name.as_str()),
                Atom::Diff(_) => None,
            })
            .collect();
        let mut mapping = Self::default();
        let mut counter = 0usize;
        for atom in atoms.iter().filter(|atom| !atom.is_bool()) {
            if mapping.to_surrogate.contains_key(atom) {
                continue;
            }
            let surrogate = loop {
                let name = format!("_s{}", counter);
                counter += 1;
                if !taken.contains(name.as_str()) {
                    break Atom::boolean(name);
                }
            };
            mapping.to_surrogate.insert(atom.clone(), surrogate.clone());
            mapping.to_atom.insert(surrogate, atom.clone());
        }
        mapping
    }

    /// The surrogate of a theory atom.
    pub fn surrogate(&self, atom: &Atom) -> Option<&Atom> {
        self.to_surrogate.get(atom)
    }

    /// The theory atom behind a surrogate.
    pub fn atom(&self, surrogate: &Atom) -> Option<&Atom> {
        self.to_atom.get(surrogate)
    }

    /// Number of surrogates.
    pub fn len(&self) -> usize {
        self.to_surrogate.len()
    }

    /// Returns true if no surrogate was allocated.
    pub fn is_empty(&self) -> bool {
        self.to_surrogate.is_empty()
    }

    /// Restricts the mapping to the given atoms.
    pub fn restricted_to(&self, atoms: &[Atom]) -> Self {
        let mut result = Self::default();
        for atom in atoms {
            if let Some(surrogate) = self.to_surrogate.get(atom) {
                result.to_surrogate.insert(atom.clone(), surrogate.clone());
                result.to_atom.insert(surrogate.clone(), atom.clone());
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::formula::Relation;
    use test_log::test;

    #[test]
    fn normalization() {
        let conv = DifferenceConverter;
        assert_eq!(
            conv.normalize(&Atom::bound("x", Relation::Gt, 0)),
            Atom::bound("x", Relation::Gt, 0)
        );
        assert_eq!(
            conv.normalize(&Atom::bound("x", Relation::Lt, 3)),
            Atom::bound("x", Relation::Le, 2)
        );
        assert_eq!(
            conv.normalize(&Atom::bound("x", Relation::Ge, 3)),
            Atom::bound("x", Relation::Gt, 2)
        );
        // y - x < 4  <=>  x - y > -4
        assert_eq!(
            conv.normalize(&Atom::diff("y", "x", Relation::Lt, 4)),
            Atom::diff("x", "y", Relation::Gt, -4)
        );
        // y - x >= 4  <=>  x - y <= -4
        assert_eq!(
            conv.normalize(&Atom::diff("y", "x", Relation::Ge, 4)),
            Atom::diff("x", "y", Relation::Le, -4)
        );
        assert_eq!(conv.normalize(&Atom::boolean("p")), Atom::boolean("p"));
    }

    #[test]
    fn normalize_formula_keeps_structure() {
        let a = Formula::atom(Atom::bound("x", Relation::Lt, 1));
        let phi = Formula::and(vec![a.clone(), a.not()]);
        let normalized = DifferenceConverter.normalize_formula(&phi);
        assert_eq!(
            normalized.atoms(),
            vec![Atom::bound("x", Relation::Le, 0)]
        );
        assert_eq!(normalized.dag_size(), phi.dag_size());
    }

    #[test]
    fn surrogates_avoid_taken_names() {
        let atoms = vec![
            Atom::boolean("_s0"),
            Atom::bound("x", Relation::Gt, 0),
            Atom::bound("x", Relation::Gt, 5),
        ];
        let mapping = BooleanMapping::fresh(&atoms);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.surrogate(&atoms[1]), Some(&Atom::boolean("_s1")));
        assert_eq!(mapping.surrogate(&atoms[2]), Some(&Atom::boolean("_s2")));
        assert_eq!(mapping.atom(&Atom::boolean("_s2")), Some(&atoms[2]));
        assert_eq!(mapping.surrogate(&atoms[0]), None);
        assert_eq!(mapping.restricted_to(&atoms[2..]).len(), 1);
    }

    #[test]
    fn reasoner_kinds() {
        use std::str::FromStr;
        use strum::VariantNames;
        assert_eq!(ReasonerKind::from_str("partial").unwrap(), ReasonerKind::Partial);
        assert_eq!(ReasonerKind::VARIANTS, &["total", "partial", "extended"]);
        assert_eq!(ReasonerKind::Extended.to_string(), "extended");
    }
}
