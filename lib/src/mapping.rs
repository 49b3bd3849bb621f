//! The abstraction of theory atoms to diagram labels and its inverse.
use crate::{
    datatypes::{Label, Literal},
    error::{Result, TddError},
    formula::{Assignment, Atom},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bijection between atoms and [labels][Label].
///
/// Labels are handed out consecutively from `1` in the iteration order of the atoms
/// given to [AbstractionMapping::assign]. The mapping offers no way to add atoms
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Label, Atom)>", into = "Vec<(Label, Atom)>")]
pub struct AbstractionMapping {
    labels: HashMap<Atom, Label>,
    refinement: RefinementMapping,
}

/// The inverse of an [AbstractionMapping], used to decode diagram labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementMapping {
    atoms: Vec<Atom>,
}

impl RefinementMapping {
    /// The atom abstracted to `label`.
    pub fn refine(&self, label: Label) -> Result<&Atom> {
        let atom = match label.index() {
            0 => None,
            idx => self.atoms.get(idx - 1),
        };
        atom.ok_or(TddError::UnknownLabel(label))
    }

    /// Decodes an assignment over labels into one over atoms.
    pub fn refine_assignment(&self, literals: &[Literal]) -> Result<Assignment> {
        literals
            .iter()
            .map(|lit| Ok((self.refine(lit.label)?.clone(), lit.positive)))
            .collect()
    }
}

impl AbstractionMapping {
    /// Assigns labels to `atoms`; repeated atoms keep their first label.
    pub fn assign<'a, I>(atoms: I) -> Self
    where
        I: IntoIterator<Item = &'a Atom>,
    {
        let mut labels = HashMap::new();
        let mut ordered = Vec::new();
        for atom in atoms {
            if !labels.contains_key(atom) {
                ordered.push(atom.clone());
                labels.insert(atom.clone(), Label(ordered.len() as u32));
            }
        }
        log::debug!("assigned {} labels", ordered.len());
        Self {
            labels,
            refinement: RefinementMapping { atoms: ordered },
        }
    }

    /// The label of `atom`.
    pub fn label(&self, atom: &Atom) -> Option<Label> {
        self.labels.get(atom).copied()
    }

    /// The label of `atom`, failing with [TddError::UnmappedAtom] if there is none.
    pub fn require(&self, atom: &Atom) -> Result<Label> {
        self.label(atom)
            .ok_or_else(|| TddError::UnmappedAtom(atom.clone()))
    }

    /// The atom abstracted to `label`.
    pub fn refine(&self, label: Label) -> Result<&Atom> {
        self.refinement.refine(label)
    }

    /// The inverse mapping.
    pub fn refinement(&self) -> &RefinementMapping {
        &self.refinement
    }

    /// All labels in ascending order.
    pub fn labels(&self) -> Vec<Label> {
        (1..=self.refinement.atoms.len() as u32).map(Label).collect()
    }

    /// All atoms in label order.
    pub fn atoms(&self) -> &[Atom] {
        &self.refinement.atoms
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.refinement.atoms.len()
    }

    /// Returns true if no atom was abstracted.
    pub fn is_empty(&self) -> bool {
        self.refinement.atoms.is_empty()
    }
}

impl From<AbstractionMapping> for Vec<(Label, Atom)> {
    fn from(mapping: AbstractionMapping) -> Self {
        mapping
            .refinement
            .atoms
            .into_iter()
            .enumerate()
            .map(|(idx, atom)| (Label(idx as u32 + 1), atom))
            .collect()
    }
}

impl TryFrom<Vec<(Label, Atom)>> for AbstractionMapping {
    type Error = String;

    fn try_from(mut pairs: Vec<(Label, Atom)>) -> std::result::Result<Self, Self::Error> {
        pairs.sort_by_key(|(label, _)| *label);
        for (idx, (label, _)) in pairs.iter().enumerate() {
            if label.index() != idx + 1 {
                return Err(format!(
                    "labels must be 1..={} without gaps, found {}",
                    pairs.len(),
                    label
                ));
            }
        }
        let mapping = Self::assign(pairs.iter().map(|(_, atom)| atom));
        if mapping.len() != pairs.len() {
            return Err("an atom is mapped to more than one label".to_string());
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::formula::Relation;
    use test_log::test;

    fn atoms() -> Vec<Atom> {
        vec![
            Atom::bound("x", Relation::Gt, 0),
            Atom::bound("x", Relation::Gt, 5),
            Atom::boolean("p"),
            Atom::bound("x", Relation::Gt, 0),
        ]
    }

    #[test]
    fn assign_and_refine() {
        let atoms = atoms();
        let mapping = AbstractionMapping::assign(&atoms);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.label(&atoms[0]), Some(Label(1)));
        assert_eq!(mapping.label(&atoms[2]), Some(Label(3)));
        assert_eq!(mapping.labels(), vec![Label(1), Label(2), Label(3)]);
        assert_eq!(mapping.refine(Label(2)).unwrap(), &atoms[1]);
        assert!(matches!(
            mapping.refine(Label(4)),
            Err(TddError::UnknownLabel(Label(4)))
        ));
        assert!(matches!(
            mapping.refine(Label(0)),
            Err(TddError::UnknownLabel(Label(0)))
        ));
        assert!(matches!(
            mapping.require(&Atom::boolean("q")),
            Err(TddError::UnmappedAtom(_))
        ));
        let decoded = mapping
            .refinement()
            .refine_assignment(&[Literal::from(1), Literal::from(-3)])
            .unwrap();
        assert_eq!(
            decoded,
            Assignment::from([(atoms[0].clone(), true), (atoms[2].clone(), false)])
        );
    }

    #[test]
    fn deterministic() {
        let atoms = atoms();
        assert_eq!(
            AbstractionMapping::assign(&atoms),
            AbstractionMapping::assign(&atoms)
        );
    }

    #[test]
    fn serde_roundtrip() {
        let mapping = AbstractionMapping::assign(&atoms());
        let json = serde_json::to_string(&mapping).unwrap();
        let back: AbstractionMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);

        let gap = r#"[[1,{"Bool":"p"}],[3,{"Bool":"q"}]]"#;
        assert!(serde_json::from_str::<AbstractionMapping>(gap).is_err());
        let twice = r#"[[1,{"Bool":"p"}],[2,{"Bool":"p"}]]"#;
        assert!(serde_json::from_str::<AbstractionMapping>(twice).is_err());
    }
}
