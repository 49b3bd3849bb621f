//! All-SAT enumeration modulo difference logic.
//!
//! The search assigns the atoms of the formula one by one in order of their
//! first occurrence. A branch is closed as soon as the Boolean skeleton is
//! falsified or the assigned theory literals are inconsistent; in the latter
//! case the minimal conflict is learned as a lemma.
use super::{
    theory::DifferenceLogic, AllSat, BooleanMapping, Converter, DifferenceConverter, Reasoner,
    SatResult,
};
use crate::{
    error::{Result, TddError},
    formula::{Assignment, Atom, Formula, Relation},
};
use std::{
    collections::{HashMap, HashSet},
    time::Instant,
};

/// Settings shared by all enumerators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumeratorOptions {
    /// Give up with a [TddError::ReasonerFailure] once more models than this were found.
    pub model_limit: Option<usize>,
    /// For every model containing a true equality `x - y = k`, also emit the lemma
    /// `x - y = k <-> (x - y <= k & !(x - y <= k - 1))`.
    pub split_equalities: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Total,
    Partial,
    ExtendedPartial,
}

struct Search<'a> {
    phi: &'a Formula,
    mode: Mode,
    options: EnumeratorOptions,
    atoms: Vec<Atom>,
    index: HashMap<Atom, usize>,
    values: Vec<Option<bool>>,
    theory: DifferenceLogic,
    lemmas: Vec<Formula>,
    known_lemmas: HashSet<Formula>,
    models: Vec<Assignment>,
}

impl<'a> Search<'a> {
    fn new(phi: &'a Formula, mode: Mode, options: EnumeratorOptions) -> Self {
        let atoms = phi.atoms();
        let index = atoms
            .iter()
            .enumerate()
            .map(|(idx, atom)| (atom.clone(), idx))
            .collect();
        let values = vec![None; atoms.len()];
        Self {
            phi,
            mode,
            options,
            atoms,
            index,
            values,
            theory: DifferenceLogic,
            lemmas: Vec::new(),
            known_lemmas: HashSet::new(),
            models: Vec::new(),
        }
    }

    fn skeleton_value(&self) -> Option<bool> {
        self.phi
            .evaluate(&|atom| self.index.get(atom).and_then(|&idx| self.values[idx]))
    }

    /// Checks the assigned theory literals, learning the conflict if there is one.
    fn theory_consistent(&mut self) -> bool {
        let literals: Vec<(&Atom, bool)> = self
            .atoms
            .iter()
            .zip(&self.values)
            .filter_map(|(atom, value)| value.map(|v| (atom, v)))
            .filter(|(atom, _)| !atom.is_bool())
            .collect();
        match self.theory.explain(&literals) {
            None => true,
            Some(core) => {
                let mut clause: Vec<(Atom, bool)> =
                    core.into_iter().map(|(a, v)| (a.clone(), v)).collect();
                clause.sort();
                let lemma = Formula::or(
                    clause
                        .into_iter()
                        .map(|(atom, value)| {
                            let literal = Formula::atom(atom);
                            if value {
                                literal.not()
                            } else {
                                literal
                            }
                        })
                        .collect(),
                );
                self.learn(lemma);
                false
            }
        }
    }

    fn learn(&mut self, lemma: Formula) {
        if self.known_lemmas.insert(lemma.clone()) {
            log::trace!("learned lemma {}", lemma);
            self.lemmas.push(lemma);
        }
    }

    fn record_model(&mut self) -> Result<()> {
        let model: Assignment = self
            .atoms
            .iter()
            .zip(&self.values)
            .filter_map(|(atom, value)| value.map(|v| (atom.clone(), v)))
            .collect();
        if self.options.split_equalities {
            let equalities: Vec<Atom> = model
                .iter()
                .filter(|(atom, value)| {
                    **value
                        && matches!(atom, Atom::Diff(c) if c.relation == Relation::Eq)
                })
                .map(|(atom, _)| atom.clone())
                .collect();
            for eq in equalities {
                self.learn(equality_split(&eq));
            }
        }
        self.models.push(model);
        if let Some(limit) = self.options.model_limit {
            if self.models.len() > limit {
                return Err(TddError::ReasonerFailure(format!(
                    "model limit of {} exceeded",
                    limit
                )));
            }
        }
        Ok(())
    }

    fn run(&mut self, depth: usize) -> Result<()> {
        let value = self.skeleton_value();
        if value == Some(false) || !self.theory_consistent() {
            return Ok(());
        }
        match (self.mode, value) {
            (Mode::Partial, Some(true)) => return self.record_model(),
            (Mode::ExtendedPartial, Some(true)) => {
                self.record_model()?;
                self.extend(depth);
                return Ok(());
            }
            _ => {}
        }
        if depth == self.atoms.len() {
            return self.record_model();
        }
        for choice in [true, false] {
            self.values[depth] = Some(choice);
            let result = self.run(depth + 1);
            self.values[depth] = None;
            result?;
        }
        Ok(())
    }

    /// Visits every theory-consistent extension of the current assignment, learning conflicts.
    fn extend(&mut self, depth: usize) {
        if depth == self.atoms.len() {
            return;
        }
        for choice in [true, false] {
            self.values[depth] = Some(choice);
            if self.theory_consistent() {
                self.extend(depth + 1);
            }
            self.values[depth] = None;
        }
    }

    fn finish(self, surrogates: Option<&BooleanMapping>) -> AllSat {
        let verdict = if self.models.is_empty() {
            SatResult::Unsat
        } else {
            SatResult::Sat
        };
        let models = match surrogates {
            None => self.models,
            Some(mapping) => self
                .models
                .into_iter()
                .map(|model| {
                    model
                        .into_iter()
                        .map(|(atom, value)| match mapping.surrogate(&atom) {
                            Some(surrogate) => (surrogate.clone(), value),
                            None => (atom, value),
                        })
                        .collect()
                })
                .collect(),
        };
        AllSat {
            verdict,
            lemmas: self.lemmas,
            models,
        }
    }
}

/// `x - y = k <-> (x - y <= k & !(x - y <= k - 1))`
fn equality_split(eq: &Atom) -> Formula {
    match eq {
        Atom::Diff(c) => {
            let mut upper = c.clone();
            upper.relation = Relation::Le;
            let mut below = upper.clone();
            below.bound = below.bound.saturating_sub(1);
            Formula::atom(eq.clone()).iff(&Formula::and(vec![
                Formula::atom(Atom::Diff(upper)),
                Formula::atom(Atom::Diff(below)).not(),
            ]))
        }
        Atom::Bool(_) => Formula::top(),
    }
}

fn decide(
    phi: &Formula,
    mode: Mode,
    options: EnumeratorOptions,
    surrogates: Option<&BooleanMapping>,
) -> Result<AllSat> {
    let start = Instant::now();
    let mut search = Search::new(phi, mode, options);
    log::debug!(
        "[Start] {:?} enumeration over {} atoms",
        mode,
        search.atoms.len()
    );
    search.run(0)?;
    let result = search.finish(surrogates);
    log::debug!(
        "[Done] {:?} enumeration: {}, {} models, {} lemmas in {:?}",
        mode,
        result.verdict,
        result.models.len(),
        result.lemmas.len(),
        start.elapsed()
    );
    Ok(result)
}

/// Enumerates total truth assignments.
/// Honours a surrogate mapping: reported models are keyed by the surrogates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalEnumerator {
    options: EnumeratorOptions,
    converter: DifferenceConverter,
}

impl TotalEnumerator {
    /// Creates the enumerator.
    pub fn new(options: EnumeratorOptions) -> Self {
        Self {
            options,
            converter: DifferenceConverter,
        }
    }
}

impl Reasoner for TotalEnumerator {
    fn decide(&mut self, phi: &Formula, surrogates: Option<&BooleanMapping>) -> Result<AllSat> {
        decide(phi, Mode::Total, self.options, surrogates)
    }

    fn converter(&self) -> &dyn Converter {
        &self.converter
    }
}

/// Enumerates partial truth assignments.
/// Conflicts between atoms that a partial model leaves open are not learned.
/// Surrogate mappings are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialEnumerator {
    options: EnumeratorOptions,
    converter: DifferenceConverter,
}

impl PartialEnumerator {
    /// Creates the enumerator.
    pub fn new(options: EnumeratorOptions) -> Self {
        Self {
            options,
            converter: DifferenceConverter,
        }
    }
}

impl Reasoner for PartialEnumerator {
    fn decide(&mut self, phi: &Formula, _surrogates: Option<&BooleanMapping>) -> Result<AllSat> {
        decide(phi, Mode::Partial, self.options, None)
    }

    fn converter(&self) -> &dyn Converter {
        &self.converter
    }
}

/// Enumerates partial truth assignments and extends every one of them over the
/// open atoms, so that all theory conflicts are learned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendedPartialEnumerator {
    options: EnumeratorOptions,
    converter: DifferenceConverter,
}

impl ExtendedPartialEnumerator {
    /// Creates the enumerator.
    pub fn new(options: EnumeratorOptions) -> Self {
        Self {
            options,
            converter: DifferenceConverter,
        }
    }
}

impl Reasoner for ExtendedPartialEnumerator {
    fn decide(&mut self, phi: &Formula, _surrogates: Option<&BooleanMapping>) -> Result<AllSat> {
        decide(phi, Mode::ExtendedPartial, self.options, None)
    }

    fn converter(&self) -> &dyn Converter {
        &self.converter
    }
}
