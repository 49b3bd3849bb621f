/*!
Lemma extraction.

[extract] drives a [Reasoner] over a formula and returns the verdict together
with every theory lemma found. In the "assume true" mode the formula's atoms are
split into variable-disjoint partitions (see [crate::partition]) and each
partition is enumerated on its own, which forces the reasoner to discover all
conflicts between the atoms regardless of the Boolean structure.
*/
use crate::{
    error::Result,
    formula::{Atom, Formula},
    partition::atom_partitioning,
    solver::{BooleanMapping, Reasoner, SatResult},
    telemetry::{ComputationLog, LogExt},
};
use std::{collections::HashSet, time::Instant};

/// Outcome of [extract].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The verdict, always [SatResult::Sat] in the "assume true" mode.
    pub verdict: SatResult,
    /// Theory lemmas without duplicates, in order of discovery.
    pub lemmas: Vec<Formula>,
    /// The surrogate mapping handed to the reasoner, if one was requested.
    pub surrogates: Option<BooleanMapping>,
}

/// Extracts the theory lemmas of `phi`.
///
/// - `assume_true`: enumerate `⋀ (a ∨ ¬a)` per partition of the atoms instead of `phi` itself
/// - `use_surrogates`: offer the reasoner one fresh Boolean symbol per theory atom
///
/// Reasoner errors are passed on unchanged.
pub fn extract(
    phi: &Formula,
    reasoner: &mut dyn Reasoner,
    assume_true: bool,
    use_surrogates: bool,
    mut log: Option<&mut ComputationLog>,
) -> Result<Extraction> {
    let start = Instant::now();
    let atoms = phi.atoms();
    let surrogates = use_surrogates.then(|| BooleanMapping::fresh(&atoms));
    log::info!(
        "[Start] lemma extraction over {} atoms (assume true: {})",
        atoms.len(),
        assume_true
    );

    let (verdict, lemmas) = if assume_true {
        let mut lemmas = Vec::new();
        let mut known: HashSet<Formula> = HashSet::new();
        let partitions = atom_partitioning(&atoms);
        log.count("partitions", partitions.len());
        for partition in partitions {
            let tautology = Formula::true_given_atoms(&partition);
            let restricted = surrogates.as_ref().map(|s| s.restricted_to(&partition));
            let result = reasoner.decide(&tautology, restricted.as_ref())?;
            for lemma in result.lemmas {
                if known.insert(lemma.clone()) {
                    lemmas.push(lemma);
                }
            }
        }
        (SatResult::Sat, lemmas)
    } else {
        let result = reasoner.decide(phi, surrogates.as_ref())?;
        (result.verdict, result.lemmas)
    };

    log.time("All-SMT computation time", start.elapsed());
    log.count("T-lemmas amount", lemmas.len());
    log.text("All-SMT result", verdict.to_string());
    log::info!(
        "[Done] lemma extraction: {}, {} lemmas",
        verdict,
        lemmas.len()
    );
    Ok(Extraction {
        verdict,
        lemmas,
        surrogates,
    })
}

/// Atoms of `phi_and_lemmas` which do not occur in `original`, in order of first occurrence.
pub fn find_auxiliary_atoms(
    original: &Formula,
    phi_and_lemmas: &Formula,
    mut log: Option<&mut ComputationLog>,
) -> Vec<Atom> {
    let known: HashSet<Atom> = original.atoms().into_iter().collect();
    let auxiliary: Vec<Atom> = phi_and_lemmas
        .atoms()
        .into_iter()
        .filter(|atom| !known.contains(atom))
        .collect();
    log.count("fresh T-atoms detected", auxiliary.len());
    if !auxiliary.is_empty() {
        log::debug!("found {} auxiliary atoms", auxiliary.len());
    }
    auxiliary
}
