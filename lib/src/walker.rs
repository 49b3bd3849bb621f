/*!
Compilation of abstracted formulas into decision diagrams.

The [DdBuilder] walks a [Formula] DAG bottom-up and composes the diagrams of the
children with the connectives of a [Backend]. Shared sub-formulas are compiled
once. [build] puts the pieces together: the formula, the conjunction of the
lemmas and the projection of the auxiliary labels out of the latter.
*/
use crate::{
    backend::{Backend, BoolOp},
    datatypes::Label,
    error::Result,
    formula::{Formula, Node},
    mapping::AbstractionMapping,
    solver::SatResult,
    telemetry::{ComputationLog, LogExt},
};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Compiles formulas over the atoms of one [AbstractionMapping] on one backend.
#[derive(Debug)]
pub struct DdBuilder<'a, B: Backend> {
    backend: &'a mut B,
    mapping: &'a AbstractionMapping,
    memo: HashMap<*const Node, B::Node>,
}

impl<'a, B: Backend> DdBuilder<'a, B> {
    /// Creates a builder with an empty memo table.
    pub fn new(backend: &'a mut B, mapping: &'a AbstractionMapping) -> Self {
        Self {
            backend,
            mapping,
            memo: HashMap::new(),
        }
    }

    /// The diagram of `formula`.
    ///
    /// Fails with [TddError::UnmappedAtom][crate::error::TddError::UnmappedAtom] if an
    /// atom has no label.
    pub fn term(&mut self, formula: &Formula) -> Result<B::Node> {
        if let Some(result) = self.memo.get(&formula.node_id()) {
            return Ok(*result);
        }
        let result = match formula.node() {
            Node::True => self.backend.terminal(true),
            Node::False => self.backend.terminal(false),
            Node::Atom(atom) => {
                let label = self.mapping.require(atom)?;
                log::trace!("atom {} as {}", atom, label);
                self.backend.variable(label)?
            }
            Node::Not(val) => {
                let t1 = self.term(val)?;
                self.backend.negate(t1)
            }
            Node::And(vals) => self.fold(vals, BoolOp::And, true)?,
            Node::Or(vals) => self.fold(vals, BoolOp::Or, false)?,
            Node::Implies(val1, val2) => self.binary(BoolOp::Implies, val1, val2)?,
            Node::Iff(val1, val2) => self.binary(BoolOp::Iff, val1, val2)?,
            Node::Xor(val1, val2) => self.binary(BoolOp::Xor, val1, val2)?,
            Node::Ite(cond, val1, val2) => {
                let c = self.term(cond)?;
                let t1 = self.term(val1)?;
                let t2 = self.term(val2)?;
                self.backend.ite(c, t1, t2)
            }
        };
        self.memo.insert(formula.node_id(), result);
        Ok(result)
    }

    fn binary(&mut self, op: BoolOp, val1: &Formula, val2: &Formula) -> Result<B::Node> {
        let t1 = self.term(val1)?;
        let t2 = self.term(val2)?;
        Ok(self.backend.apply(op, t1, t2))
    }

    fn fold(&mut self, vals: &[Formula], op: BoolOp, neutral: bool) -> Result<B::Node> {
        let mut acc = self.backend.terminal(neutral);
        for val in vals {
            let t = self.term(val)?;
            acc = self.backend.apply(op, acc, t);
            // the absorbing constant cannot change any more
            if self.backend.constant_value(acc) == Some(!neutral) {
                break;
            }
        }
        Ok(acc)
    }
}

/// Compiles `phi ∧ ∃qvars. lemmas`.
///
/// The labels in `qvars` must not occur in `phi`, so projecting them from the
/// lemmas alone projects them from the conjunction. With `sat_hint` set to
/// [SatResult::Unsat] the constant false is returned without looking at the formulas.
pub fn build<B: Backend>(
    backend: &mut B,
    mapping: &AbstractionMapping,
    phi: &Formula,
    lemmas: &Formula,
    qvars: &[Label],
    sat_hint: Option<SatResult>,
    mut log: Option<&mut ComputationLog>,
) -> Result<B::Node> {
    if sat_hint == Some(SatResult::Unsat) {
        log::info!("[Done] formula is known to be unsatisfiable, skipping the walk");
        log.time("UNSAT DD building time", Duration::ZERO);
        return Ok(backend.terminal(false));
    }
    let mut builder = DdBuilder::new(backend, mapping);

    log::info!("[Start] building the {} of phi", B::KIND);
    let start = Instant::now();
    let phi_dd = builder.term(phi)?;
    log.time("phi DD building time", start.elapsed());

    log::info!("[Start] building the {} of the lemmas", B::KIND);
    let start = Instant::now();
    let mut lemmas_dd = builder.term(lemmas)?;
    log.time("t-lemmas DD building time", start.elapsed());

    let start = Instant::now();
    for label in qvars {
        lemmas_dd = builder.backend.exists(lemmas_dd, *label);
    }
    log.time("fresh T-atoms quantification time", start.elapsed());

    let start = Instant::now();
    let root = builder.backend.apply(BoolOp::And, phi_dd, lemmas_dd);
    log.time("DD joining time", start.elapsed());
    log::info!(
        "[Done] {} built, {} nodes",
        B::KIND,
        builder.backend.node_count(root)
    );
    Ok(root)
}
