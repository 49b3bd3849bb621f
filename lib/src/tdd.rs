/*!
Theory-consistent decision diagrams.

A [TheoryDD] is a decision diagram over the Boolean abstraction of a formula
conjoined with the theory lemmas of its atoms. Auxiliary atoms, which only occur
in the lemmas, are projected away, so every path to true corresponds to a
T-consistent assignment of the formula's own atoms.

```
use theory_dd::{parser::parse_formula, solver::TotalEnumerator, tdd::{CompileOptions, TheoryBdd}};

let phi = parse_formula("and(gt(x,5),or(gt(x,0),p))").unwrap();
let mut reasoner = TotalEnumerator::default();
let tbdd = TheoryBdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
assert!(tbdd.is_sat());
assert_eq!(tbdd.model_count().to_string(), "2");
```
*/
use crate::{
    backend::{Backend, ModelIter},
    datatypes::{Label, Literal},
    error::{Result, TddError},
    extract::{extract, find_auxiliary_atoms},
    formula::{Assignment, Atom, Formula},
    mapping::AbstractionMapping,
    obdd::Bdd,
    sdd::SddManager,
    solver::{Converter, Reasoner, SatResult},
    telemetry::{ComputationLog, LogExt},
    walker,
};
use derivative::Derivative;
use num_bigint::BigUint;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    cell::RefCell,
    collections::HashSet,
    fs,
    path::Path,
    rc::Rc,
    time::Instant,
};

/// A theory diagram built on binary decision diagrams.
pub type TheoryBdd = TheoryDD<Bdd>;
/// A theory diagram built on sentential decision diagrams.
pub type TheorySdd = TheoryDD<SddManager>;

const ABSTRACTION_FILE: &str = "abstraction.json";
const QVARS_FILE: &str = "qvars.json";
const LAYOUT_FILE: &str = "layout.json";
const DIAGRAM_FILE: &str = "diagram.json";

/// Everything besides the formula and the reasoner that steers a compilation.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Clone(bound = ""))]
pub struct CompileOptions<B: Backend> {
    /// Lemmas to use instead of running the reasoner.
    pub lemmas: Option<Vec<Formula>>,
    /// Known verdict; only consulted together with [CompileOptions::lemmas].
    pub sat_hint: Option<SatResult>,
    /// Explicit variable order or vtree, which has to cover every label exactly once.
    pub layout: Option<B::Layout>,
    /// Explicit order of the atoms, translated into labels.
    pub ordering: Option<Vec<Atom>>,
    /// Shape of the layout derived from the order.
    pub shape: B::Shape,
    /// Extract lemmas from `⋀ (a ∨ ¬a)` per atom partition instead of the formula.
    pub enumerate_true: bool,
    /// Let the reasoner enumerate over Boolean surrogates of the theory atoms.
    pub use_surrogates: bool,
}

impl<B: Backend> Default for CompileOptions<B> {
    fn default() -> Self {
        Self {
            lemmas: None,
            sat_hint: None,
            layout: None,
            ordering: None,
            shape: B::Shape::default(),
            enumerate_true: false,
            use_surrogates: true,
        }
    }
}

impl<B: Backend> CompileOptions<B> {
    /// Uses `lemmas` instead of running the reasoner.
    pub fn with_lemmas(mut self, lemmas: Vec<Formula>) -> Self {
        self.lemmas = Some(lemmas);
        self
    }

    /// Sets the verdict which comes along with pre-supplied lemmas.
    ///
    /// [SatResult::Unsat] is trusted as is: the formula is not compiled and the
    /// diagram is FALSE. Without pre-supplied lemmas the reasoner's verdict is used.
    pub fn with_sat_hint(mut self, sat_hint: SatResult) -> Self {
        self.sat_hint = Some(sat_hint);
        self
    }

    /// Fixes the layout.
    pub fn with_layout(mut self, layout: B::Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Fixes the order of the atoms.
    pub fn with_ordering(mut self, ordering: Vec<Atom>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Sets the shape of derived layouts.
    pub fn with_shape(mut self, shape: B::Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Switches the "assume true" lemma extraction on or off.
    pub fn enumerate_true(mut self, enumerate_true: bool) -> Self {
        self.enumerate_true = enumerate_true;
        self
    }

    /// Switches the Boolean surrogates on or off.
    pub fn use_surrogates(mut self, use_surrogates: bool) -> Self {
        self.use_surrogates = use_surrogates;
        self
    }
}

/// A decision diagram whose models are the T-consistent models of a formula.
///
/// Cloning is cheap: clones share the backend's node table and the mapping.
/// [TheoryDD::condition] only replaces the root of the conditioned value.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Clone(bound = ""))]
pub struct TheoryDD<B: Backend> {
    mapping: Rc<AbstractionMapping>,
    qvars: Vec<Label>,
    #[derivative(Debug = "ignore")]
    backend: Rc<RefCell<B>>,
    root: B::Node,
    #[derivative(Debug = "ignore")]
    count_cache: RefCell<Option<BigUint>>,
}

impl<B: Backend> TheoryDD<B> {
    /// Compiles `phi` together with the theory lemmas of its atoms.
    ///
    /// The lemmas are taken from the options if present, otherwise they are extracted
    /// with `reasoner`; in that case the reasoner's verdict replaces any hint.
    pub fn new(
        phi: &Formula,
        reasoner: &mut dyn Reasoner,
        options: CompileOptions<B>,
        log: Option<&mut ComputationLog>,
    ) -> Result<Self> {
        let section = format!("T-{}", B::KIND.to_uppercase());
        let mut log = log.map(|log| log.section(&section));
        log::info!("[Start] compiling a theory {}", B::KIND);

        let start = Instant::now();
        let phi = reasoner.converter().normalize_formula(phi);
        log.time("phi normalization time", start.elapsed());

        let start = Instant::now();
        let (lemmas, sat_hint) = match &options.lemmas {
            Some(lemmas) => {
                log.text("ALL SMT mode", "loaded");
                (lemmas.clone(), options.sat_hint)
            }
            None => {
                log.text("ALL SMT mode", "computed");
                let extraction = extract(
                    &phi,
                    reasoner,
                    options.enumerate_true,
                    options.use_surrogates,
                    log.as_deref_mut(),
                )?;
                (extraction.lemmas, Some(extraction.verdict))
            }
        };
        let converter = reasoner.converter();
        let lemmas: Vec<Formula> = lemmas
            .iter()
            .map(|lemma| converter.normalize_formula(lemma))
            .collect();
        log.time("lemmas loading time", start.elapsed());

        Self::compile(phi, lemmas, sat_hint, converter, options, log)
    }

    /// Compiles the Boolean abstraction of `phi` alone, without any lemmas.
    pub fn abstraction(
        phi: &Formula,
        converter: &dyn Converter,
        options: CompileOptions<B>,
        log: Option<&mut ComputationLog>,
    ) -> Result<Self> {
        let section = format!("Abstraction {}", B::KIND.to_uppercase());
        let mut log = log.map(|log| log.section(&section));
        log::info!("[Start] compiling the abstraction {}", B::KIND);
        let start = Instant::now();
        let phi = converter.normalize_formula(phi);
        log.time("phi normalization time", start.elapsed());
        let sat_hint = options.sat_hint;
        Self::compile(phi, Vec::new(), sat_hint, converter, options, log)
    }

    fn compile(
        phi: Formula,
        lemmas: Vec<Formula>,
        sat_hint: Option<SatResult>,
        converter: &dyn Converter,
        options: CompileOptions<B>,
        mut log: Option<&mut ComputationLog>,
    ) -> Result<Self> {
        let lemmas = Formula::big_and(lemmas);
        let phi_and_lemmas = Formula::and(vec![phi.clone(), lemmas.clone()]);
        let auxiliary = find_auxiliary_atoms(&phi, &phi_and_lemmas, log.as_deref_mut());

        let start = Instant::now();
        let mapping = AbstractionMapping::assign(&phi_and_lemmas.atoms());
        let qvars = auxiliary
            .iter()
            .map(|atom| mapping.require(atom))
            .collect::<Result<Vec<Label>>>()?;
        log.time("variable mapping creation time", start.elapsed());

        let start = Instant::now();
        let labels = mapping.labels();
        let layout = match (options.layout, options.ordering) {
            (Some(layout), _) => layout,
            (None, Some(ordering)) => {
                let order = ordering
                    .iter()
                    .map(|atom| {
                        let atom = converter.normalize(atom);
                        mapping.label(&atom).ok_or_else(|| {
                            TddError::OrderingMismatch(format!("'{}' is not an atom of the formula", atom))
                        })
                    })
                    .collect::<Result<Vec<Label>>>()?;
                B::layout_for(&order, options.shape)?
            }
            (None, None) => B::layout_for(&B::default_order(&labels, &qvars), options.shape)?,
        };
        B::check_layout(&layout, &labels)?;
        let mut backend = B::with_layout(layout)?;
        log.time("DD preparation time", start.elapsed());

        let root = walker::build(
            &mut backend,
            &mapping,
            &phi,
            &lemmas,
            &qvars,
            sat_hint,
            log.as_deref_mut(),
        )?;
        log::info!(
            "[Done] theory {} over {} labels, {} of them projected",
            B::KIND,
            mapping.len(),
            qvars.len()
        );
        Ok(Self {
            mapping: Rc::new(mapping),
            qvars,
            backend: Rc::new(RefCell::new(backend)),
            root,
            count_cache: RefCell::new(None),
        })
    }

    /// The abstraction mapping.
    pub fn mapping(&self) -> &AbstractionMapping {
        &self.mapping
    }

    /// The labels of the auxiliary atoms, which were projected away.
    pub fn qvars(&self) -> &[Label] {
        &self.qvars
    }

    /// The root handle.
    pub fn root(&self) -> B::Node {
        self.root
    }

    /// The shared backend.
    pub fn backend(&self) -> Rc<RefCell<B>> {
        Rc::clone(&self.backend)
    }

    /// Labels the models range over: all labels but the projected ones.
    fn care_labels(&self) -> Vec<Label> {
        let qvars: HashSet<Label> = self.qvars.iter().copied().collect();
        self.mapping
            .labels()
            .into_iter()
            .filter(|label| !qvars.contains(label))
            .collect()
    }

    /// Returns true if the formula has a T-consistent model.
    pub fn is_sat(&self) -> bool {
        !self.backend.borrow().is_false(self.root)
    }

    /// Returns true if every assignment of the formula's atoms is a T-consistent model.
    pub fn is_valid(&self) -> bool {
        self.backend.borrow().is_true(self.root)
    }

    /// Number of nodes of the diagram.
    pub fn node_count(&self) -> usize {
        self.backend.borrow().node_count(self.root)
    }

    /// Number of edges of the diagram.
    pub fn edge_count(&self) -> usize {
        self.backend.borrow().edge_count(self.root)
    }

    /// Number of T-consistent models over the formula's own atoms.
    pub fn model_count(&self) -> BigUint {
        if let Some(count) = self.count_cache.borrow().as_ref() {
            return count.clone();
        }
        let count = self
            .backend
            .borrow()
            .model_count(self.root, &self.care_labels());
        *self.count_cache.borrow_mut() = Some(count.clone());
        count
    }

    /// One model, or `None` if there is none.
    pub fn pick(&self) -> Result<Option<Assignment>> {
        self.pick_all_iter().next().transpose()
    }

    /// All models.
    pub fn pick_all(&self) -> Result<Vec<Assignment>> {
        self.pick_all_iter().collect()
    }

    /// Lazily enumerates the models, depth-first.
    ///
    /// The backend is shared with every clone of this diagram; none of them may be used
    /// while the iterator is advanced.
    pub fn pick_all_iter(&self) -> Models<B> {
        Models {
            inner: ModelIter::new(Rc::clone(&self.backend), self.root, &self.care_labels()),
            mapping: Rc::clone(&self.mapping),
        }
    }

    /// Fixes the label of `literal` to its polarity.
    ///
    /// Only this value changes; clones keep their root.
    pub fn condition(&mut self, literal: Literal) -> Result<()> {
        self.mapping.refine(literal.label)?;
        log::debug!("conditioning on {}", literal);
        self.root = self
            .backend
            .borrow_mut()
            .cofactor(self.root, literal.label, literal.positive);
        *self.count_cache.get_mut() = None;
        Ok(())
    }

    /// Fixes `atom` to `value`; the atom has to be given in normalized form.
    pub fn condition_atom(&mut self, atom: &Atom, value: bool) -> Result<()> {
        let label = self.mapping.require(atom)?;
        self.condition(Literal::new(label, value))
    }

    /// A conditioned copy which shares the backend with `self`.
    pub fn conditioned(&self, literal: Literal) -> Result<Self> {
        let mut result = self.clone();
        result.condition(literal)?;
        Ok(result)
    }

    /// Writes the mapping, the projected labels, the layout and the diagram into
    /// `folder`, which is created if necessary.
    pub fn save(&self, folder: impl AsRef<Path>) -> Result<()> {
        let folder = folder.as_ref();
        log::info!("[Start] saving the theory {} to {}", B::KIND, folder.display());
        fs::create_dir_all(folder)?;
        let backend = self.backend.borrow();
        write_component(folder, ABSTRACTION_FILE, &*self.mapping)?;
        write_component(folder, QVARS_FILE, &self.qvars)?;
        write_component(folder, LAYOUT_FILE, backend.layout())?;
        write_component(folder, DIAGRAM_FILE, &backend.export(self.root))?;
        log::info!("[Done] saved");
        Ok(())
    }

    /// Restores a diagram written by [TheoryDD::save].
    ///
    /// Fails with [TddError::CorruptPersistedState] if a file is missing or malformed
    /// or the files do not fit together.
    pub fn load(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref();
        log::info!("[Start] loading a theory {} from {}", B::KIND, folder.display());
        let mapping: AbstractionMapping = read_component(folder, ABSTRACTION_FILE)?;
        let qvars: Vec<Label> = read_component(folder, QVARS_FILE)?;
        let layout: B::Layout = read_component(folder, LAYOUT_FILE)?;
        let blob: B::Blob = read_component(folder, DIAGRAM_FILE)?;

        if let Some(label) = qvars.iter().find(|label| mapping.refine(**label).is_err()) {
            return Err(TddError::corrupt(
                QVARS_FILE,
                format!("{} is not part of the mapping", label),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(label) = qvars.iter().find(|label| !seen.insert(**label)) {
            return Err(TddError::corrupt(
                QVARS_FILE,
                format!("{} is listed twice", label),
            ));
        }
        B::check_layout(&layout, &mapping.labels())
            .map_err(|err| TddError::corrupt(LAYOUT_FILE, err))?;
        let mut backend =
            B::with_layout(layout).map_err(|err| TddError::corrupt(LAYOUT_FILE, err))?;
        let root = backend.import(&blob)?;
        log::info!("[Done] loaded {} labels", mapping.len());
        Ok(Self {
            mapping: Rc::new(mapping),
            qvars,
            backend: Rc::new(RefCell::new(backend)),
            root,
            count_cache: RefCell::new(None),
        })
    }
}

/// Iterator over the models of a [TheoryDD], see [TheoryDD::pick_all_iter].
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Models<B: Backend> {
    inner: ModelIter<B>,
    #[derivative(Debug = "ignore")]
    mapping: Rc<AbstractionMapping>,
}

impl<B: Backend> Iterator for Models<B> {
    type Item = Result<Assignment>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|literals| self.mapping.refinement().refine_assignment(&literals))
    }
}

fn write_component<T: Serialize + ?Sized>(folder: &Path, file: &str, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(folder.join(file), text)?;
    Ok(())
}

fn read_component<T: DeserializeOwned>(folder: &Path, file: &str) -> Result<T> {
    let text = fs::read_to_string(folder.join(file)).map_err(|err| TddError::corrupt(file, err))?;
    serde_json::from_str(&text).map_err(|err| TddError::corrupt(file, err))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        formula::Relation,
        sdd::{Vtree, VtreeShape},
        solver::{DifferenceConverter, TotalEnumerator},
    };
    use test_log::test;

    fn gt(k: i64) -> Atom {
        Atom::bound("x", Relation::Gt, k)
    }

    #[test]
    fn scenario_implied_bound() {
        // a := x > 0, b := x > 5, phi = b
        let phi = Formula::atom(gt(5));
        let lemma = Formula::or(vec![Formula::atom(gt(0)), Formula::atom(gt(5)).not()]);
        let options = CompileOptions::<Bdd>::default()
            .with_lemmas(vec![lemma])
            .with_sat_hint(SatResult::Sat);
        let mut reasoner = TotalEnumerator::default();
        let tbdd = TheoryBdd::new(&phi, &mut reasoner, options, None).unwrap();
        assert!(tbdd.is_sat());
        assert!(!tbdd.is_valid());
        assert_eq!(tbdd.qvars().len(), 1);
        assert_eq!(tbdd.model_count(), BigUint::from(1u32));
        // a only occurs in the lemma, so it is projected out of the model
        assert_eq!(
            tbdd.pick_all().unwrap(),
            vec![Assignment::from([(gt(5), true)])]
        );
    }

    #[test]
    fn scenario_implied_bound_mentioning_both() {
        // phi = b & (a | b) keeps a, and the only model sets both
        let phi = Formula::and(vec![
            Formula::atom(gt(5)),
            Formula::or(vec![Formula::atom(gt(0)), Formula::atom(gt(5))]),
        ]);
        let lemma = Formula::or(vec![Formula::atom(gt(0)), Formula::atom(gt(5)).not()]);
        let options = CompileOptions::<SddManager>::default()
            .with_lemmas(vec![lemma])
            .with_sat_hint(SatResult::Sat);
        let mut reasoner = TotalEnumerator::default();
        let tsdd = TheorySdd::new(&phi, &mut reasoner, options, None).unwrap();
        assert!(tsdd.is_sat());
        assert!(!tsdd.is_valid());
        assert!(tsdd.qvars().is_empty());
        assert_eq!(tsdd.model_count(), BigUint::from(1u32));
        assert_eq!(
            tsdd.pick_all().unwrap(),
            vec![Assignment::from([(gt(0), true), (gt(5), true)])]
        );
    }

    #[test]
    fn telemetry_sections() {
        let phi = Formula::and(vec![Formula::atom(gt(5)), Formula::atom(gt(0))]);
        let mut reasoner = TotalEnumerator::default();
        let mut log = ComputationLog::new();
        let options = CompileOptions::<SddManager>::default().enumerate_true(true);
        TheorySdd::new(&phi, &mut reasoner, options, Some(&mut log)).unwrap();
        let section = match log.get("T-SDD") {
            Some(crate::telemetry::LogEntry::Section(section)) => section,
            other => panic!("unexpected entry {:?}", other),
        };
        for key in [
            "phi normalization time",
            "All-SMT computation time",
            "T-lemmas amount",
            "lemmas loading time",
            "variable mapping creation time",
            "DD joining time",
        ] {
            assert!(section.get(key).is_some(), "{} missing", key);
        }
    }

    #[test]
    fn ordering_by_atoms() {
        let phi = Formula::or(vec![Formula::atom(Atom::boolean("p")), Formula::atom(gt(5))]);
        let options = CompileOptions::<Bdd>::default()
            .with_lemmas(vec![])
            .with_ordering(vec![gt(5), Atom::boolean("p")]);
        let mut reasoner = TotalEnumerator::default();
        let tbdd = TheoryBdd::new(&phi, &mut reasoner, options, None).unwrap();
        assert_eq!(tbdd.backend().borrow().order(), &[Label(2), Label(1)]);

        let incomplete = CompileOptions::<Bdd>::default()
            .with_lemmas(vec![])
            .with_ordering(vec![gt(5)]);
        assert!(matches!(
            TheoryBdd::new(&phi, &mut reasoner, incomplete, None),
            Err(TddError::OrderingMismatch(_))
        ));
        let foreign = CompileOptions::<Bdd>::default()
            .with_lemmas(vec![])
            .with_ordering(vec![gt(5), Atom::boolean("p"), Atom::boolean("q")]);
        assert!(matches!(
            TheoryBdd::new(&phi, &mut reasoner, foreign, None),
            Err(TddError::OrderingMismatch(_))
        ));
    }

    #[test]
    fn explicit_vtree_must_cover_labels() {
        let phi = Formula::and(vec![Formula::atom(Atom::boolean("p")), Formula::atom(Atom::boolean("q"))]);
        let wrong = Vtree::new(&[Label(1)], VtreeShape::Balanced).unwrap();
        let options = CompileOptions::<SddManager>::default().with_layout(wrong);
        assert!(matches!(
            TheorySdd::abstraction(&phi, &DifferenceConverter, options, None),
            Err(TddError::OrderingMismatch(_))
        ));
        let right = Vtree::new(&[Label(2), Label(1)], VtreeShape::Right).unwrap();
        let options = CompileOptions::<SddManager>::default().with_layout(right);
        let tsdd = TheorySdd::abstraction(&phi, &DifferenceConverter, options, None).unwrap();
        assert_eq!(tsdd.model_count(), BigUint::from(1u32));
    }

    #[test]
    fn conditioning_is_copy_on_write() {
        let phi = Formula::or(vec![Formula::atom(Atom::boolean("p")), Formula::atom(Atom::boolean("q"))]);
        let tbdd = TheoryBdd::abstraction(&phi, &DifferenceConverter, CompileOptions::default(), None).unwrap();
        assert_eq!(tbdd.model_count(), BigUint::from(3u32));
        let conditioned = tbdd.conditioned(Literal::from(-1)).unwrap();
        assert_eq!(conditioned.model_count(), BigUint::from(2u32));
        assert_eq!(tbdd.model_count(), BigUint::from(3u32));
        assert_eq!(tbdd.pick_all().unwrap().len(), 3);
        assert_eq!(conditioned.pick_all().unwrap().len(), 2);

        let mut copy = tbdd.clone();
        copy.condition_atom(&Atom::boolean("q"), true).unwrap();
        assert!(copy.is_valid());
        assert!(!tbdd.is_valid());
        assert!(matches!(
            copy.condition(Literal::from(7)),
            Err(TddError::UnknownLabel(Label(7)))
        ));
        assert!(matches!(
            copy.condition_atom(&Atom::boolean("r"), true),
            Err(TddError::UnmappedAtom(_))
        ));
    }
}
