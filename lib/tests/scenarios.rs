use num_bigint::BigUint;
use test_log::test;
use theory_dd::{
    datatypes::{Label, Literal},
    formula::{Atom, Formula, Relation},
    parser::parse_formula,
    sdd::{Vtree, VtreeShape},
    solver::{
        DifferenceConverter, EnumeratorOptions, ExtendedPartialEnumerator, ReasonerKind, SatResult,
        TotalEnumerator,
    },
    telemetry::{ComputationLog, LogEntry},
    CompileOptions, TddError, TheoryBdd, TheorySdd,
};

fn gt(k: i64) -> Atom {
    Atom::bound("x", Relation::Gt, k)
}

#[test]
fn implied_bound_with_loaded_lemma() {
    let phi = Formula::atom(gt(5));
    let lemma = parse_formula("or(gt(x,0),neg(gt(x,5)))").unwrap();
    let mut reasoner = TotalEnumerator::default();
    for shape in [VtreeShape::Balanced, VtreeShape::Left, VtreeShape::Right] {
        let options = CompileOptions::default()
            .with_lemmas(vec![lemma.clone()])
            .with_sat_hint(SatResult::Sat)
            .with_shape(shape);
        let tsdd = TheorySdd::new(&phi, &mut reasoner, options, None).unwrap();
        assert_eq!(tsdd.model_count(), BigUint::from(1u32));
        let model = tsdd.pick().unwrap().unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.get(&gt(5)), Some(&true));
    }
}

#[test]
fn constants() {
    let mut reasoner = TotalEnumerator::default();
    let top = TheoryBdd::new(&Formula::top(), &mut reasoner, CompileOptions::default(), None).unwrap();
    assert!(top.is_valid());
    assert_eq!(top.model_count(), BigUint::from(1u32));
    assert_eq!(top.pick_all().unwrap().len(), 1);
    assert_eq!(top.node_count(), 1);

    let bottom =
        TheorySdd::new(&Formula::bottom(), &mut reasoner, CompileOptions::default(), None).unwrap();
    assert!(!bottom.is_sat());
    assert_eq!(bottom.model_count(), BigUint::from(0u32));
    assert_eq!(bottom.pick().unwrap(), None);
    assert_eq!(bottom.node_count(), 1);
}

#[test]
fn unsat_hint_gives_the_empty_diagram() {
    let phi = parse_formula("and(a,or(b,gt(x,3)))").unwrap();
    let mut reasoner = TotalEnumerator::default();
    let mut log = ComputationLog::new();
    let options = CompileOptions::default()
        .with_lemmas(vec![])
        .with_sat_hint(SatResult::Unsat);
    let tbdd = TheoryBdd::new(&phi, &mut reasoner, options, Some(&mut log)).unwrap();
    assert!(!tbdd.is_sat());
    assert_eq!(tbdd.node_count(), 1);
    assert_eq!(tbdd.model_count(), BigUint::from(0u32));
    match log.get("T-BDD") {
        Some(LogEntry::Section(section)) => {
            assert!(section.get("UNSAT DD building time").is_some());
            assert_eq!(section.get("ALL SMT mode"), Some(&LogEntry::Text("loaded".to_string())));
        }
        other => panic!("unexpected log entry {:?}", other),
    }
}

#[test]
fn unsat_formula_is_detected() {
    let phi = parse_formula("and(gt(x,5),le(x,0),p)").unwrap();
    for kind in [ReasonerKind::Total, ReasonerKind::Partial, ReasonerKind::Extended] {
        let mut reasoner = kind.build(EnumeratorOptions::default());
        let tbdd =
            TheoryBdd::new(&phi, reasoner.as_mut(), CompileOptions::default(), None).unwrap();
        assert!(!tbdd.is_sat(), "{}", kind);
        let tsdd =
            TheorySdd::new(&phi, reasoner.as_mut(), CompileOptions::default(), None).unwrap();
        assert!(!tsdd.is_sat(), "{}", kind);
    }
}

#[test]
fn count_matches_enumeration() {
    let phi = parse_formula(
        "or(and(lt(x,y,0),lt(y,z,0)),and(lt(z,x,0),a),xor(b,gt(x,2)),le(z,y,-1))",
    )
    .unwrap();
    let mut reasoner = TotalEnumerator::default();
    let tbdd = TheoryBdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
    let tsdd = TheorySdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
    assert_eq!(tbdd.model_count(), tsdd.model_count());
    assert_eq!(
        tbdd.model_count(),
        BigUint::from(tbdd.pick_all().unwrap().len())
    );
    assert_eq!(
        tsdd.model_count(),
        BigUint::from(tsdd.pick_all_iter().count())
    );

    // the cofactor no longer depends on a, so a shows up in both polarities
    let a = Atom::boolean("a");
    let label = tbdd.mapping().require(&a).unwrap();
    let all = tbdd.pick_all().unwrap();
    for value in [true, false] {
        let conditioned = tbdd.conditioned(Literal::new(label, value)).unwrap();
        let models = conditioned.pick_all().unwrap();
        assert_eq!(conditioned.model_count(), BigUint::from(models.len()));
        let agreeing = all
            .iter()
            .filter(|model| model.get(&a) == Some(&value))
            .count();
        assert_eq!(models.len(), 2 * agreeing);
        assert!(models.iter().all(|model| {
            let mut flipped = model.clone();
            flipped.insert(a.clone(), value);
            all.contains(&flipped)
        }));
    }
}

#[test]
fn models_never_mention_auxiliary_atoms() {
    // the extended partial enumerator learns lemmas over atoms the formula misses
    let phi = parse_formula("and(or(gt(x,5),a),or(le(x,2),b),or(eq(x,4),neg(a)))").unwrap();
    let mut reasoner = ExtendedPartialEnumerator::new(EnumeratorOptions {
        model_limit: None,
        split_equalities: true,
    });
    let tbdd = TheoryBdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
    let atoms = phi.atoms();
    let qvars = tbdd.qvars().to_vec();
    for label in &qvars {
        let atom = tbdd.mapping().refine(*label).unwrap();
        assert!(!atoms.contains(atom));
    }
    for model in tbdd.pick_all().unwrap() {
        assert_eq!(model.len(), atoms.len());
        assert!(model.keys().all(|atom| atoms.contains(atom)));
    }
}

#[test]
fn assume_true_finds_every_conflict() {
    // the formula alone never lets the reasoner see gt(x,5) with le(x,0)
    let phi = parse_formula("or(gt(x,5),le(x,0))").unwrap();
    let mut reasoner = TotalEnumerator::default();
    let plain = TheoryBdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
    let options = CompileOptions::default().enumerate_true(true);
    let assumed = TheoryBdd::new(&phi, &mut reasoner, options, None).unwrap();
    assert_eq!(assumed.model_count(), BigUint::from(2u32));
    assert!(plain.model_count() >= assumed.model_count());
}

#[test]
fn ordering_mismatches() {
    let phi = parse_formula("and(or(p,q),gt(x,1))").unwrap();
    let mut reasoner = TotalEnumerator::default();
    let options = CompileOptions::default()
        .with_lemmas(vec![])
        .with_ordering(vec![Atom::boolean("p"), Atom::boolean("q")]);
    assert!(matches!(
        TheoryBdd::new(&phi, &mut reasoner, options, None),
        Err(TddError::OrderingMismatch(_))
    ));

    let vtree = Vtree::new(&[Label(1), Label(2), Label(3), Label(4)], VtreeShape::Balanced).unwrap();
    let options = CompileOptions::default().with_layout(vtree);
    assert!(matches!(
        TheorySdd::abstraction(&phi, &DifferenceConverter, options, None),
        Err(TddError::OrderingMismatch(_))
    ));

    // ge(x,2) normalizes to gt(x,1)
    let options = CompileOptions::default().with_lemmas(vec![]).with_ordering(vec![
        Atom::bound("x", Relation::Ge, 2),
        Atom::boolean("q"),
        Atom::boolean("p"),
    ]);
    let tbdd = TheoryBdd::new(&phi, &mut reasoner, options, None).unwrap();
    assert_eq!(tbdd.model_count(), BigUint::from(3u32));
}
