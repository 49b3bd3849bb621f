/*!
This library compiles formulae over Boolean symbols and integer difference constraints into `theory-consistent decision diagrams (T-DDs)`.

# Theory-consistent decision diagrams
A decision diagram of the Boolean abstraction of a formula has one path per Boolean model of the abstraction, including models which make no sense in the background theory (e.g. `x > 5` true and `x > 0` false).
A T-DD removes these paths: the formula is conjoined with the `theory lemmas` of its atoms, i.e. clauses which are valid in the theory and rule out the inconsistent combinations.
Lemmas may mention fresh atoms which do not occur in the formula; these are existentially quantified away again, so that the diagram speaks about the formula's atoms only.

The compilation is done in four steps:
- the lemmas are extracted by an all-SAT enumeration modulo the theory (see [solver] and [extract]), or supplied by the caller
- every atom of the formula and the lemmas gets a [label][datatypes::Label] (see [mapping])
- formula and lemmas are compiled into diagrams bottom up (see [walker]), the fresh atoms are quantified out of the lemmas and both parts are conjoined
- the resulting [TheoryDD][tdd::TheoryDD] answers satisfiability, validity, model counting and enumeration queries and can be conditioned, saved and loaded

# Diagram engines
Two engines implement the [Backend][backend::Backend] interface:
- [obdd::Bdd]: reduced ordered binary decision diagrams over an arbitrary variable order
- [sdd::SddManager]: compressed and trimmed sentential decision diagrams over a [vtree][sdd::Vtree]

Both engines hash-cons their nodes, so equivalent sub-diagrams are stored only once and equivalence checks are handle comparisons.

# Input format
Formulae are written in prefix notation (see [parser]):
- `and(x,y,...)`, `or(x,y,...)`: conjunction and disjunction
- `imp(x,y)`, `iff(x,y)`, `xor(x,y)`: implication, equivalence and exclusive or
- `ite(c,t,e)`: if-then-else
- `neg(x)`: classical negation
- `c(v)`, `c(f)`: verum and falsum
- `le(x,k)`, `lt(x,k)`, `eq(x,k)`, `ge(x,k)`, `gt(x,k)`: the constraint `x REL k`
- `le(x,y,k)`, ...: the difference constraint `x - y REL k`
- everything else is a Boolean symbol
*/

/*!
## Usage examples
Compile a formula with lemmas extracted by the total enumerator:
```rust
use theory_dd::parser::parse_formula;
use theory_dd::solver::TotalEnumerator;
use theory_dd::tdd::{CompileOptions, TheoryBdd};

let phi = parse_formula("and(gt(x,5),or(neg(gt(x,0)),p))").unwrap();
let mut reasoner = TotalEnumerator::default();
let tbdd = TheoryBdd::new(&phi, &mut reasoner, CompileOptions::default(), None).unwrap();
// x > 5 implies x > 0, so p has to hold
for model in tbdd.pick_all().unwrap() {
    assert_eq!(model.get(&theory_dd::formula::Atom::boolean("p")), Some(&true));
}
assert_eq!(tbdd.model_count().to_string(), "1");
```

### use sentential decision diagrams and inspect the timings
```rust
use theory_dd::parser::parse_formula;
use theory_dd::sdd::VtreeShape;
use theory_dd::solver::TotalEnumerator;
use theory_dd::tdd::{CompileOptions, TheorySdd};
use theory_dd::telemetry::ComputationLog;

let phi = parse_formula("or(and(lt(x,y,0),lt(y,z,0)),lt(z,x,0))").unwrap();
let mut reasoner = TotalEnumerator::default();
let mut log = ComputationLog::new();
let options = CompileOptions::default()
    .with_shape(VtreeShape::Right)
    .enumerate_true(true);
let tsdd = TheorySdd::new(&phi, &mut reasoner, options, Some(&mut log)).unwrap();
assert!(tsdd.is_sat());
assert!(log.get("T-SDD").is_some());
println!("{}", serde_json::to_string_pretty(&log).unwrap());
```

### persist a diagram
```rust
use theory_dd::parser::parse_formula;
use theory_dd::solver::DifferenceConverter;
use theory_dd::tdd::{CompileOptions, TheoryBdd};

let phi = parse_formula("xor(a,b)").unwrap();
let tbdd = TheoryBdd::abstraction(&phi, &DifferenceConverter, CompileOptions::default(), None).unwrap();
let folder = std::env::temp_dir().join("theory_dd_doc_example");
tbdd.save(&folder).unwrap();
let loaded = TheoryBdd::load(&folder).unwrap();
assert_eq!(loaded.model_count(), tbdd.model_count());
# std::fs::remove_dir_all(&folder).unwrap();
```
*/
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod backend;
pub mod datatypes;
pub mod error;
pub mod extract;
pub mod formula;
pub mod mapping;
pub mod obdd;
pub mod parser;
pub mod partition;
pub mod sdd;
pub mod solver;
pub mod tdd;
pub mod telemetry;
pub mod walker;

pub use error::{Result, TddError};
pub use tdd::{CompileOptions, TheoryBdd, TheoryDD, TheorySdd};
