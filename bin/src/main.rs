/*!
This binary compiles formulae over Boolean symbols and integer difference constraints into `theory-consistent decision diagrams (T-DDs)`.

# Theory-consistent decision diagrams
A T-DD is a decision diagram of the Boolean abstraction of a formula, conjoined with the theory lemmas of its atoms.
Atoms which only occur in the lemmas are existentially quantified away, so every path to true describes an assignment of the formula's atoms which is consistent in the theory.
The lemmas are computed by an all-SAT enumeration modulo integer difference logic, or read from a file.

Binary decision diagrams (`--dd bdd`) and sentential decision diagrams over a vtree (`--dd sdd`) are supported.

# Input format
The input file holds one formula in prefix notation, e.g.
```plain
and(or(gt(x,5),a),imp(a,lt(x,y,3)))
```
A lemma file holds one formula per line.

# Usage
```plain
Usage: theory-dd [OPTIONS] [INPUT]

Arguments:
  [INPUT]  Input filename

Options:
      --rust_log <RUST_LOG>      Sets the verbosity to 'warn', 'info', 'debug' or 'trace' if -v and -q are not use [env: RUST_LOG=]
      --dd <DD>                  Choose the decision diagram kind [default: bdd] [possible values: bdd, sdd]
      --vtree <VTREE>            Shape of the vtree for sentential decision diagrams [default: balanced]
      --solver <SOLVER>          Choose the all-SAT enumerator: 'total', 'partial' or 'extended' [default: total]
      --assume-true              Extract lemmas from the tautology over each atom partition instead of the formula
      --no-surrogates            Do not offer Boolean surrogates of the theory atoms to the enumerator
      --split-equalities         Learn the splitting lemma of every true equality
      --model-limit <LIMIT>      Give up once the enumerator found more models than this
      --lemmas <LEMMAS>          Read the lemmas from a file instead of computing them
      --sat-hint <SAT_HINT>      Verdict which comes along with the lemma file [possible values: sat, unsat]
      --abstraction              Compile the Boolean abstraction only
      --order <ORDER>            Semicolon separated list of atoms, the variable order of the diagram
      --condition <LITERAL>      Condition on a label, e.g. '3' or '-3'; may be repeated
      --pick                     Print one model
      --models                   Print all models
      --save <SAVE>              Save the diagram into the given folder
      --load <LOAD>              Load a diagram from the given folder instead of compiling one
      --log-json <LOG_JSON>      Write the timings and sizes of the computation as JSON
  -v...                          Sets log verbosity (multiple times means more verbose)
  -q                             Sets log verbosity to only errors
  -h, --help                     Print help
  -V, --version                  Print version
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

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use theory_dd::{
    backend::Backend,
    datatypes::Literal,
    formula::{Assignment, Atom, Formula, Node},
    obdd::Bdd,
    parser::FormulaParser,
    sdd::{SddManager, VtreeShape},
    solver::{EnumeratorOptions, ReasonerKind, SatResult},
    telemetry::ComputationLog,
    CompileOptions, Result, TddError, TheoryDD,
};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum DdKind {
    Bdd,
    Sdd,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Hint {
    Sat,
    Unsat,
}

impl From<Hint> for SatResult {
    fn from(hint: Hint) -> Self {
        match hint {
            Hint::Sat => SatResult::Sat,
            Hint::Unsat => SatResult::Unsat,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct App {
    /// Input filename
    #[arg(required_unless_present("load"))]
    input: Option<PathBuf>,
    /// Sets the verbosity to 'warn', 'info', 'debug' or 'trace' if -v and -q are not use
    #[arg(long = "rust_log", env)]
    rust_log: Option<String>,
    /// Choose the decision diagram kind
    #[arg(long, value_enum, default_value_t = DdKind::Bdd)]
    dd: DdKind,
    /// Shape of the vtree for sentential decision diagrams
    #[arg(long, default_value_t = VtreeShape::Balanced)]
    vtree: VtreeShape,
    /// Choose the all-SAT enumerator: 'total', 'partial' or 'extended'
    #[arg(long, default_value_t = ReasonerKind::Total)]
    solver: ReasonerKind,
    /// Extract lemmas from the tautology over each atom partition instead of the formula
    #[arg(long)]
    assume_true: bool,
    /// Do not offer Boolean surrogates of the theory atoms to the enumerator
    #[arg(long)]
    no_surrogates: bool,
    /// Learn the splitting lemma of every true equality
    #[arg(long)]
    split_equalities: bool,
    /// Give up once the enumerator found more models than this
    #[arg(long, value_name = "LIMIT")]
    model_limit: Option<usize>,
    /// Read the lemmas from a file instead of computing them
    #[arg(long, conflicts_with = "abstraction")]
    lemmas: Option<PathBuf>,
    /// Verdict which comes along with the lemma file
    #[arg(long, value_enum, requires = "lemmas")]
    sat_hint: Option<Hint>,
    /// Compile the Boolean abstraction only
    #[arg(long)]
    abstraction: bool,
    /// Semicolon separated list of atoms, the variable order of the diagram
    #[arg(long)]
    order: Option<String>,
    /// Condition on a label, e.g. '3' or '-3'; may be repeated
    #[arg(long, value_name = "LITERAL", allow_hyphen_values = true)]
    condition: Vec<Literal>,
    /// Print one model
    #[arg(long)]
    pick: bool,
    /// Print all models
    #[arg(long)]
    models: bool,
    /// Save the diagram into the given folder
    #[arg(long)]
    save: Option<PathBuf>,
    /// Load a diagram from the given folder instead of compiling one
    #[arg(long, conflicts_with_all = ["input", "lemmas", "abstraction", "order"])]
    load: Option<PathBuf>,
    /// Write the timings and sizes of the computation as JSON
    #[arg(long)]
    log_json: Option<PathBuf>,
    /// Sets log verbosity (multiple times means more verbose)
    #[arg(short, action = clap::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Sets log verbosity to only errors
    #[arg(short, group = "verbosity")]
    quiet: bool,
}

impl App {
    fn init_logging(&self) {
        let filter_level = match self.verbose {
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            3 => log::LevelFilter::Trace,
            _ => {
                if self.quiet {
                    log::LevelFilter::Error
                } else if let Some(rust_log) = self.rust_log.clone() {
                    match rust_log.as_str() {
                        "error" => log::LevelFilter::Error,
                        "info" => log::LevelFilter::Info,
                        "debug" => log::LevelFilter::Debug,
                        "trace" => log::LevelFilter::Trace,
                        _ => log::LevelFilter::Warn,
                    }
                } else {
                    log::LevelFilter::Warn
                }
            }
        };
        env_logger::builder().filter_level(filter_level).init();
        log::info!("Version: {}", clap::crate_version!());
    }

    fn run(&self) -> Result<()> {
        match self.dd {
            DdKind::Bdd => self.process::<Bdd>(()),
            DdKind::Sdd => self.process::<SddManager>(self.vtree),
        }
    }

    fn process<B: Backend>(&self, shape: B::Shape) -> Result<()> {
        let mut log = ComputationLog::new();
        let mut tdd = match &self.load {
            Some(folder) => TheoryDD::<B>::load(folder)?,
            None => self.compile::<B>(shape, &mut log)?,
        };

        for literal in &self.condition {
            tdd.condition(*literal)?;
        }

        println!("SAT: {}", tdd.is_sat());
        println!("valid: {}", tdd.is_valid());
        println!("nodes: {}", tdd.node_count());
        println!("edges: {}", tdd.edge_count());
        println!("projected: {}", tdd.qvars().len());
        println!("models: {}", tdd.model_count());

        if self.pick {
            match tdd.pick()? {
                Some(model) => println!("{}", print_assignment(&model)),
                None => println!("no model"),
            }
        }
        if self.models {
            for model in tdd.pick_all_iter() {
                println!("{}", print_assignment(&model?));
            }
        }
        if let Some(folder) = &self.save {
            tdd.save(folder)?;
        }
        if let Some(file) = &self.log_json {
            std::fs::write(file, serde_json::to_string_pretty(&log)?)?;
        }
        Ok(())
    }

    fn compile<B: Backend>(&self, shape: B::Shape, log: &mut ComputationLog) -> Result<TheoryDD<B>> {
        let parser = FormulaParser::default();
        let input = match &self.input {
            Some(input) => std::fs::read_to_string(input)?,
            None => String::new(),
        };
        let phi = parser.parse(&input)?;
        log::info!("[Done] parsing");

        let mut options = CompileOptions::<B>::default()
            .with_shape(shape)
            .enumerate_true(self.assume_true)
            .use_surrogates(!self.no_surrogates);
        if let Some(order) = &self.order {
            options = options.with_ordering(parse_order(&parser, order)?);
        }
        if let Some(file) = &self.lemmas {
            let lemmas = std::fs::read_to_string(file)?
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| parser.parse(line))
                .collect::<Result<Vec<Formula>>>()?;
            log::info!("[Done] read {} lemmas", lemmas.len());
            options = options.with_lemmas(lemmas);
            if let Some(hint) = self.sat_hint {
                options = options.with_sat_hint(hint.into());
            }
        }

        let mut reasoner = self.solver.build(EnumeratorOptions {
            model_limit: self.model_limit,
            split_equalities: self.split_equalities,
        });
        if self.abstraction {
            TheoryDD::abstraction(&phi, reasoner.converter(), options, Some(log))
        } else {
            TheoryDD::new(&phi, reasoner.as_mut(), options, Some(log))
        }
    }
}

fn parse_order(parser: &FormulaParser, order: &str) -> Result<Vec<Atom>> {
    order
        .split(';')
        .map(|item| {
            let formula = parser.parse(item)?;
            match formula.node() {
                Node::Atom(atom) => Ok(atom.clone()),
                _ => Err(TddError::Parse(item.to_string())),
            }
        })
        .collect()
}

fn print_assignment(model: &Assignment) -> String {
    model
        .iter()
        .map(|(atom, value)| format!("{}({})", if *value { "T" } else { "F" }, atom))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() {
    let app = App::parse();
    app.init_logging();
    if let Err(e) = app.run() {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
