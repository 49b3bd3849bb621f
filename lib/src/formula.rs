/*!
Theory atoms and formula DAGs.

A [Formula] is a cheap handle onto an immutable, reference-counted [Node].
Cloning a formula shares the node, so subformulae which occur several times are
stored once and the diagram walker can memoise on node identity.

Atoms are either plain Boolean symbols or difference-logic constraints of the
form `x - y REL k` (or `x REL k`) over integer variables.
*/
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    rc::Rc,
};

/// A (possibly partial) truth assignment to atoms.
pub type Assignment = BTreeMap<Atom, bool>;

/// Relation symbol of a difference constraint.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Relation {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `=`
    Eq,
    /// `>=`
    Ge,
    /// `>`
    Gt,
}

impl Relation {
    /// The relation which holds after swapping both sides of the difference,
    /// i.e. `x - y R k` iff `y - x R.mirrored() -k`.
    pub fn mirrored(self) -> Self {
        match self {
            Relation::Lt => Relation::Gt,
            Relation::Le => Relation::Ge,
            Relation::Eq => Relation::Eq,
            Relation::Ge => Relation::Le,
            Relation::Gt => Relation::Lt,
        }
    }

    /// Keyword used by the textual formula syntax.
    pub fn keyword(self) -> &'static str {
        match self {
            Relation::Lt => "lt",
            Relation::Le => "le",
            Relation::Eq => "eq",
            Relation::Ge => "ge",
            Relation::Gt => "gt",
        }
    }
}

impl Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Eq => "=",
            Relation::Ge => ">=",
            Relation::Gt => ">",
        };
        write!(f, "{}", symbol)
    }
}

/// A difference constraint `lhs - rhs REL bound`, where a missing `rhs` stands for `0`.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Minuend variable.
    pub lhs: String,
    /// Optional subtrahend variable.
    pub rhs: Option<String>,
    /// Relation between the difference and the bound.
    pub relation: Relation,
    /// Integer bound.
    pub bound: i64,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rhs {
            Some(rhs) => write!(
                f,
                "{} - {} {} {}",
                self.lhs, rhs, self.relation, self.bound
            ),
            None => write!(f, "{} {} {}", self.lhs, self.relation, self.bound),
        }
    }
}

/// An atomic theory predicate.
#[derive(Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Clone, Serialize, Deserialize)]
pub enum Atom {
    /// A propositional symbol without theory content.
    Bool(String),
    /// A difference-logic constraint.
    Diff(Constraint),
}

impl Atom {
    /// Creates a Boolean symbol.
    pub fn boolean(name: impl Into<String>) -> Self {
        Atom::Bool(name.into())
    }

    /// Creates the constraint `var REL bound`.
    pub fn bound(var: impl Into<String>, relation: Relation, bound: i64) -> Self {
        Atom::Diff(Constraint {
            lhs: var.into(),
            rhs: None,
            relation,
            bound,
        })
    }

    /// Creates the constraint `lhs - rhs REL bound`.
    pub fn diff(
        lhs: impl Into<String>,
        rhs: impl Into<String>,
        relation: Relation,
        bound: i64,
    ) -> Self {
        Atom::Diff(Constraint {
            lhs: lhs.into(),
            rhs: Some(rhs.into()),
            relation,
            bound,
        })
    }

    /// Returns true for propositional symbols.
    pub fn is_bool(&self) -> bool {
        matches!(self, Atom::Bool(_))
    }

    /// The theory variables occurring in the atom.
    /// Propositional symbols have none.
    pub fn free_vars(&self) -> Vec<&str> {
        match self {
            Atom::Bool(_) => Vec::new(),
            Atom::Diff(c) => {
                let mut vars = vec![c.lhs.as_str()];
                if let Some(rhs) = &c.rhs {
                    if rhs != &c.lhs {
                        vars.push(rhs.as_str());
                    }
                }
                vars
            }
        }
    }

    fn write_syntax(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Bool(name) => write_name(f, name),
            Atom::Diff(c) => {
                write!(f, "{}(", c.relation.keyword())?;
                write_name(f, &c.lhs)?;
                write!(f, ",")?;
                if let Some(rhs) = &c.rhs {
                    write_name(f, rhs)?;
                    write!(f, ",")?;
                }
                write!(f, "{})", c.bound)
            }
        }
    }
}

fn write_name(f: &mut std::fmt::Formatter<'_>, name: &str) -> std::fmt::Result {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) {
        write!(f, "{}", name)
    } else {
        write!(f, "\"{}\"", name)
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Bool(name) => write!(f, "{}", name),
            Atom::Diff(c) => write!(f, "{}", c),
        }
    }
}

/// One node of a formula DAG.
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum Node {
    /// The constant true.
    True,
    /// The constant false.
    False,
    /// A theory atom.
    Atom(Atom),
    /// Negation.
    Not(Formula),
    /// n-ary conjunction, the empty conjunction is true.
    And(Vec<Formula>),
    /// n-ary disjunction, the empty disjunction is false.
    Or(Vec<Formula>),
    /// Implication.
    Implies(Formula, Formula),
    /// Equivalence.
    Iff(Formula, Formula),
    /// Exclusive disjunction.
    Xor(Formula, Formula),
    /// If-then-else.
    Ite(Formula, Formula, Formula),
}

/// Shared handle onto a formula [Node].
///
/// Equality and hashing are structural, identity is available through [Formula::node_id].
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub struct Formula(Rc<Node>);

impl From<Node> for Formula {
    fn from(node: Node) -> Self {
        Formula(Rc::new(node))
    }
}

impl From<Atom> for Formula {
    fn from(atom: Atom) -> Self {
        Node::Atom(atom).into()
    }
}

impl Formula {
    /// The constant true.
    pub fn top() -> Self {
        Node::True.into()
    }

    /// The constant false.
    pub fn bottom() -> Self {
        Node::False.into()
    }

    /// The constant for the given truth value.
    pub fn constant(value: bool) -> Self {
        if value {
            Self::top()
        } else {
            Self::bottom()
        }
    }

    /// A single atom.
    pub fn atom(atom: Atom) -> Self {
        atom.into()
    }

    /// Negation of `self`.
    pub fn not(&self) -> Self {
        Node::Not(self.clone()).into()
    }

    /// n-ary conjunction.
    pub fn and(children: Vec<Formula>) -> Self {
        Node::And(children).into()
    }

    /// n-ary disjunction.
    pub fn or(children: Vec<Formula>) -> Self {
        Node::Or(children).into()
    }

    /// `self -> other`
    pub fn implies(&self, other: &Formula) -> Self {
        Node::Implies(self.clone(), other.clone()).into()
    }

    /// `self <-> other`
    pub fn iff(&self, other: &Formula) -> Self {
        Node::Iff(self.clone(), other.clone()).into()
    }

    /// `self xor other`
    pub fn xor(&self, other: &Formula) -> Self {
        Node::Xor(self.clone(), other.clone()).into()
    }

    /// `if cond then then_branch else else_branch`
    pub fn ite(cond: &Formula, then_branch: &Formula, else_branch: &Formula) -> Self {
        Node::Ite(cond.clone(), then_branch.clone(), else_branch.clone()).into()
    }

    /// Conjunction which avoids needless nodes: no conjuncts give true, one conjunct is returned as is.
    pub fn big_and(mut children: Vec<Formula>) -> Self {
        match children.len() {
            0 => Self::top(),
            1 => children.remove(0),
            _ => Self::and(children),
        }
    }

    /// The formula `⋀ (a ∨ ¬a)` over the given atoms.
    /// It is equivalent to true but mentions every atom, which forces an all-SAT
    /// enumeration to branch on all of them.
    pub fn true_given_atoms(atoms: &[Atom]) -> Self {
        Self::big_and(
            atoms
                .iter()
                .map(|atom| {
                    let a = Formula::atom(atom.clone());
                    let na = a.not();
                    Formula::or(vec![a, na])
                })
                .collect(),
        )
    }

    /// The node the handle points to.
    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Identity of the underlying node, stable as long as the formula is alive.
    pub fn node_id(&self) -> *const Node {
        Rc::as_ptr(&self.0)
    }

    /// Returns true if the formula is the constant true.
    pub fn is_top(&self) -> bool {
        matches!(self.node(), Node::True)
    }

    /// Returns true if the formula is the constant false.
    pub fn is_bottom(&self) -> bool {
        matches!(self.node(), Node::False)
    }

    /// The direct children of the node, in order.
    pub fn children(&self) -> Vec<&Formula> {
        match self.node() {
            Node::True | Node::False | Node::Atom(_) => Vec::new(),
            Node::Not(a) => vec![a],
            Node::And(cs) | Node::Or(cs) => cs.iter().collect(),
            Node::Implies(a, b) | Node::Iff(a, b) | Node::Xor(a, b) => vec![a, b],
            Node::Ite(c, t, e) => vec![c, t, e],
        }
    }

    /// All atoms of the formula in order of their first occurrence
    /// (depth-first, left to right). Shared nodes are visited once.
    pub fn atoms(&self) -> Vec<Atom> {
        let mut visited: HashSet<*const Node> = HashSet::new();
        let mut seen: HashSet<&Atom> = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.node_id()) {
                continue;
            }
            if let Node::Atom(atom) = current.node() {
                if seen.insert(atom) {
                    result.push(atom.clone());
                }
            }
            stack.extend(current.children().into_iter().rev());
        }
        result
    }

    /// Number of distinct nodes in the DAG.
    pub fn dag_size(&self) -> usize {
        let mut visited: HashSet<*const Node> = HashSet::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            if visited.insert(current.node_id()) {
                stack.extend(current.children());
            }
        }
        visited.len()
    }

    /// Rebuilds the formula with every atom replaced by `replace(atom)`.
    /// Sharing is preserved: a node reachable along several paths is rebuilt once.
    pub fn map_atoms<F>(&self, replace: &mut F) -> Formula
    where
        F: FnMut(&Atom) -> Formula,
    {
        let mut memo = HashMap::new();
        self.map_atoms_memo(replace, &mut memo)
    }

    fn map_atoms_memo<F>(
        &self,
        replace: &mut F,
        memo: &mut HashMap<*const Node, Formula>,
    ) -> Formula
    where
        F: FnMut(&Atom) -> Formula,
    {
        if let Some(done) = memo.get(&self.node_id()) {
            return done.clone();
        }
        let result: Formula = match self.node() {
            Node::True | Node::False => return self.clone(),
            Node::Atom(atom) => replace(atom),
            node => self.map_children(node, replace, memo),
        };
        memo.insert(self.node_id(), result.clone());
        result
    }

    fn map_children<F>(
        &self,
        node: &Node,
        replace: &mut F,
        memo: &mut HashMap<*const Node, Formula>,
    ) -> Formula
    where
        F: FnMut(&Atom) -> Formula,
    {
        let mut rec = |f: &Formula| f.map_atoms_memo(replace, memo);
        match node {
            Node::True | Node::False | Node::Atom(_) => self.clone(),
            Node::Not(a) => Node::Not(rec(a)).into(),
            Node::And(cs) => Node::And(cs.iter().map(&mut rec).collect()).into(),
            Node::Or(cs) => Node::Or(cs.iter().map(&mut rec).collect()).into(),
            Node::Implies(a, b) => {
                let (a, b) = (rec(a), rec(b));
                Node::Implies(a, b).into()
            }
            Node::Iff(a, b) => {
                let (a, b) = (rec(a), rec(b));
                Node::Iff(a, b).into()
            }
            Node::Xor(a, b) => {
                let (a, b) = (rec(a), rec(b));
                Node::Xor(a, b).into()
            }
            Node::Ite(c, t, e) => {
                let (c, t, e) = (rec(c), rec(t), rec(e));
                Node::Ite(c, t, e).into()
            }
        }
    }

    /// Three-valued evaluation under a partial assignment of atoms.
    /// Returns `None` if the value is not yet determined.
    pub fn evaluate<F>(&self, assignment: &F) -> Option<bool>
    where
        F: Fn(&Atom) -> Option<bool>,
    {
        let mut memo = HashMap::new();
        self.evaluate_memo(assignment, &mut memo)
    }

    fn evaluate_memo<F>(
        &self,
        assignment: &F,
        memo: &mut HashMap<*const Node, Option<bool>>,
    ) -> Option<bool>
    where
        F: Fn(&Atom) -> Option<bool>,
    {
        if let Some(done) = memo.get(&self.node_id()) {
            return *done;
        }
        let result = match self.node() {
            Node::True => Some(true),
            Node::False => Some(false),
            Node::Atom(atom) => assignment(atom),
            Node::Not(a) => a.evaluate_memo(assignment, memo).map(|v| !v),
            Node::And(cs) => {
                let mut result = Some(true);
                for c in cs {
                    match c.evaluate_memo(assignment, memo) {
                        Some(false) => {
                            result = Some(false);
                            break;
                        }
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Node::Or(cs) => {
                let mut result = Some(false);
                for c in cs {
                    match c.evaluate_memo(assignment, memo) {
                        Some(true) => {
                            result = Some(true);
                            break;
                        }
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Node::Implies(a, b) => {
                match (
                    a.evaluate_memo(assignment, memo),
                    b.evaluate_memo(assignment, memo),
                ) {
                    (Some(false), _) | (_, Some(true)) => Some(true),
                    (Some(true), Some(false)) => Some(false),
                    _ => None,
                }
            }
            Node::Iff(a, b) => {
                let va = a.evaluate_memo(assignment, memo);
                let vb = b.evaluate_memo(assignment, memo);
                va.zip(vb).map(|(x, y)| x == y)
            }
            Node::Xor(a, b) => {
                let va = a.evaluate_memo(assignment, memo);
                let vb = b.evaluate_memo(assignment, memo);
                va.zip(vb).map(|(x, y)| x != y)
            }
            Node::Ite(c, t, e) => {
                let vt = t.evaluate_memo(assignment, memo);
                let ve = e.evaluate_memo(assignment, memo);
                match c.evaluate_memo(assignment, memo) {
                    Some(true) => vt,
                    Some(false) => ve,
                    None if vt.is_some() && vt == ve => vt,
                    None => None,
                }
            }
        };
        memo.insert(self.node_id(), result);
        result
    }

    fn write_syntax(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let write_list = |f: &mut std::fmt::Formatter<'_>, name: &str, cs: &[&Formula]| {
            write!(f, "{}(", name)?;
            for (idx, c) in cs.iter().enumerate() {
                if idx > 0 {
                    write!(f, ",")?;
                }
                c.write_syntax(f)?;
            }
            write!(f, ")")
        };
        match self.node() {
            Node::True => write!(f, "c(v)"),
            Node::False => write!(f, "c(f)"),
            Node::Atom(atom) => atom.write_syntax(f),
            Node::Not(_) => write_list(f, "neg", &self.children()),
            // the parser needs at least one argument
            Node::And(cs) if cs.is_empty() => write!(f, "c(v)"),
            Node::Or(cs) if cs.is_empty() => write!(f, "c(f)"),
            Node::And(_) => write_list(f, "and", &self.children()),
            Node::Or(_) => write_list(f, "or", &self.children()),
            Node::Implies(_, _) => write_list(f, "imp", &self.children()),
            Node::Iff(_, _) => write_list(f, "iff", &self.children()),
            Node::Xor(_, _) => write_list(f, "xor", &self.children()),
            Node::Ite(_, _, _) => write_list(f, "ite", &self.children()),
        }
    }
}

impl Display for Formula {
    /// Writes the formula in the prefix syntax understood by the [parser][crate::parser].
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_syntax(f)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn x_gt(k: i64) -> Atom {
        Atom::bound("x", Relation::Gt, k)
    }

    #[test]
    fn atoms_in_first_occurrence_order() {
        let a = Formula::atom(x_gt(0));
        let b = Formula::atom(x_gt(5));
        let c = Formula::atom(Atom::boolean("c"));
        let phi = Formula::and(vec![b.clone(), Formula::or(vec![a.clone(), b.clone()]), c.not()]);
        assert_eq!(phi.atoms(), vec![x_gt(5), x_gt(0), Atom::boolean("c")]);
    }

    #[test]
    fn dag_sharing() {
        let a = Formula::atom(Atom::boolean("a"));
        let shared = Formula::or(vec![a.clone(), a.not()]);
        let phi = Formula::and(vec![shared.clone(), shared.clone(), shared]);
        // and, or, a, not a
        assert_eq!(phi.dag_size(), 4);

        let mut calls = 0;
        let mapped = phi.map_atoms(&mut |atom| {
            calls += 1;
            Formula::atom(atom.clone())
        });
        assert_eq!(calls, 1);
        assert_eq!(mapped, phi);
        assert_eq!(mapped.dag_size(), 4);
    }

    #[test]
    fn three_valued_evaluation() {
        let a = Formula::atom(Atom::boolean("a"));
        let b = Formula::atom(Atom::boolean("b"));
        let phi = Formula::or(vec![a.clone(), b.clone()]);
        let only_a = |atom: &Atom| (atom == &Atom::boolean("a")).then_some(true);
        let nothing = |_: &Atom| None;
        assert_eq!(phi.evaluate(&only_a), Some(true));
        assert_eq!(phi.evaluate(&nothing), None);
        assert_eq!(a.iff(&b).evaluate(&only_a), None);
        assert_eq!(Formula::ite(&b, &a, &a).evaluate(&only_a), Some(true));
        assert_eq!(Formula::true_given_atoms(&[]).evaluate(&nothing), Some(true));
        assert_eq!(Formula::and(vec![]).evaluate(&nothing), Some(true));
        assert_eq!(Formula::or(vec![]).evaluate(&nothing), Some(false));
    }

    #[test]
    fn free_vars() {
        assert!(Atom::boolean("p").free_vars().is_empty());
        assert_eq!(x_gt(3).free_vars(), vec!["x"]);
        assert_eq!(
            Atom::diff("x", "y", Relation::Le, 2).free_vars(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn display() {
        let phi = Formula::and(vec![
            Formula::atom(Atom::diff("x", "y", Relation::Le, -2)),
            Formula::atom(Atom::boolean("a b")).not(),
            Formula::top(),
        ]);
        assert_eq!(phi.to_string(), "and(le(x,y,-2),neg(\"a b\"),c(v))");
        assert_eq!(Atom::diff("x", "y", Relation::Le, -2).to_string(), "x - y <= -2");
        assert_eq!(x_gt(0).to_string(), "x > 0");
    }
}
