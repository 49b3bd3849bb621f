//! A parser for formulae in prefix notation.
//!
//! The syntax extends the usual ASP-style prefix notation for propositional
//! formulae by difference constraints:
//! - `and(x,y,...)`: conjunction
//! - `or(x,y,...)`: disjunction
//! - `imp(x,y)`: implication
//! - `iff(x,y)`: if and only if
//! - `xor(x,y)`: exclusive or
//! - `ite(c,t,e)`: if-then-else
//! - `neg(x)`: classical negation
//! - `c(v)` / `c(f)`: the constants verum and falsum
//! - `le(x,5)`, `lt(x,y,-3)`, `eq`, `ge`, `gt`: the constraint `x - y REL k`, where the
//!   second variable is optional
//! - any other alphanumeric (or `"quoted"`) name is a Boolean symbol
//!
//! Structurally equal subformulae are interned, so the resulting [Formula] is a DAG.
use std::{cell::RefCell, collections::HashMap};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::{alphanumeric1, i64 as integer, multispace0},
    combinator::{all_consuming, map, value},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

use crate::{
    error::{Result, TddError},
    formula::{Atom, Constraint, Formula, Node, Relation},
};

/// A parser which interns every parsed node.
///
/// Parsing several formulae with the same parser shares their common subformulae.
#[derive(Debug, Default)]
pub struct FormulaParser {
    interned: RefCell<HashMap<Node, Formula>>,
}

impl FormulaParser {
    /// Parses a complete formula, surrounding whitespace is ignored.
    pub fn parse(&self, input: &str) -> Result<Formula> {
        match all_consuming(delimited(multispace0, |i| self.formula(i), multispace0))(input) {
            Ok((_, formula)) => {
                log::debug!("parsed formula with {} nodes", formula.dag_size());
                Ok(formula)
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(TddError::Parse(e.input.to_string()))
            }
            Err(nom::Err::Incomplete(_)) => Err(TddError::Parse(String::new())),
        }
    }

    /// Number of distinct nodes seen so far.
    pub fn interned_nodes(&self) -> usize {
        self.interned.borrow().len()
    }

    fn intern(&self, node: Node) -> Formula {
        let mut interned = self.interned.borrow_mut();
        if let Some(existing) = interned.get(&node) {
            return existing.clone();
        }
        let formula = Formula::from(node.clone());
        interned.insert(node, formula.clone());
        formula
    }

    fn formula<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        alt((
            |i| self.constant(i),
            |i| self.unary_op(i),
            |i| self.nary_op(i),
            |i| self.binary_op(i),
            |i| self.ite(i),
            |i| self.constraint(i),
            |i| self.symbol(i),
        ))(input)
    }

    fn constant<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        map(
            alt((value(Node::True, tag("c(v)")), value(Node::False, tag("c(f)")))),
            |node| self.intern(node),
        )(input)
    }

    fn unary_op<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        map(
            preceded(tag("neg"), delimited(tag("("), |i| self.argument(i), tag(")"))),
            |f| self.intern(Node::Not(f)),
        )(input)
    }

    fn argument<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        delimited(multispace0, |i| self.formula(i), multispace0)(input)
    }

    fn argument_list<'a>(&self, input: &'a str) -> IResult<&'a str, Vec<Formula>> {
        delimited(
            tag("("),
            separated_list1(tag(","), |i| self.argument(i)),
            tag(")"),
        )(input)
    }

    fn formula_pair<'a>(&self, input: &'a str) -> IResult<&'a str, (Formula, Formula)> {
        tuple((
            preceded(tag("("), |i| self.argument(i)),
            delimited(tag(","), |i| self.argument(i), tag(")")),
        ))(input)
    }

    fn nary_op<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        alt((
            map(preceded(tag("and"), |i| self.argument_list(i)), |cs| {
                self.intern(Node::And(cs))
            }),
            map(preceded(tag("or"), |i| self.argument_list(i)), |cs| {
                self.intern(Node::Or(cs))
            }),
        ))(input)
    }

    fn binary_op<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        alt((
            map(preceded(tag("imp"), |i| self.formula_pair(i)), |(a, b)| {
                self.intern(Node::Implies(a, b))
            }),
            map(preceded(tag("iff"), |i| self.formula_pair(i)), |(a, b)| {
                self.intern(Node::Iff(a, b))
            }),
            map(preceded(tag("xor"), |i| self.formula_pair(i)), |(a, b)| {
                self.intern(Node::Xor(a, b))
            }),
        ))(input)
    }

    fn ite<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        map(
            preceded(
                tag("ite"),
                tuple((
                    preceded(tag("("), |i| self.argument(i)),
                    preceded(tag(","), |i| self.argument(i)),
                    delimited(tag(","), |i| self.argument(i), tag(")")),
                )),
            ),
            |(c, t, e)| self.intern(Node::Ite(c, t, e)),
        )(input)
    }

    fn constraint<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        let comma = || delimited(multispace0, tag(","), multispace0);
        let name = || delimited(multispace0, Self::atomic, multispace0);
        map(
            tuple((
                Self::relation,
                delimited(
                    tag("("),
                    alt((
                        map(
                            tuple((name(), comma(), name(), comma(), integer)),
                            |(lhs, _, rhs, _, bound)| (lhs, Some(rhs), bound),
                        ),
                        map(tuple((name(), comma(), integer)), |(lhs, _, bound)| {
                            (lhs, None, bound)
                        }),
                    )),
                    terminated(multispace0, tag(")")),
                ),
            )),
            |(relation, (lhs, rhs, bound))| {
                self.intern(Node::Atom(Atom::Diff(Constraint {
                    lhs: lhs.to_string(),
                    rhs: rhs.map(str::to_string),
                    relation,
                    bound,
                })))
            },
        )(input)
    }

    fn relation(input: &str) -> IResult<&str, Relation> {
        alt((
            value(Relation::Le, tag("le")),
            value(Relation::Lt, tag("lt")),
            value(Relation::Eq, tag("eq")),
            value(Relation::Ge, tag("ge")),
            value(Relation::Gt, tag("gt")),
        ))(input)
    }

    fn symbol<'a>(&self, input: &'a str) -> IResult<&'a str, Formula> {
        map(Self::atomic, |name| {
            self.intern(Node::Atom(Atom::boolean(name)))
        })(input)
    }

    fn atomic(input: &str) -> IResult<&str, &str> {
        alt((
            delimited(tag("\""), take_until("\""), tag("\"")),
            alphanumeric1,
        ))(input)
    }
}

/// Parses a single formula with a fresh [FormulaParser].
pub fn parse_formula(input: &str) -> Result<Formula> {
    FormulaParser::default().parse(input)
}
