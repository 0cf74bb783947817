//! Symbolic terms.
//!
//! A [`Term`] is an atom (the head) applied to an ordered list of arguments
//! (the tail). A term without arguments is a *variable reference*, a term
//! with arguments is the application of a computing element.

use std::{borrow::Borrow, cmp::Ordering, convert::Infallible, fmt::Display, hash::Hash};

use indexmap::IndexSet;

use crate::error::{CompileError, Result};

/// Identifier used as a term head or as an equation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(String);

impl Atom {
    /// Create an atom from an identifier `[A-Za-z_][A-Za-z0-9_.']*`, the
    /// names the text format can read back.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\''));
        if !valid {
            return Err(CompileError::MalformedTerm(name));
        }
        Ok(Self(name))
    }

    /// The identifier as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Atom {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Atom {
    type Error = CompileError;

    fn try_from(value: &str) -> Result<Self> {
        Atom::new(value)
    }
}

/// Numeric literal. Compared and hashed by bit pattern so that terms are
/// usable as map keys.
#[derive(Debug, Clone, Copy)]
pub struct Number(pub f64);

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element of a term tail: a literal or a nested term, never a bare string.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arg {
    Number(Number),
    Term(Term),
}

impl Arg {
    /// The nested term, if any.
    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Arg::Term(term) => Some(term),
            Arg::Number(_) => None,
        }
    }

    /// The literal value, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Number(Number(value)) => Some(*value),
            Arg::Term(_) => None,
        }
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Number(Number(value))
    }
}

impl From<Number> for Arg {
    fn from(value: Number) -> Self {
        Arg::Number(value)
    }
}

impl From<Term> for Arg {
    fn from(value: Term) -> Self {
        Arg::Term(value)
    }
}

impl Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Number(number) => number.fmt(f),
            Arg::Term(term) => term.fmt(f),
        }
    }
}

/// A node of the syntax tree together with its children.
///
/// Equality and hashing are structural, two equal trees are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term {
    head: Atom,
    tail: Vec<Arg>,
}

impl Term {
    /// Apply `head` to `tail`.
    pub fn new(head: Atom, tail: Vec<Arg>) -> Self {
        Self { head, tail }
    }

    /// A reference to the variable `head`.
    pub fn variable(head: Atom) -> Self {
        Self::new(head, vec![])
    }

    /// A reference to the variable called `name`.
    pub fn var(name: &str) -> Result<Self> {
        Ok(Self::variable(Atom::new(name)?))
    }

    /// Apply the element called `name` to `tail`.
    pub fn apply(name: &str, tail: Vec<Arg>) -> Result<Self> {
        Ok(Self::new(Atom::new(name)?, tail))
    }

    /// Same head, replaced tail.
    pub fn call(&self, tail: Vec<Arg>) -> Self {
        Self::new(self.head.clone(), tail)
    }

    /// The head atom.
    pub fn head(&self) -> &Atom {
        &self.head
    }

    /// The arguments.
    pub fn tail(&self) -> &[Arg] {
        &self.tail
    }

    /// Split into head and tail.
    pub fn into_parts(self) -> (Atom, Vec<Arg>) {
        (self.head, self.tail)
    }

    /// A variable is a term without tail.
    pub fn is_variable(&self) -> bool {
        self.tail.is_empty()
    }

    /// A compound term has a tail.
    pub fn is_term(&self) -> bool {
        !self.is_variable()
    }

    /// Variables occurring directly in the tail.
    pub fn variables(&self) -> Vec<&Atom> {
        self.tail
            .iter()
            .filter_map(Arg::as_term)
            .filter(|term| term.is_variable())
            .map(Term::head)
            .collect()
    }

    /// Variables occurring anywhere below this node, unique, in order of appearance.
    pub fn all_variables(&self) -> Vec<Atom> {
        let mut found = IndexSet::new();
        self.collect_variables(&mut found);
        found.into_iter().collect()
    }

    fn collect_variables(&self, found: &mut IndexSet<Atom>) {
        for term in self.tail.iter().filter_map(Arg::as_term) {
            if term.is_variable() {
                found.insert(term.head.clone());
            } else {
                term.collect_variables(found);
            }
        }
    }

    /// Compound terms occurring anywhere below this node, unique, in pre-order.
    pub fn all_terms(&self) -> Vec<Term> {
        let mut found = IndexSet::new();
        self.collect_terms(&mut found);
        found.into_iter().collect()
    }

    fn collect_terms(&self, found: &mut IndexSet<Term>) {
        for term in self.tail.iter().filter_map(Arg::as_term) {
            if term.is_term() {
                found.insert(term.clone());
                term.collect_terms(found);
            }
        }
    }

    /// Rename every head, of variables and of compound terms alike.
    pub fn map_heads<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> Term {
        let head = f(&self.head);
        let tail = self
            .tail
            .iter()
            .map(|arg| match arg {
                Arg::Term(term) => Arg::Term(term.map_heads(f)),
                Arg::Number(number) => Arg::Number(*number),
            })
            .collect();
        Term::new(head, tail)
    }

    /// Rename variable references only, element heads stay untouched.
    pub fn map_variables<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> Term {
        if self.is_variable() {
            return Term::variable(f(&self.head));
        }
        let tail = self
            .tail
            .iter()
            .map(|arg| match arg {
                Arg::Term(term) => Arg::Term(term.map_variables(f)),
                Arg::Number(number) => Arg::Number(*number),
            })
            .collect();
        Term::new(self.head.clone(), tail)
    }

    /// Rename heads of compound terms only, variables stay untouched.
    pub fn map_terms<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> Term {
        if self.is_variable() {
            return self.clone();
        }
        let head = f(&self.head);
        let tail = self
            .tail
            .iter()
            .map(|arg| match arg {
                Arg::Term(term) => Arg::Term(term.map_terms(f)),
                Arg::Number(number) => Arg::Number(*number),
            })
            .collect();
        Term::new(head, tail)
    }

    /// Rewrite every child term bottom-up with `f`; the root is rewritten last
    /// and only if `map_root` is set.
    ///
    /// `f` sees variables as well as compound terms, numbers are passed through.
    pub fn try_map_tails<E, F>(&self, f: &mut F, map_root: bool) -> Result<Term, E>
    where
        F: FnMut(Term) -> Result<Term, E>,
    {
        let mut tail = Vec::with_capacity(self.tail.len());
        for arg in &self.tail {
            tail.push(match arg {
                Arg::Term(term) => {
                    let inner = term.try_map_tails(f, false)?;
                    Arg::Term(f(inner)?)
                }
                Arg::Number(number) => Arg::Number(*number),
            });
        }
        let rewritten = Term::new(self.head.clone(), tail);
        if map_root {
            f(rewritten)
        } else {
            Ok(rewritten)
        }
    }

    /// Infallible variant of [`Term::try_map_tails`].
    pub fn map_tails<F: FnMut(Term) -> Term>(&self, f: &mut F, map_root: bool) -> Term {
        let result = self.try_map_tails(&mut |term| Ok::<_, Infallible>(f(term)), map_root);
        match result {
            Ok(term) => term,
            Err(never) => match never {},
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.tail.is_empty() {
            write!(
                f,
                "({})",
                self.tail
                    .iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        Ok(())
    }
}

/// Variables for a comma separated list of names, e.g. `symbols("x, y, z")`.
pub fn symbols(query: &str) -> Result<Vec<Term>> {
    query.split(',').map(|name| Term::var(name.trim())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Term {
        Term::var(name).unwrap()
    }

    fn app(head: &str, tail: Vec<Arg>) -> Term {
        Term::apply(head, tail).unwrap()
    }

    fn to(name: &str) -> impl FnMut(&Atom) -> Atom + '_ {
        move |_| Atom::new(name).unwrap()
    }

    #[test]
    fn atoms_reject_compound_names() {
        assert!(matches!(
            Atom::new("f(x, y)"),
            Err(CompileError::MalformedTerm(_))
        ));
        assert!(Atom::new("").is_err());
        assert!(Atom::new("x_1").is_ok());
    }

    #[test]
    fn atoms_follow_identifier_syntax() {
        for name in ["x#y", "a=b", "1x", "a^b", "a;b", "-x"] {
            assert!(Atom::new(name).is_err(), "{name}");
        }
        for name in ["_", "x'", "a.b", "A_1'"] {
            assert!(Atom::new(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn display_uses_call_notation() {
        let f = app("f", vec![var("x").into(), 2.5.into(), app("g", vec![1.0.into()]).into()]);
        assert_eq!(f.to_string(), "f(x, 2.5, g(1))");
        assert_eq!(var("x").to_string(), "x");
    }

    #[test]
    fn equality_is_structural() {
        let a = app("f", vec![var("x").into()]);
        let b = app("f", vec![var("x").into()]);
        let c = app("f", vec![var("x").into(), var("x").into()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn call_replaces_tail() {
        let f = app("f", vec![var("x").into()]);
        assert_eq!(f.call(vec![var("y").into()]).to_string(), "f(y)");
    }

    #[test]
    fn map_heads_renames_everything() {
        let x = var("x");
        let y = var("y");
        let xx = x.call(vec![x.clone().into(), x.call(vec![x.clone().into()]).into()]);
        let yy = y.call(vec![y.clone().into(), y.call(vec![y.clone().into()]).into()]);
        assert_eq!(xx.map_heads(&mut to("y")), yy);
        assert_eq!(x.map_heads(&mut to("y")), y);
    }

    #[test]
    fn map_variables_keeps_element_heads() {
        let x = var("x");
        let expr = app(
            "x",
            vec![
                123.0.into(),
                app("x", vec![9.1.into()]).into(),
                x.clone().into(),
                app("x", vec![x.clone().into(), 0.1.into(), x.clone().into()]).into(),
            ],
        );
        assert_eq!(
            expr.map_variables(&mut to("y")).to_string(),
            "x(123, x(9.1), y, x(y, 0.1, y))"
        );
    }

    #[test]
    fn map_terms_keeps_variables() {
        let x = var("x");
        let expr = x.call(vec![x.clone().into(), x.call(vec![x.clone().into()]).into()]);
        assert_eq!(expr.map_terms(&mut to("y")).to_string(), "y(x, y(x))");
        assert_eq!(x.map_terms(&mut to("y")), x);
    }

    #[test]
    fn map_tails_wraps_children_bottom_up() {
        let (x, y, z) = (var("x"), var("y"), var("z"));
        let expr = x.call(vec![
            y.clone().into(),
            z.call(vec![x.clone().into()]).into(),
            x.call(vec![y.clone().into()]).into(),
        ]);
        let mut wrap = |term: Term| app("foo", vec![term.into()]);
        assert_eq!(
            expr.map_tails(&mut wrap, false).to_string(),
            "x(foo(y), foo(z(foo(x))), foo(x(foo(y))))"
        );
        assert_eq!(
            expr.map_tails(&mut wrap, true).to_string(),
            "foo(x(foo(y), foo(z(foo(x))), foo(x(foo(y)))))"
        );
    }

    #[test]
    fn map_tails_can_remove_unary_wrappers() {
        let (x, y, z) = (var("x"), var("y"), var("z"));
        let expr = x.call(vec![
            y.clone().into(),
            z.call(vec![x.clone().into()]).into(),
            x.call(vec![z.call(vec![y.clone().into()]).into(), x.clone().into()])
                .into(),
        ]);
        let mut remove_z = |term: Term| {
            if term.head().as_str() == "z" {
                if let Some(Arg::Term(inner)) = term.tail().first() {
                    return inner.clone();
                }
            }
            term
        };
        assert_eq!(
            expr.map_tails(&mut remove_z, false).to_string(),
            "x(y, x, x(y, x))"
        );
    }

    #[test]
    fn map_tails_root_flag() {
        let (a, b) = (var("a"), var("b"));
        let expr = a.call(vec![b.clone().into(), a.clone().into(), b.clone().into()]);
        let mut flip = |term: Term| {
            let head = if term.head().as_str() == "a" { "b" } else { "a" };
            Term::apply(head, term.tail().to_vec()).unwrap()
        };
        assert_eq!(expr.map_tails(&mut flip, true).to_string(), "b(a, b, a)");
        assert_eq!(expr.map_tails(&mut flip, false).to_string(), "a(a, b, a)");
    }

    #[test]
    fn variables_and_all_variables() {
        let expr = app(
            "sum",
            vec![
                var("a").into(),
                app("mult", vec![var("b").into(), var("a").into()]).into(),
                1.0.into(),
            ],
        );
        assert_eq!(expr.variables().len(), 1);
        let all: Vec<_> = expr.all_variables().iter().map(|a| a.to_string()).collect();
        assert_eq!(all, vec!["a", "b"]);
        assert!(var("a").all_variables().is_empty());
        assert_eq!(expr.all_terms().len(), 1);
    }

    #[test]
    fn symbols_splits_on_commas() {
        let names = symbols("x, y,z").unwrap();
        assert_eq!(names, vec![var("x"), var("y"), var("z")]);
    }
}
