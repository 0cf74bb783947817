//! Equation sets.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
    str::FromStr,
};

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{
    clean::{clean, Renamer},
    parser,
    symbol::{Arg, Atom, Term},
    MAX_NAME_RETRIES,
};
use crate::error::{CompileError, Result};

/// A system of named equations `name = rhs`.
///
/// Iteration is by sorted name. Analysis passes never mutate a set, they
/// return new ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquationSet {
    equations: BTreeMap<Atom, Term>,
}

impl EquationSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `rhs`, returning the previous definition.
    pub fn insert(&mut self, name: Atom, rhs: Term) -> Option<Term> {
        self.equations.insert(name, rhs)
    }

    /// Bind the variable called `name` to `rhs`.
    pub fn define(&mut self, name: &str, rhs: Term) -> Result<&mut Self> {
        self.insert(Atom::new(name)?, rhs);
        Ok(self)
    }

    /// Right-hand side of `name`.
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.equations.get(name)
    }

    /// Right-hand side of `name`, declaring `name = name` if it is not bound yet.
    ///
    /// Only meant for building systems by hand.
    pub fn get_or_declare(&mut self, name: &str) -> Result<&Term> {
        let atom = Atom::new(name)?;
        Ok(self
            .equations
            .entry(atom.clone())
            .or_insert_with(|| Term::variable(atom)))
    }

    /// Drop the equation of `name`.
    pub fn remove(&mut self, name: &str) -> Option<Term> {
        self.equations.remove(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.equations.contains_key(name)
    }

    /// Number of equations.
    pub fn len(&self) -> usize {
        self.equations.len()
    }

    /// Whether the set has no equation.
    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Equations in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Atom, &Term)> {
        self.equations.iter()
    }

    /// Bound names in order.
    pub fn names(&self) -> impl Iterator<Item = &Atom> {
        self.equations.keys()
    }

    /// Apply [`Term::map_heads`] to every right-hand side and rename the bound names alike.
    pub fn map_heads<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> EquationSet {
        self.iter()
            .map(|(name, rhs)| (f(name), rhs.map_heads(f)))
            .collect()
    }

    /// Apply [`Term::map_variables`] to every right-hand side.
    pub fn map_variables<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> EquationSet {
        self.iter()
            .map(|(name, rhs)| (name.clone(), rhs.map_variables(f)))
            .collect()
    }

    /// Apply [`Term::map_terms`] to every right-hand side, keeping the bound names.
    pub fn map_terms<F: FnMut(&Atom) -> Atom>(&self, f: &mut F) -> EquationSet {
        self.iter()
            .map(|(name, rhs)| (name.clone(), rhs.map_terms(f)))
            .collect()
    }

    /// Apply [`Term::try_map_tails`] to every right-hand side; a bare variable
    /// right-hand side is handed to `f` directly.
    pub fn try_map_tails<E, F>(&self, f: &mut F, map_root: bool) -> Result<EquationSet, E>
    where
        F: FnMut(Term) -> Result<Term, E>,
    {
        let mut mapped = EquationSet::new();
        for (name, rhs) in self.iter() {
            let rhs = if rhs.is_term() {
                rhs.try_map_tails(f, map_root)?
            } else {
                f(rhs.clone())?
            };
            mapped.insert(name.clone(), rhs);
        }
        Ok(mapped)
    }

    /// Apply [`Term::map_tails`] to every right-hand side.
    pub fn map_tails<F: FnMut(Term) -> Term>(&self, f: &mut F, map_root: bool) -> EquationSet {
        self.iter()
            .map(|(name, rhs)| {
                let rhs = if rhs.is_term() {
                    rhs.map_tails(f, map_root)
                } else {
                    f(rhs.clone())
                };
                (name.clone(), rhs)
            })
            .collect()
    }

    /// Edges `(dependent, dependency)` between variables, sorted.
    ///
    /// A variable occurring in its own right-hand side yields a self loop.
    pub fn dependency_graph(&self) -> Vec<(Atom, Atom)> {
        let mut edges = vec![];
        for (name, rhs) in self.iter() {
            if rhs.is_variable() {
                edges.push((name.clone(), rhs.head().clone()));
            } else {
                for dependency in rhs.all_variables() {
                    edges.push((name.clone(), dependency));
                }
            }
        }
        edges.sort();
        edges
    }

    /// Bound names and every variable referenced anywhere, sorted.
    pub fn all_variables(&self) -> Vec<Atom> {
        let mut all = BTreeSet::new();
        for (name, rhs) in self.iter() {
            all.insert(name.clone());
            if rhs.is_variable() {
                all.insert(rhs.head().clone());
            }
            all.extend(rhs.all_variables());
        }
        all.into_iter().collect()
    }

    /// Rewrite into three-address form by naming intermediate computing elements.
    ///
    /// Every compound term nested inside another one is replaced by a fresh
    /// variable `{head}_{n}` bound to it; equal sub-terms share one name, and a
    /// sub-term equal to the single-element right-hand side of an equation that
    /// stays in place reuses that equation's name. With `strict`, the outermost
    /// application of each equation is named as well, leaving `name = {head}_{n}`
    /// behind. Non-strict linearization is a fixed point of itself, and so is
    /// strict linearization.
    pub fn linearize(&self, strict: bool) -> Result<EquationSet> {
        let taken = self
            .all_variables()
            .into_iter()
            .map(|atom| atom.as_str().to_string())
            .collect::<BTreeSet<_>>();
        let keeps_root = |name: &Atom, rhs: &Term| !strict || is_generated_name(name, rhs.head());

        let mut memo = HashMap::new();
        for (name, rhs) in self.iter() {
            let flat = rhs.tail().iter().filter_map(Arg::as_term).all(Term::is_variable);
            if rhs.is_term() && flat && keeps_root(name, rhs) {
                memo.entry(rhs.clone()).or_insert_with(|| name.clone());
            }
        }
        let mut namer = Namer {
            taken,
            counters: HashMap::new(),
            memo,
            intermediates: BTreeMap::new(),
        };

        let mut linearized = EquationSet::new();
        for (name, rhs) in self.iter() {
            let rewritten = if rhs.is_term() {
                let map_root = !keeps_root(name, rhs);
                rhs.try_map_tails(&mut |term| namer.register(term), map_root)?
            } else {
                rhs.clone()
            };
            linearized.insert(name.clone(), rewritten);
        }

        debug!(
            equations = self.len(),
            intermediates = namer.intermediates.len(),
            strict,
            "linearized"
        );
        linearized.equations.extend(namer.intermediates);
        Ok(linearized)
    }

    /// Merge equations of a linearized set with equal right-hand sides onto
    /// the first name in order, rewriting all references.
    pub fn remove_duplicates(&self) -> EquationSet {
        let mut masters: IndexMap<&Term, &Atom> = IndexMap::new();
        let mut renames: HashMap<&Atom, &Atom> = HashMap::new();
        for (name, rhs) in self.iter() {
            match masters.get(rhs) {
                Some(master) => {
                    renames.insert(name, *master);
                }
                None => {
                    masters.insert(rhs, name);
                }
            }
        }

        let mut rename = |variable: &Atom| match renames.get(variable) {
            Some(master) => (*master).clone(),
            None => variable.clone(),
        };
        masters
            .into_iter()
            .map(|(rhs, name)| (name.clone(), rhs.map_variables(&mut rename)))
            .collect()
    }

    /// How often each head occurs as a right-hand side.
    pub fn term_statistics(&self) -> BTreeMap<String, usize> {
        let mut statistics = BTreeMap::new();
        for rhs in self.equations.values() {
            *statistics.entry(rhs.head().to_string()).or_insert(0) += 1;
        }
        statistics
    }

    /// Graphviz rendering of [`EquationSet::dependency_graph`].
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph \"dependencies\" {\n");
        for name in self.names() {
            dot.push_str(&format!("    \"{name}\";\n"));
        }
        for (dependent, dependency) in self.dependency_graph() {
            dot.push_str(&format!("    \"{dependent}\" -> \"{dependency}\";\n"));
        }
        dot.push_str("}\n");
        dot
    }

    /// Sanitize every identifier into `[A-Za-z0-9_]`, keeping distinct names distinct.
    pub fn clean_identifiers(&self) -> Result<EquationSet> {
        let mut renamer = Renamer::new(&[]);
        let mut table = HashMap::new();
        for name in self.all_variables() {
            let cleaned = renamer.rename(name.as_str())?;
            table.insert(name, Atom::new(cleaned)?);
        }
        for rhs in self.equations.values() {
            let mut terms = rhs.all_terms();
            terms.push(rhs.clone());
            for term in terms.iter().filter(|term| term.is_term()) {
                if !table.contains_key(term.head()) {
                    let cleaned = clean(term.head().as_str())?;
                    table.insert(term.head().clone(), Atom::new(cleaned)?);
                }
            }
        }
        Ok(self.map_heads(&mut |head| match table.get(head) {
            Some(cleaned) => cleaned.clone(),
            None => head.clone(),
        }))
    }
}

/// Whether `name` looks like an intermediate named by the linearizer for `head`.
fn is_generated_name(name: &Atom, head: &Atom) -> bool {
    name.as_str()
        .strip_prefix(head.as_str())
        .and_then(|rest| rest.strip_prefix('_'))
        .map(|rest| {
            let digits = rest.trim_end_matches('_');
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false)
}

struct Namer {
    taken: BTreeSet<String>,
    counters: HashMap<Atom, usize>,
    memo: HashMap<Term, Atom>,
    intermediates: BTreeMap<Atom, Term>,
}

impl Namer {
    fn register(&mut self, term: Term) -> Result<Term> {
        if term.is_variable() {
            return Ok(term);
        }
        if let Some(name) = self.memo.get(&term) {
            return Ok(Term::variable(name.clone()));
        }

        let count = {
            let counter = self.counters.entry(term.head().clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let base = format!("{}_{}", term.head(), count);
        let mut candidate = base.clone();
        let mut retries = 0;
        while self.taken.contains(&candidate) || self.intermediates.contains_key(candidate.as_str())
        {
            if retries == MAX_NAME_RETRIES {
                return Err(CompileError::NameExhaustion(base));
            }
            warn!(
                name = %candidate,
                "name of intermediate already in use, appending an underscore"
            );
            candidate.push('_');
            retries += 1;
        }

        let name = Atom::new(candidate)?;
        self.memo.insert(term.clone(), name.clone());
        self.intermediates.insert(name.clone(), term);
        Ok(Term::variable(name))
    }
}

impl FromIterator<(Atom, Term)> for EquationSet {
    fn from_iter<T: IntoIterator<Item = (Atom, Term)>>(iter: T) -> Self {
        Self {
            equations: iter.into_iter().collect(),
        }
    }
}

impl Display for EquationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, rhs) in self.iter() {
            writeln!(f, "{name} = {rhs}")?;
        }
        Ok(())
    }
}

impl FromStr for EquationSet {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        parser::parse(s, "<string>", false).map_err(CompileError::Syntax)
    }
}
