//! Variable classification.
//!
//! Splits the variables of a linearized equation set into constants, evolved
//! variables and auxiliaries, and sorts the auxiliaries by their dependencies.
//! Integrators break the feedback loops of a circuit: only edges pointing at
//! an auxiliary take part in the sort.

use std::{collections::BTreeSet, fmt::Display};

use tracing::debug;

use super::toposort::topological_sort;
use crate::{
    error::{CompileError, Result, Warning},
    frontend::{Atom, EquationSet},
    vocabulary::Vocabulary,
};

/// The bucket a variable is put in.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Constant,
    AuxSorted,
    AuxCyclic,
    Evolved,
    AuxUnneeded,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Category::Constant => "constants",
            Category::AuxSorted => "aux.sorted",
            Category::AuxCyclic => "aux.cyclic",
            Category::Evolved => "evolved",
            Category::AuxUnneeded => "aux.unneeded",
        })
    }
}

/// Five-way partition of the variables of an equation set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Names bound to `const(..)`, sorted.
    pub constants: Vec<Atom>,
    /// Names bound to an integration or differentiation, sorted.
    pub evolved: Vec<Atom>,
    /// Auxiliaries needed by the evolved variables, dependencies first.
    pub aux_sorted: Vec<Atom>,
    /// Auxiliaries on an algebraic loop, in no meaningful order.
    pub aux_cyclic: Vec<Atom>,
    /// Auxiliaries nothing depends on, sorted.
    pub aux_unneeded: Vec<Atom>,
    /// Every bound or referenced variable, sorted.
    pub all: Vec<Atom>,
}

impl Classification {
    /// The groups in evaluation order.
    pub fn ordering(&self) -> [(Category, &[Atom]); 5] {
        [
            (Category::Constant, self.constants.as_slice()),
            (Category::AuxSorted, self.aux_sorted.as_slice()),
            (Category::AuxCyclic, self.aux_cyclic.as_slice()),
            (Category::Evolved, self.evolved.as_slice()),
            (Category::AuxUnneeded, self.aux_unneeded.as_slice()),
        ]
    }

    /// Which group `name` ended up in.
    pub fn where_is(&self, name: &str) -> Option<Category> {
        self.ordering()
            .into_iter()
            .find(|(_, names)| names.iter().any(|atom| atom.as_str() == name))
            .map(|(category, _)| category)
    }

    /// Every variable that is neither constant nor evolved.
    pub fn aux_all(&self) -> Vec<&Atom> {
        self.all
            .iter()
            .filter(|name| !self.constants.contains(name) && !self.evolved.contains(name))
            .collect()
    }

    /// Check that every name bound in `lin` landed in exactly one group.
    pub fn verify(&self, lin: &EquationSet) -> Result<()> {
        let mut seen = BTreeSet::new();
        let mut duplicated = BTreeSet::new();
        for (_, names) in self.ordering() {
            for name in names {
                if !seen.insert(name) {
                    duplicated.insert(name.to_string());
                }
            }
        }
        let missing: Vec<String> = lin
            .names()
            .filter(|name| !seen.contains(name))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() && duplicated.is_empty() {
            Ok(())
        } else {
            Err(CompileError::ClassificationLoss {
                missing,
                duplicated: duplicated.into_iter().collect(),
            })
        }
    }

    /// Findings worth telling the user about.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = vec![];
        if self.evolved.is_empty() {
            warnings.push(Warning::NoEvolvedVariables);
        }
        if !self.aux_cyclic.is_empty() {
            warnings.push(Warning::CyclicAuxiliary(names(&self.aux_cyclic)));
        }
        if !self.aux_unneeded.is_empty() {
            warnings.push(Warning::UnneededAuxiliary(names(&self.aux_unneeded)));
        }
        warnings
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (category, names) in self.ordering() {
            writeln!(f, "{:<14}: [{}]", category, names.join(", "))?;
        }
        Ok(())
    }
}

fn names(atoms: &[Atom]) -> Vec<String> {
    atoms.iter().map(Atom::to_string).collect()
}

/// Classify the variables of the linearized equation set `lin`.
pub fn classify(lin: &EquationSet, vocabulary: &Vocabulary) -> Result<Classification> {
    let heads_where = |evolving: bool| -> Vec<Atom> {
        lin.iter()
            .filter(|(_, rhs)| rhs.is_term())
            .filter(|(_, rhs)| {
                let element = vocabulary.resolve(rhs.head());
                if evolving {
                    element.is_evolving()
                } else {
                    element.is_constant()
                }
            })
            .map(|(name, _)| name.clone())
            .collect()
    };
    let evolved = heads_where(true);
    let constants = heads_where(false);

    let all = lin.all_variables();
    let aux: BTreeSet<&Atom> = all
        .iter()
        .filter(|name| !evolved.contains(name) && !constants.contains(name))
        .collect();

    let edges = lin
        .dependency_graph()
        .into_iter()
        .filter(|(_, dependency)| aux.contains(dependency));
    let sorted = topological_sort(edges);

    let aux_sorted: Vec<Atom> = sorted
        .ordered
        .into_iter()
        .filter(|name| aux.contains(name))
        .collect();
    let aux_cyclic: Vec<Atom> = sorted
        .cyclic
        .into_iter()
        .filter(|name| aux.contains(name))
        .collect();
    let aux_unneeded: Vec<Atom> = aux
        .iter()
        .filter(|name| !aux_sorted.contains(name) && !aux_cyclic.contains(name))
        .map(|name| (*name).clone())
        .collect();

    let classification = Classification {
        constants,
        evolved,
        aux_sorted,
        aux_cyclic,
        aux_unneeded,
        all,
    };
    classification.verify(lin)?;

    debug!(
        constants = classification.constants.len(),
        evolved = classification.evolved.len(),
        aux_sorted = classification.aux_sorted.len(),
        aux_cyclic = classification.aux_cyclic.len(),
        aux_unneeded = classification.aux_unneeded.len(),
        "classified variables"
    );
    Ok(classification)
}
