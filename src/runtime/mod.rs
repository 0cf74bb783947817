//! Target independent representation of a simulation program.
use crate::{frontend::Atom, options::Options, vocabulary::Element};
use anyhow::Result;
use std::{collections::HashMap, fmt::Display};

pub mod builder;
pub mod scheme;
pub mod target;
pub mod vm;

pub use builder::ProgramBuilder;
pub use scheme::RungeKutta;

use target::Target;

/// Group of numeric fields
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Group {
    /// Evolved variables
    State,
    /// Time derivatives of the evolved variables, laid out like `State`
    Derivative,
    /// Auxiliary variables
    Aux,
    /// Explicit constants
    Constant,
}

impl Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Group::State => "state",
            Group::Derivative => "dqdt",
            Group::Aux => "aux",
            Group::Constant => "constants",
        })
    }
}

/// Named, ordered list of numeric fields
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<Atom>,
    index: HashMap<Atom, usize>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field unless present, returning its index.
    pub fn add_or_get_field(&mut self, name: &Atom) -> usize {
        if let Some(index) = self.index.get(name) {
            return *index;
        }
        let index = self.fields.len();
        self.fields.push(name.clone());
        self.index.insert(name.clone(), index);
        index
    }

    /// Index of the field `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Field names in layout order.
    pub fn fields(&self) -> &[Atom] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Atom> for Record {
    fn from_iter<T: IntoIterator<Item = Atom>>(iter: T) -> Self {
        let mut record = Record::new();
        for name in iter {
            record.add_or_get_field(&name);
        }
        record
    }
}

/// A field of one of the records
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Slot {
    /// Record
    pub group: Group,
    /// Field index
    pub index: usize,
}

impl Slot {
    /// Create a slot.
    pub fn new(group: Group, index: usize) -> Self {
        Self { group, index }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.group, self.index)
    }
}

/// Argument of an element
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Number(f64),
    Slot(Slot),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Number(value) => value.fmt(f),
            Operand::Slot(slot) => slot.fmt(f),
        }
    }
}

/// Right-hand side of a statement
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// target = operand
    Copy(Operand),
    /// target = element(args...)
    ///
    /// The derivative of an integrator is `Apply { element: Int, .. }` with
    /// step size and initial value already stripped.
    Apply { element: Element, args: Vec<Operand> },
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Copy(operand) => operand.fmt(f),
            Expr::Apply { element, args } => write!(
                f,
                "{}({})",
                element,
                args.iter()
                    .map(|arg| arg.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Assignment
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// Assigned field
    pub target: Slot,
    /// Value
    pub expr: Expr,
    /// The equation the statement was built from
    pub description: String,
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}; // {}", self.target, self.expr, self.description)
    }
}

/// Part of a derivative evaluation
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Section {
    AuxSorted,
    AuxCyclic,
    Derivatives,
    AuxUnneeded,
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Section::AuxSorted => "auxiliaries, sorted by dependency",
            Section::AuxCyclic => "auxiliaries on a feedback loop, best effort order",
            Section::Derivatives => "time derivatives",
            Section::AuxUnneeded => "auxiliaries not needed for the time evolution",
        })
    }
}

/// Statements of one section
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Section
    pub section: Section,
    /// Statements in execution order
    pub statements: Vec<Statement>,
}

/// Step size or initial value of an evolved variable
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parameter {
    Number(f64),
    /// Index into the constants record
    Constant(usize),
}

/// Program
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    /// Evolved variables, also the layout of their derivatives
    pub state: Record,
    /// Auxiliary variables
    pub aux: Record,
    /// Explicit constants
    pub constants: Record,
    /// Values of the constants, by index
    pub constant_values: Vec<f64>,
    /// Initial values of the evolved variables, by index
    pub initial: Vec<Parameter>,
    /// Step sizes of the evolved variables, by index
    pub dt: Vec<Parameter>,
    /// One derivative evaluation
    pub blocks: Vec<Block>,
    /// Every variable that can be queried, sorted
    pub variables: Vec<Atom>,
}

impl Program {
    /// Look a variable up in the state, auxiliary and constant records, in that order.
    pub fn lookup(&self, name: &str) -> Option<Slot> {
        [
            (Group::State, &self.state),
            (Group::Aux, &self.aux),
            (Group::Constant, &self.constants),
        ]
        .into_iter()
        .find_map(|(group, record)| record.index_of(name).map(|index| Slot::new(group, index)))
    }

    /// The record behind `group`.
    pub fn record(&self, group: Group) -> &Record {
        match group {
            Group::State | Group::Derivative => &self.state,
            Group::Aux => &self.aux,
            Group::Constant => &self.constants,
        }
    }

    /// Name of the field behind `slot`.
    pub fn name_of(&self, slot: Slot) -> Option<&Atom> {
        self.record(slot.group).fields().get(slot.index)
    }

    /// Value of a parameter given the constant values in use.
    pub fn resolve(parameter: Parameter, constants: &[f64]) -> f64 {
        match parameter {
            Parameter::Number(value) => value,
            Parameter::Constant(index) => constants.get(index).copied().unwrap_or(f64::NAN),
        }
    }

    /// All statements of a derivative evaluation in order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.blocks.iter().flat_map(|block| block.statements.iter())
    }

    /// Write the program to a target.
    pub fn write<T: Target>(&self, f: impl std::io::Write, options: &Options) -> Result<()> {
        T::write(f, self, options)
    }

    /// Write the program to a file.
    pub fn write_to_file<T: Target>(
        &self,
        path: impl AsRef<std::path::Path>,
        options: &Options,
    ) -> Result<()> {
        T::write_to_file(path, self, options)
    }

    fn named(&self, slot: Slot) -> String {
        match self.name_of(slot) {
            Some(name) => format!("{}.{}", slot.group, name),
            None => slot.to_string(),
        }
    }

    fn named_operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Number(value) => value.to_string(),
            Operand::Slot(slot) => self.named(*slot),
        }
    }

    fn named_parameter(&self, parameter: Parameter) -> String {
        match parameter {
            Parameter::Number(value) => value.to_string(),
            Parameter::Constant(index) => self.named(Slot::new(Group::Constant, index)),
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "// Constants")?;
        for (name, value) in self.constants.fields().iter().zip(&self.constant_values) {
            writeln!(f, "const {} = {};", name, value)?;
        }
        writeln!(f)?;

        writeln!(f, "// Evolved variables")?;
        for (index, name) in self.state.fields().iter().enumerate() {
            let initial = self.initial.get(index).map(|p| self.named_parameter(*p));
            let dt = self.dt.get(index).map(|p| self.named_parameter(*p));
            writeln!(
                f,
                "state {} = {}; // dt = {}",
                name,
                initial.unwrap_or_default(),
                dt.unwrap_or_default()
            )?;
        }
        writeln!(f)?;

        writeln!(f, "// Auxiliary variables")?;
        for name in self.aux.fields() {
            writeln!(f, "aux {};", name)?;
        }
        writeln!(f)?;

        writeln!(f, "function f(state) {{")?;
        for block in &self.blocks {
            writeln!(f, "    // {}", block.section)?;
            for statement in &block.statements {
                let expr = match &statement.expr {
                    Expr::Copy(operand) => self.named_operand(operand),
                    Expr::Apply { element, args } => format!(
                        "{}({})",
                        element,
                        args.iter()
                            .map(|arg| self.named_operand(arg))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                };
                writeln!(f, "    {} = {};", self.named(statement.target), expr)?;
            }
        }
        writeln!(f, "    return dqdt;")?;
        writeln!(f, "}}")?;
        Ok(())
    }
}
