//! A compiler for digital differential analyzer (DDA) circuits.
//!
//! A circuit is a system of equations `name = element(args...)` over
//! computing elements such as integrators, summers and multipliers. The
//! compiler flattens the nested terms into single-element equations, sorts
//! the variables into constants, evolved variables and auxiliaries, and
//! emits a program integrating the system in time with an explicit
//! Runge-Kutta scheme, either as standalone C or run in process.
//!
//! ```
//! use ddac::{runtime::target::Listing, Context};
//!
//! let mut listing = vec![];
//! Context::new()
//!     .add_file("decay.dda", "y = int(mult(-1, neg(y)), 0.05, -1)")?
//!     .output_stream::<Listing>(&mut listing)?;
//! assert!(String::from_utf8(listing)?.contains("dqdt.y = int(aux.mult_1);"));
//! # Ok::<(), anyhow::Error>(())
//! ```

#![deny(missing_docs)]

extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod analysis;
pub mod error;
pub mod frontend;
pub mod options;
pub mod runtime;
pub(crate) mod utils;
pub mod vocabulary;

use std::collections::HashMap;

use anyhow::{bail, Result};
use tracing::debug;

use analysis::Classification;
use error::{CompileError, Warning};
use frontend::{Atom, EquationSet};
use options::{Options, RunOptions};
use runtime::{target::Target, vm::Simulator, Program, ProgramBuilder};

/// Result of a successful compilation
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Equations in linear form
    pub linearized: EquationSet,
    /// Variables by role, in evaluation order
    pub classification: Classification,
    /// Target independent program
    pub program: Program,
    /// Findings that did not stop the compilation
    pub warnings: Vec<Warning>,
}

/// Compiler context
#[derive(Default)]
pub struct Context {
    equations: EquationSet,
    origins: HashMap<Atom, String>,
    options: Options,
    color: bool,
}

impl Context {
    /// Create an empty compiler context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compiler options.
    pub fn set_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Render source diagnostics with colors.
    pub fn set_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Parse a DDA file and add its equations.
    ///
    /// A variable may only be defined once across all files.
    pub fn add_file(self, filename: &str, source: &str) -> Result<Self> {
        let equations = match frontend::parser::parse(source, filename, self.color) {
            Ok(equations) => equations,
            Err(snippet) => bail!("{}", snippet),
        };
        debug!(file = filename, equations = equations.len(), "parsed");
        self.add_equations(filename, equations)
    }

    /// Add equations built programmatically, `origin` naming them in errors.
    pub fn add_equations(mut self, origin: &str, equations: EquationSet) -> Result<Self> {
        for (name, rhs) in equations.iter() {
            if let Some(previous) = self.origins.get(name) {
                bail!("`{name}` from {origin} is already defined in {previous}");
            }
            self.origins.insert(name.clone(), origin.to_string());
            self.equations.insert(name.clone(), rhs.clone());
        }
        Ok(self)
    }

    /// Equations collected so far.
    pub fn equations(&self) -> &EquationSet {
        &self.equations
    }

    /// Compiler options in use.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Linearize and classify the collected equations without lowering them.
    ///
    /// Unlike [`Context::compile`], variables nobody defines are accepted.
    pub fn classify(&self) -> Result<Classification> {
        let linearized = self.equations.linearize(self.options.strict_naming)?;
        Ok(analysis::classify(&linearized, &self.options.vocabulary)?)
    }

    /// Linearize, classify and lower the collected equations.
    pub fn compile(&self) -> Result<Compilation> {
        let linearized = self.equations.linearize(self.options.strict_naming)?;
        let classification = analysis::classify(&linearized, &self.options.vocabulary)?;

        if self.options.deny_cyclic && !classification.aux_cyclic.is_empty() {
            let names = classification
                .aux_cyclic
                .iter()
                .map(|name| name.to_string())
                .collect();
            return Err(CompileError::CyclicAuxiliary(names).into());
        }
        let warnings = classification.warnings();
        for warning in &warnings {
            debug!(%warning, "recorded warning");
        }

        let program =
            ProgramBuilder::new(&self.options.vocabulary).build(&linearized, &classification)?;
        Ok(Compilation {
            linearized,
            classification,
            program,
            warnings,
        })
    }

    /// Compile and write the result to a stream.
    pub fn output_stream<T: Target>(self, output: impl std::io::Write) -> Result<()> {
        let compilation = self.compile()?;
        T::write(output, &compilation.program, &self.options)?;
        Ok(())
    }

    /// Compile and write the result to a file.
    pub fn output_file<T: Target>(self, output: impl AsRef<std::path::Path>) -> Result<()> {
        let compilation = self.compile()?;
        T::write_to_file(output, &compilation.program, &self.options)?;
        Ok(())
    }

    /// Compile and prepare an in-process simulation.
    pub fn simulator(&self, options: &RunOptions) -> Result<Simulator> {
        let compilation = self.compile()?;
        Ok(Simulator::with_overrides(compilation.program, options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_files() {
        let compilation = Context::new()
            .add_file("a.dda", "y = int(k, 0.1, 0)")
            .unwrap()
            .add_file("b.dda", "k = const(2)")
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(compilation.program.state.len(), 1);
        assert_eq!(compilation.program.constant_values, vec![2.0]);
    }

    #[test]
    fn duplicates_across_files() {
        let err = Context::new()
            .add_file("a.dda", "y = int(y, 0.1, 0)")
            .unwrap()
            .add_file("b.dda", "y = const(1)")
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "`y` from b.dda is already defined in a.dda");
    }

    #[test]
    fn syntax_errors_are_rendered() {
        let err = Context::new().add_file("bad.dda", "y = int(y,").err().unwrap();
        let message = err.to_string();
        assert!(message.contains("syntax error"));
        assert!(message.contains("bad.dda"));
    }

    #[test]
    fn cyclic_auxiliaries() {
        let context = Context::new().add_file("loop.dda", "a = neg(b)\nb = neg(a)").unwrap();
        let compilation = context.compile().unwrap();
        assert!(compilation
            .warnings
            .iter()
            .any(|warning| matches!(warning, Warning::CyclicAuxiliary(_))));

        let denied = context
            .set_options(Options::default().deny_cyclic(true))
            .compile()
            .unwrap_err();
        assert!(matches!(
            denied.downcast_ref::<CompileError>(),
            Some(CompileError::CyclicAuxiliary(_))
        ));
    }

    #[test]
    fn classify_accepts_free_variables() {
        let context = Context::new()
            .add_file("ab.dda", "a0 = const(1)\na = int(b, dt, b0)\nb = int(a, dt, a0)")
            .unwrap();
        let classification = context.classify().unwrap();
        let evolved: Vec<_> = classification.evolved.iter().map(Atom::as_str).collect();
        assert_eq!(evolved, vec!["a", "b"]);
        assert!(classification.aux_cyclic.is_empty());

        let err = context.compile().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompileError>(),
            Some(CompileError::UndefinedVariable(_))
        ));
    }

    #[test]
    fn simulator_with_overrides() {
        let options = RunOptions {
            initial: [("y".to_string(), 3.0)].into_iter().collect(),
            ..Default::default()
        };
        let simulator = Context::new()
            .add_file("decay.dda", "y = int(y, 0.1, 1)")
            .unwrap()
            .simulator(&options)
            .unwrap();
        assert_eq!(simulator.value("y"), Some(3.0));
    }
}
