//! Compiler and simulation options.

use std::collections::BTreeMap;

use crate::{runtime::RungeKutta, vocabulary::Vocabulary};

/// Compiler options.
#[derive(Clone, Debug)]
pub struct Options {
    /// Put every equation into `name = element(variables...)` form.
    pub strict_naming: bool,
    /// Fail instead of warning on feedback loops between auxiliaries.
    pub deny_cyclic: bool,
    /// Significant digits of the numbers printed by generated programs.
    pub number_precision: Option<usize>,
    /// Known computing elements.
    pub vocabulary: Vocabulary,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict_naming: false,
            deny_cyclic: false,
            number_precision: None,
            vocabulary: Vocabulary::standard(),
        }
    }
}

impl Options {
    /// Set [`Options::strict_naming`].
    pub fn strict_naming(mut self, strict: bool) -> Self {
        self.strict_naming = strict;
        self
    }

    /// Set [`Options::deny_cyclic`].
    pub fn deny_cyclic(mut self, deny: bool) -> Self {
        self.deny_cyclic = deny;
        self
    }

    /// Set [`Options::number_precision`].
    pub fn number_precision(mut self, precision: Option<usize>) -> Self {
        self.number_precision = precision;
        self
    }

    /// Replace the vocabulary.
    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }
}

/// Options of a simulation run, named like the flags of generated programs.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    /// Number of time steps.
    pub max_iterations: usize,
    /// Write every n-th step only.
    pub modulo_write: usize,
    /// Order of the Runge-Kutta scheme, 1 to 4.
    pub rk_order: u32,
    /// Write a row before the first step.
    pub write_initial_conditions: bool,
    /// Evaluate the auxiliaries for the current state before writing a row.
    pub always_compute_aux_before_printing: bool,
    /// Write raw native endian doubles instead of text.
    pub binary_output: bool,
    /// Print the variable names and stop.
    pub list_all_variables: bool,
    /// Variables to write; all if empty.
    pub query: Vec<String>,
    /// Initial value overrides.
    pub initial: BTreeMap<String, f64>,
    /// Step size overrides.
    pub dt: BTreeMap<String, f64>,
    /// Constant overrides.
    pub constants: BTreeMap<String, f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            modulo_write: 1,
            rk_order: 1,
            write_initial_conditions: false,
            always_compute_aux_before_printing: true,
            binary_output: false,
            list_all_variables: false,
            query: vec![],
            initial: BTreeMap::new(),
            dt: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    /// The scheme selected by `rk_order`.
    pub fn scheme(&self) -> Option<RungeKutta> {
        RungeKutta::from_order(self.rk_order)
    }

    /// Parse arguments the way generated programs do: `--key=value`, bare
    /// `--flag` meaning `--flag=1`, `--ic:NAME=V`, `--dt:NAME=V`,
    /// `--const:NAME=V`, and query variables.
    pub fn from_args<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            let Some(flag) = arg.strip_prefix("--") else {
                options.query.push(arg.to_string());
                continue;
            };
            let (key, value) = flag.split_once('=').unwrap_or((flag, "1"));

            if let Some((kind, name)) = key.split_once(':') {
                let value = number::<f64>(arg, value)?;
                let overrides = match kind {
                    "ic" => &mut options.initial,
                    "dt" => &mut options.dt,
                    "const" => &mut options.constants,
                    _ => return Err(format!("illegal argument `{arg}`")),
                };
                overrides.insert(name.to_string(), value);
                continue;
            }

            match key {
                "max_iterations" => options.max_iterations = number(arg, value)?,
                "modulo_write" => options.modulo_write = number(arg, value)?,
                "rk_order" => options.rk_order = number(arg, value)?,
                "write_initial_conditions" => options.write_initial_conditions = flag_value(arg, value)?,
                "always_compute_aux_before_printing" => {
                    options.always_compute_aux_before_printing = flag_value(arg, value)?
                }
                "binary_output" => options.binary_output = flag_value(arg, value)?,
                "list_all_variables" => options.list_all_variables = flag_value(arg, value)?,
                _ => return Err(format!("illegal argument `{arg}`")),
            }
        }
        Ok(options)
    }
}

fn number<T: std::str::FromStr>(arg: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("not a number in `{arg}`: {value}"))
}

fn flag_value(arg: &str, value: &str) -> Result<bool, String> {
    match value {
        "1" | "true" | "True" => Ok(true),
        "0" | "false" | "False" => Ok(false),
        _ => Err(format!("not a boolean in `{arg}`: {value}")),
    }
}
