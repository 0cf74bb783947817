//! In-process simulation

use std::io::Write;

use thiserror::Error;
use tracing::debug;

use crate::{error::CompileError, options::RunOptions, vocabulary::Element};

use super::{Expr, Group, Operand, Program, RungeKutta, Slot};

/// Errors of a simulation run.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("`{0}` is not a variable of the program")]
    UnknownVariable(String),

    #[error("`{name}` is not {expected}")]
    WrongKind { name: String, expected: &'static str },

    #[error("invalid Runge-Kutta order {0}, expected 1 to 4")]
    InvalidOrder(u32),

    #[error("modulo_write must be positive")]
    InvalidModulo,

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Evaluates a program's derivative and integrates it in time.
pub struct Simulator {
    program: Program,
    constants: Vec<f64>,
    dt: Vec<f64>,
    state: Vec<f64>,
    aux: Vec<f64>,
    iterations: usize,
}

impl Simulator {
    /// Start from the initial values of `program`.
    pub fn new(program: Program) -> Self {
        let constants = program.constant_values.clone();
        let aux = vec![0.0; program.aux.len()];
        let mut simulator = Self {
            program,
            constants,
            dt: vec![],
            state: vec![],
            aux,
            iterations: 0,
        };
        simulator.reset_parameters();
        simulator
    }

    /// Start from `program` with the overrides of `options` applied.
    ///
    /// Constants are overridden first, so initial values and step sizes
    /// referring to them follow.
    pub fn with_overrides(program: Program, options: &RunOptions) -> Result<Self, RuntimeError> {
        let mut simulator = Self::new(program);
        for (name, value) in &options.constants {
            simulator.set_constant(name, *value)?;
        }
        simulator.reset_parameters();
        for (name, value) in &options.initial {
            simulator.set_initial(name, *value)?;
        }
        for (name, value) in &options.dt {
            simulator.set_dt(name, *value)?;
        }
        Ok(simulator)
    }

    fn reset_parameters(&mut self) {
        let constants = &self.constants;
        self.state = self
            .program
            .initial
            .iter()
            .map(|p| Program::resolve(*p, constants))
            .collect();
        self.dt = self
            .program
            .dt
            .iter()
            .map(|p| Program::resolve(*p, constants))
            .collect();
    }

    fn evolved_index(&self, name: &str) -> Result<usize, RuntimeError> {
        match self.program.lookup(name) {
            Some(Slot {
                group: Group::State,
                index,
            }) => Ok(index),
            Some(_) => Err(RuntimeError::WrongKind {
                name: name.to_string(),
                expected: "an evolved variable",
            }),
            None => Err(RuntimeError::UnknownVariable(name.to_string())),
        }
    }

    /// Override a constant.
    pub fn set_constant(&mut self, name: &str, value: f64) -> Result<(), RuntimeError> {
        match self.program.lookup(name) {
            Some(Slot {
                group: Group::Constant,
                index,
            }) => {
                self.constants[index] = value;
                Ok(())
            }
            Some(_) => Err(RuntimeError::WrongKind {
                name: name.to_string(),
                expected: "a constant",
            }),
            None => Err(RuntimeError::UnknownVariable(name.to_string())),
        }
    }

    /// Override the current value of an evolved variable.
    pub fn set_initial(&mut self, name: &str, value: f64) -> Result<(), RuntimeError> {
        let index = self.evolved_index(name)?;
        self.state[index] = value;
        Ok(())
    }

    /// Override the step size of an evolved variable.
    pub fn set_dt(&mut self, name: &str, value: f64) -> Result<(), RuntimeError> {
        let index = self.evolved_index(name)?;
        self.dt[index] = value;
        Ok(())
    }

    /// Current evolved values.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Number of steps taken.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The program being simulated.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Current value of any variable.
    ///
    /// Auxiliaries hold the value of their last evaluation.
    pub fn value(&self, name: &str) -> Option<f64> {
        let slot = self.program.lookup(name)?;
        self.read(slot, &self.state)
    }

    fn read(&self, slot: Slot, state: &[f64]) -> Option<f64> {
        match slot.group {
            Group::State | Group::Derivative => state.get(slot.index).copied(),
            Group::Aux => self.aux.get(slot.index).copied(),
            Group::Constant => self.constants.get(slot.index).copied(),
        }
    }

    /// Evaluate all statements for `state`, updating the auxiliaries and
    /// returning the time derivative.
    ///
    /// Auxiliaries on a feedback loop see the value of their last evaluation.
    pub fn evaluate(&mut self, state: &[f64]) -> Result<Vec<f64>, RuntimeError> {
        let mut derivative = vec![0.0; self.program.state.len()];
        let program = &self.program;
        let constants = &self.constants;
        let aux = &mut self.aux;

        let read = |operand: &Operand, aux: &[f64]| match operand {
            Operand::Number(value) => *value,
            Operand::Slot(slot) => match slot.group {
                Group::State | Group::Derivative => state.get(slot.index),
                Group::Aux => aux.get(slot.index),
                Group::Constant => constants.get(slot.index),
            }
            .copied()
            .unwrap_or(f64::NAN),
        };

        for statement in program.statements() {
            let value = match &statement.expr {
                Expr::Copy(operand) => read(operand, aux.as_slice()),
                Expr::Apply { element, args } => {
                    let args: Vec<f64> = args.iter().map(|arg| read(arg, aux.as_slice())).collect();
                    apply(element, &args)?
                }
            };
            let target = match statement.target.group {
                Group::Aux => aux.get_mut(statement.target.index),
                Group::Derivative => derivative.get_mut(statement.target.index),
                Group::State | Group::Constant => None,
            };
            if let Some(target) = target {
                *target = value;
            }
        }
        Ok(derivative)
    }

    /// Advance the state by one step of `scheme`.
    pub fn step(&mut self, scheme: RungeKutta) -> Result<(), RuntimeError> {
        let y = self.state.clone();
        let dt = self.dt.clone();
        self.state = scheme.step(&y, &dt, |stage| self.evaluate(stage))?;
        self.iterations += 1;
        Ok(())
    }

    /// Run the simulation, writing rows the way generated programs do.
    pub fn run(&mut self, options: &RunOptions, mut out: impl Write) -> Result<(), RuntimeError> {
        let scheme = options
            .scheme()
            .ok_or(RuntimeError::InvalidOrder(options.rk_order))?;
        if options.modulo_write == 0 {
            return Err(RuntimeError::InvalidModulo);
        }

        let query: Vec<String> = if options.query.is_empty() {
            self.program
                .variables
                .iter()
                .map(|name| name.to_string())
                .collect()
        } else {
            options.query.clone()
        };
        let slots = query
            .iter()
            .map(|name| {
                self.program
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::UnknownVariable(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            scheme = %scheme,
            iterations = options.max_iterations,
            variables = slots.len(),
            "running simulation"
        );

        if !options.binary_output {
            writeln!(out, "{}", query.join("\t"))?;
        }
        if options.write_initial_conditions {
            self.aux.iter_mut().for_each(|value| *value = f64::NAN);
            self.write_row(&slots, options, &mut out)?;
        }
        for iteration in 0..options.max_iterations {
            self.step(scheme)?;
            if iteration % options.modulo_write == 0 {
                self.write_row(&slots, options, &mut out)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    fn write_row(
        &mut self,
        slots: &[Slot],
        options: &RunOptions,
        mut out: impl Write,
    ) -> Result<(), RuntimeError> {
        let saved = self.aux.clone();
        if options.always_compute_aux_before_printing {
            let state = self.state.clone();
            self.evaluate(&state)?;
        }
        let values: Vec<f64> = slots
            .iter()
            .map(|slot| self.read(*slot, &self.state).unwrap_or(f64::NAN))
            .collect();
        self.aux = saved;

        if options.binary_output {
            for value in values {
                out.write_all(&value.to_ne_bytes())?;
            }
        } else {
            let row: Vec<String> = values.iter().map(|value| value.to_string()).collect();
            writeln!(out, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

/// Value of `element` for the given arguments.
///
/// Integrators yield their derivative, `-(a1 + ... + an)`, like summers do.
pub fn apply(element: &Element, args: &[f64]) -> Result<f64, CompileError> {
    let arg = |i: usize| args.get(i).copied().unwrap_or(f64::NAN);
    let value = match element {
        Element::Const => arg(0),
        Element::Neg => -arg(0),
        Element::Div => arg(0) / arg(1),
        Element::Int | Element::Diff | Element::Sum => -args.iter().sum::<f64>(),
        Element::Mult => args.iter().product(),
        Element::DeadUpper => {
            if arg(0) > arg(1) {
                arg(0) - arg(1)
            } else {
                0.0
            }
        }
        Element::DeadLower => {
            if arg(0) < arg(1) {
                arg(0) - arg(1)
            } else {
                0.0
            }
        }
        Element::Min => {
            if arg(0) < arg(1) {
                arg(0)
            } else {
                arg(1)
            }
        }
        Element::Max => {
            if arg(0) > arg(1) {
                arg(0)
            } else {
                arg(1)
            }
        }
        Element::Lt => select(arg(0) < arg(1), arg(2), arg(3)),
        Element::Le => select(arg(0) <= arg(1), arg(2), arg(3)),
        Element::Gt => select(arg(0) > arg(1), arg(2), arg(3)),
        Element::Ge => select(arg(0) >= arg(1), arg(2), arg(3)),
        Element::Sqrt => arg(0).sqrt(),
        Element::Abs => arg(0).abs(),
        Element::Exp => arg(0).exp(),
        Element::Floor => arg(0).trunc(),
        Element::Sign => {
            if arg(0) > 0.0 {
                1.0
            } else if arg(0) < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        Element::LogicalXor => select((arg(0) > 0.0) != (arg(1) > 0.0), 1.0, 0.0),
        Element::Arcsin => arg(0).asin(),
        Element::Noise | Element::Funcgen => {
            return Err(CompileError::Unsupported {
                element: element.to_string(),
                target: "simulator".to_string(),
            })
        }
        Element::Unknown(head) => {
            return Err(CompileError::UnknownElement {
                head: head.to_string(),
                term: head.to_string(),
            })
        }
    };
    Ok(value)
}

fn select(condition: bool, then: f64, otherwise: f64) -> f64 {
    if condition {
        then
    } else {
        otherwise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::classify,
        frontend::EquationSet,
        runtime::ProgramBuilder,
        vocabulary::Vocabulary,
    };

    fn program(source: &str) -> Program {
        let vocabulary = Vocabulary::standard();
        let lin = source
            .parse::<EquationSet>()
            .unwrap()
            .linearize(false)
            .unwrap();
        let classification = classify(&lin, &vocabulary).unwrap();
        ProgramBuilder::new(&vocabulary)
            .build(&lin, &classification)
            .unwrap()
    }

    #[test]
    fn elements() {
        assert_eq!(apply(&Element::Sum, &[1.0, 2.0]).unwrap(), -3.0);
        assert_eq!(apply(&Element::Int, &[1.0, 2.0]).unwrap(), -3.0);
        assert_eq!(apply(&Element::Mult, &[2.0, 3.0, 4.0]).unwrap(), 24.0);
        assert_eq!(apply(&Element::DeadUpper, &[3.0, 1.0]).unwrap(), 2.0);
        assert_eq!(apply(&Element::DeadUpper, &[0.0, 1.0]).unwrap(), 0.0);
        assert_eq!(apply(&Element::DeadLower, &[0.0, 1.0]).unwrap(), -1.0);
        assert_eq!(apply(&Element::Lt, &[1.0, 2.0, 10.0, 20.0]).unwrap(), 10.0);
        assert_eq!(apply(&Element::Ge, &[1.0, 2.0, 10.0, 20.0]).unwrap(), 20.0);
        assert_eq!(apply(&Element::Floor, &[-1.5]).unwrap(), -1.0);
        assert_eq!(apply(&Element::Sign, &[-0.3]).unwrap(), -1.0);
        assert_eq!(apply(&Element::LogicalXor, &[1.0, -1.0]).unwrap(), 1.0);
        assert!(matches!(
            apply(&Element::Noise, &[1.0]),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn exponential_decay_with_euler() {
        let mut simulator = Simulator::new(program("y = int(mult(-1, neg(y)), 0.05, -1)"));
        for _ in 0..60 {
            simulator.step(RungeKutta::Euler).unwrap();
        }
        let exact = -(-3.0f64).exp();
        let y = simulator.value("y").unwrap();
        assert!(((y - exact) / exact).abs() < 0.1, "{y} vs {exact}");
        assert_eq!(simulator.iterations(), 60);
    }

    #[test]
    fn higher_orders_are_more_accurate() {
        let source = "y = int(mult(-1, neg(y)), 0.05, -1)";
        let exact = -(-3.0f64).exp();
        let error = |scheme| {
            let mut simulator = Simulator::new(program(source));
            for _ in 0..60 {
                simulator.step(scheme).unwrap();
            }
            (simulator.value("y").unwrap() - exact).abs()
        };
        assert!(error(RungeKutta::Classic4) < error(RungeKutta::Midpoint));
        assert!(error(RungeKutta::Midpoint) < error(RungeKutta::Euler));
    }

    #[test]
    fn run_writes_header_and_rows() {
        let mut simulator = Simulator::new(program("y = int(y, 0.1, 1)\nk = const(2)"));
        let options = RunOptions {
            max_iterations: 4,
            modulo_write: 2,
            query: vec!["y".to_string(), "k".to_string()],
            ..Default::default()
        };
        let mut out = vec![];
        simulator.run(&options, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "y\tk");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("\t2"));
    }

    #[test]
    fn binary_rows() {
        let mut simulator = Simulator::new(program("y = int(y, 0.1, 1)"));
        let options = RunOptions {
            max_iterations: 3,
            binary_output: true,
            write_initial_conditions: true,
            query: vec!["y".to_string()],
            ..Default::default()
        };
        let mut out = vec![];
        simulator.run(&options, &mut out).unwrap();
        assert_eq!(out.len(), 4 * 8);
        assert_eq!(f64::from_ne_bytes(out[..8].try_into().unwrap()), 1.0);
    }

    #[test]
    fn overrides() {
        let options = RunOptions {
            initial: [("y".to_string(), 5.0)].into_iter().collect(),
            constants: [("h".to_string(), 0.5)].into_iter().collect(),
            ..Default::default()
        };
        let mut simulator =
            Simulator::with_overrides(program("h = const(0.1)\ny = int(y, h, 1)"), &options)
                .unwrap();
        assert_eq!(simulator.value("y"), Some(5.0));
        simulator.step(RungeKutta::Euler).unwrap();
        // dy/dt = -y
        assert_eq!(simulator.value("y"), Some(2.5));

        assert!(matches!(
            simulator.set_dt("h", 1.0),
            Err(RuntimeError::WrongKind { .. })
        ));
        assert!(matches!(
            simulator.set_constant("nope", 1.0),
            Err(RuntimeError::UnknownVariable(_))
        ));
    }

    #[test]
    fn invalid_run_options() {
        let mut simulator = Simulator::new(program("y = int(y, 0.1, 1)"));
        let options = RunOptions {
            rk_order: 5,
            ..Default::default()
        };
        assert!(matches!(
            simulator.run(&options, std::io::sink()),
            Err(RuntimeError::InvalidOrder(5))
        ));
    }
}
