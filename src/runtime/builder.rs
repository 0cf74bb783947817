//! Lowering classified equation sets into programs.

use tracing::debug;

use crate::{
    analysis::Classification,
    error::{CompileError, Result},
    frontend::{Arg, Atom, EquationSet, Term},
    vocabulary::{Element, Vocabulary},
};

use super::{Block, Expr, Group, Operand, Parameter, Program, Record, Section, Slot, Statement};

/// Builds a [`Program`] from a linearized equation set and its classification.
pub struct ProgramBuilder<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> ProgramBuilder<'a> {
    /// Create a builder resolving element heads with `vocabulary`.
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Lower `lin` into a program.
    pub fn build(&self, lin: &EquationSet, classification: &Classification) -> Result<Program> {
        for name in classification.aux_all() {
            if !lin.contains(name.as_str()) {
                return Err(CompileError::UndefinedVariable(name.to_string()));
            }
        }

        let records = RecordsBuilder {
            state: classification.evolved.iter().cloned().collect(),
            aux: classification.aux_all().into_iter().cloned().collect(),
            constants: classification.constants.iter().cloned().collect(),
        };
        let lowering = Lowering {
            vocabulary: self.vocabulary,
            lin,
            records: &records,
        };

        let constant_values = classification
            .constants
            .iter()
            .map(|name| lowering.constant_value(name))
            .collect::<Result<Vec<_>>>()?;

        let mut initial = vec![];
        let mut dt = vec![];
        let mut derivatives = vec![];
        for name in &classification.evolved {
            let (statement, step, value) = lowering.derivative(name)?;
            derivatives.push(statement);
            dt.push(step);
            initial.push(value);
        }

        let aux_block = |section: Section, names: &[Atom]| -> Result<Block> {
            let statements = names
                .iter()
                .map(|name| lowering.auxiliary(name))
                .collect::<Result<Vec<_>>>()?;
            Ok(Block {
                section,
                statements,
            })
        };
        let blocks = vec![
            aux_block(Section::AuxSorted, &classification.aux_sorted)?,
            aux_block(Section::AuxCyclic, &classification.aux_cyclic)?,
            Block {
                section: Section::Derivatives,
                statements: derivatives,
            },
            aux_block(Section::AuxUnneeded, &classification.aux_unneeded)?,
        ];

        let program = Program {
            state: records.state,
            aux: records.aux,
            constants: records.constants,
            constant_values,
            initial,
            dt,
            blocks,
            variables: classification.all.clone(),
        };
        debug!(
            state = program.state.len(),
            aux = program.aux.len(),
            constants = program.constants.len(),
            statements = program.statements().count(),
            "built program"
        );
        Ok(program)
    }
}

struct RecordsBuilder {
    state: Record,
    aux: Record,
    constants: Record,
}

impl RecordsBuilder {
    fn slot(&self, name: &str) -> Option<Slot> {
        [
            (Group::State, &self.state),
            (Group::Aux, &self.aux),
            (Group::Constant, &self.constants),
        ]
        .into_iter()
        .find_map(|(group, record)| record.index_of(name).map(|index| Slot::new(group, index)))
    }
}

struct Lowering<'a> {
    vocabulary: &'a Vocabulary,
    lin: &'a EquationSet,
    records: &'a RecordsBuilder,
}

impl<'a> Lowering<'a> {
    fn rhs(&self, name: &Atom) -> Result<&'a Term> {
        self.lin
            .get(name.as_str())
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))
    }

    /// Resolve the head of `term` and check its argument count.
    fn element(&self, name: &Atom, term: &Term) -> Result<Element> {
        let element = self.vocabulary.resolve(term.head());
        if let Element::Unknown(head) = &element {
            return Err(CompileError::UnknownElement {
                head: head.to_string(),
                term: term.to_string(),
            });
        }
        if let Some(arity) = self.vocabulary.arity(&element) {
            if !arity.accepts(term.tail().len()) {
                return Err(shape(
                    name,
                    format!(
                        "`{}` takes {} arguments, but {} given in `{}`",
                        element,
                        arity,
                        term.tail().len(),
                        term
                    ),
                ));
            }
        }
        Ok(element)
    }

    fn constant_value(&self, name: &Atom) -> Result<f64> {
        let rhs = self.rhs(name)?;
        self.element(name, rhs)?;
        match rhs.tail() {
            [Arg::Number(number)] => Ok(number.0),
            _ => Err(shape(
                name,
                format!("`{rhs}` must wrap a number literal"),
            )),
        }
    }

    fn derivative(&self, name: &Atom) -> Result<(Statement, Parameter, Parameter)> {
        let rhs = self.rhs(name)?;
        let element = self.element(name, rhs)?;
        let tail = rhs.tail();
        if tail.len() < 3 {
            return Err(shape(
                name,
                format!("`{element}` requires at least {element}(value, dt, ic), got `{rhs}`"),
            ));
        }
        let (args, parameters) = tail.split_at(tail.len() - 2);
        let step = self.parameter(name, &parameters[0], "step size")?;
        let initial = self.parameter(name, &parameters[1], "initial value")?;

        let statement = Statement {
            target: Slot::new(Group::Derivative, self.index(&self.records.state, name)?),
            expr: Expr::Apply {
                element,
                args: self.operands(name, args)?,
            },
            description: format!("{name} = {rhs}"),
        };
        Ok((statement, step, initial))
    }

    fn auxiliary(&self, name: &Atom) -> Result<Statement> {
        let rhs = self.rhs(name)?;
        let expr = if rhs.is_variable() {
            Expr::Copy(self.variable(rhs.head())?)
        } else {
            Expr::Apply {
                element: self.element(name, rhs)?,
                args: self.operands(name, rhs.tail())?,
            }
        };
        Ok(Statement {
            target: Slot::new(Group::Aux, self.index(&self.records.aux, name)?),
            expr,
            description: format!("{name} = {rhs}"),
        })
    }

    fn index(&self, record: &Record, name: &Atom) -> Result<usize> {
        record
            .index_of(name.as_str())
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))
    }

    fn variable(&self, variable: &Atom) -> Result<Operand> {
        self.records
            .slot(variable.as_str())
            .map(Operand::Slot)
            .ok_or_else(|| CompileError::UndefinedVariable(variable.to_string()))
    }

    fn operands(&self, name: &Atom, args: &[Arg]) -> Result<Vec<Operand>> {
        args.iter()
            .map(|arg| match arg {
                Arg::Number(number) => Ok(Operand::Number(number.0)),
                Arg::Term(term) if term.is_variable() => self.variable(term.head()),
                Arg::Term(term) => match literal(term) {
                    Some(value) => Ok(Operand::Number(value)),
                    None => Err(shape(
                        name,
                        format!("nested term `{term}` left, the equations are not linearized"),
                    )),
                },
            })
            .collect()
    }

    /// A number, `const(number)`, or a variable standing for an explicit constant.
    fn parameter(&self, name: &Atom, arg: &Arg, what: &str) -> Result<Parameter> {
        let term = match arg {
            Arg::Number(number) => return Ok(Parameter::Number(number.0)),
            Arg::Term(term) => term,
        };
        if let Some(value) = literal(term) {
            return Ok(Parameter::Number(value));
        }
        if term.is_term() {
            return Err(shape(
                name,
                format!("{what} must be a constant, got `{term}`"),
            ));
        }

        // Follow `a = b` aliases down to the constant.
        let mut current = term.head();
        for _ in 0..=self.lin.len() {
            if let Some(index) = self.records.constants.index_of(current.as_str()) {
                return Ok(Parameter::Constant(index));
            }
            match self.lin.get(current.as_str()) {
                Some(rhs) if rhs.is_variable() && rhs.head() != current => current = rhs.head(),
                _ => break,
            }
        }
        Err(shape(
            name,
            format!("{what} must be a constant, but `{term}` is not"),
        ))
    }
}

fn literal(term: &Term) -> Option<f64> {
    match term.tail() {
        [Arg::Number(number)] if term.head().as_str() == "const" => Some(number.0),
        _ => None,
    }
}

fn shape(name: &Atom, reason: String) -> CompileError {
    CompileError::Shape {
        variable: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify;

    fn build(source: &str, strict: bool) -> Result<Program> {
        let vocabulary = Vocabulary::standard();
        let lin = source
            .parse::<EquationSet>()
            .unwrap()
            .linearize(strict)
            .unwrap();
        let classification = classify(&lin, &vocabulary)?;
        ProgramBuilder::new(&vocabulary).build(&lin, &classification)
    }

    #[test]
    fn exponential_decay() {
        let program = build("y = int(mult(-1, neg(y)), 0.05, -1)", false).unwrap();
        assert_eq!(program.state.fields().len(), 1);
        assert_eq!(program.dt, vec![Parameter::Number(0.05)]);
        assert_eq!(program.initial, vec![Parameter::Number(-1.0)]);
        assert_eq!(program.statements().count(), 3);
        assert_eq!(program.lookup("y"), Some(Slot::new(Group::State, 0)));
        assert!(matches!(program.lookup("neg_1"), Some(Slot { group: Group::Aux, .. })));
    }

    #[test]
    fn evaluation_order() {
        let program = build("k = const(2)\ny = int(a, 0.1, 1)\na = mult(k, y)\nout = neg(y)", false)
            .unwrap();
        let sections: Vec<_> = program
            .blocks
            .iter()
            .map(|block| (block.section, block.statements.len()))
            .collect();
        assert_eq!(
            sections,
            vec![
                (Section::AuxSorted, 1),
                (Section::AuxCyclic, 0),
                (Section::Derivatives, 1),
                (Section::AuxUnneeded, 1),
            ]
        );
        assert_eq!(program.constant_values, vec![2.0]);
    }

    #[test]
    fn step_size_from_constants_and_aliases() {
        let program = build("dt = const(0.01)\nh = dt\ny = int(y, h, 1)", false).unwrap();
        assert_eq!(program.dt, vec![Parameter::Constant(0)]);

        let strict = build(
            "foo = const(0.7)\nbaz = mult(bar, bar)\nbar = neg(int(neg(baz), foo, 0.3))",
            true,
        )
        .unwrap();
        assert_eq!(strict.dt, vec![Parameter::Constant(0)]);
        assert_eq!(strict.initial, vec![Parameter::Number(0.3)]);
    }

    #[test]
    fn too_few_integrator_arguments() {
        let err = build("y = int(y, 0.1)", false).unwrap_err();
        assert!(matches!(err, CompileError::Shape { ref variable, .. } if variable == "y"));
    }

    #[test]
    fn dynamic_step_size_is_rejected() {
        let err = build("y = int(y, y, 0)", false).unwrap_err();
        assert!(matches!(err, CompileError::Shape { .. }));
    }

    #[test]
    fn unknown_elements() {
        let err = build("y = int(foo(y), 0.1, 0)", false).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownElement {
                head: "foo".to_string(),
                term: "foo(y)".to_string()
            }
        );
    }

    #[test]
    fn arity_mismatch() {
        let err = build("y = int(neg(y, y), 0.1, 0)", false).unwrap_err();
        assert!(matches!(err, CompileError::Shape { .. }));
    }

    #[test]
    fn undefined_variables() {
        let err = build("y = int(x, 0.1, 0)", false).unwrap_err();
        assert_eq!(err, CompileError::UndefinedVariable("x".to_string()));
    }
}
