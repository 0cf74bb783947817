//! Reading DDA source text.

use std::collections::HashMap;

use pest::{
    iterators::{Pair, Pairs},
    Parser,
};

use super::{
    state::EquationSet,
    symbol::{Arg, Atom, Number, Term},
};
use crate::utils::Span;

mod grammar {
    #[derive(Parser)]
    #[grammar = "dda.pest"]
    pub struct DdaParser;
}

use grammar::{DdaParser, Rule};

/// Parse a DDA file into an equation set.
///
/// One equation `name = expr` per line or per `;`, `#` starts a comment. A
/// bare number on the right-hand side stands for `const(number)`. Errors come
/// back rendered as source diagnostics.
pub fn parse(source: &str, filename: &str, color: bool) -> Result<EquationSet, String> {
    let mut parsed = DdaParser::parse(Rule::Program, source).map_err(|err| {
        let (start, end) = match err.location {
            pest::error::InputLocation::Pos(pos) => (pos, pos),
            pest::error::InputLocation::Span(span) => span,
        };
        let message = err.variant.message();
        Span::new((), filename, source, start, end).render("syntax error", &message, color)
    })?;

    let parser = ProgramParser {
        filename,
        source,
        color,
    };
    match parsed.next() {
        Some(program) => parser.parse_program(program),
        None => Ok(EquationSet::new()),
    }
}

#[derive(Copy, Clone)]
struct ProgramParser<'a> {
    filename: &'a str,
    source: &'a str,
    color: bool,
}

impl<'a> ProgramParser<'a> {
    fn parse_program(self, program: Pair<'a, Rule>) -> Result<EquationSet, String> {
        let mut equations = EquationSet::new();
        let mut defined: HashMap<Atom, usize> = HashMap::new();

        for pair in program.into_inner() {
            match pair.as_rule() {
                Rule::Equation => {
                    let (name, rhs) = self.parse_equation(pair)?;
                    let line = name.lines().map_or(0, |lines| lines.line_start);
                    if let Some(previous) = defined.get(&*name) {
                        let message = format!("`{}` is already defined on line {}", *name, previous);
                        return Err(name.render("duplicate definition", &message, self.color));
                    }
                    defined.insert((*name).clone(), line);
                    equations.insert(name.into_inner(), rhs);
                }
                Rule::EOI => {}
                _ => unreachable!(),
            }
        }

        Ok(equations)
    }

    fn parse_equation(self, equation: Pair<'a, Rule>) -> Result<(Span<'a, Atom>, Term), String> {
        let span = equation.as_span();
        let mut pairs = equation.into_inner();

        let name = self.parse_ident(self.child(&mut pairs, span)?)?;
        let rhs = match self.parse_expr(self.child(&mut pairs, span)?)? {
            Arg::Term(term) => term,
            Arg::Number(number) => Term::new(constant(), vec![Arg::Number(number)]),
        };
        Ok((name, rhs))
    }

    fn parse_expr(self, expr: Pair<'a, Rule>) -> Result<Arg, String> {
        let span = expr.as_span();
        match expr.as_rule() {
            Rule::Application => {
                let mut pairs = expr.into_inner();
                let head = self.parse_ident(self.child(&mut pairs, span)?)?;
                let tail = pairs
                    .map(|arg| self.parse_expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arg::Term(Term::new(head.into_inner(), tail)))
            }
            Rule::Variable => {
                let name = self.parse_ident(self.child(&mut expr.into_inner(), span)?)?;
                Ok(Arg::Term(Term::variable(name.into_inner())))
            }
            Rule::Number => match expr.as_str().parse::<f64>() {
                Ok(value) => Ok(Arg::Number(Number(value))),
                Err(err) => Err(self.error(span, "invalid number", &err.to_string())),
            },
            _ => unreachable!(),
        }
    }

    fn parse_ident(self, ident: Pair<'a, Rule>) -> Result<Span<'a, Atom>, String> {
        let span = ident.as_span();
        match Atom::new(ident.as_str()) {
            Ok(atom) => Ok(Span::from_pest(atom, self.filename, self.source, span)),
            Err(err) => Err(self.error(span, "invalid identifier", &err.to_string())),
        }
    }

    fn child(
        self,
        pairs: &mut Pairs<'a, Rule>,
        span: pest::Span<'a>,
    ) -> Result<Pair<'a, Rule>, String> {
        pairs
            .next()
            .ok_or_else(|| self.error(span, "syntax error", "incomplete expression"))
    }

    fn error(self, span: pest::Span<'a>, title: &str, message: &str) -> String {
        Span::from_pest((), self.filename, self.source, span).render(title, message, self.color)
    }
}

fn constant() -> Atom {
    match Atom::new("const") {
        Ok(atom) => atom,
        Err(_) => unreachable!(),
    }
}
