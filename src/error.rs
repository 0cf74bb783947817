//! Compiler errors and warnings.

use std::fmt::Display;

use thiserror::Error;

/// Errors raised by the analysis and code generation passes.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("malformed term: `{0}` is not an identifier")]
    MalformedTerm(String),

    #[error("unknown computing element `{head}` in `{term}`")]
    UnknownElement { head: String, term: String },

    #[error("in definition of `{variable}`: {reason}")]
    Shape { variable: String, reason: String },

    #[error("variable `{0}` is referenced but never defined")]
    UndefinedVariable(String),

    #[error(
        "internal compiler error: classification lost {missing:?} and duplicated {duplicated:?}"
    )]
    ClassificationLoss {
        missing: Vec<String>,
        duplicated: Vec<String>,
    },

    #[error("feedback loop between auxiliary variables: {}", .0.join(", "))]
    CyclicAuxiliary(Vec<String>),

    #[error("identifier `{original}` is empty after sanitization")]
    EmptyIdentifier { original: String },

    #[error("could not find a free name for `{0}`")]
    NameExhaustion(String),

    #[error("computing element `{element}` is not supported by the {target} back end")]
    Unsupported { element: String, target: String },

    #[error("{0}")]
    Syntax(String),
}

impl CompileError {
    /// Whether the error signals a bug in the compiler rather than a bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::ClassificationLoss { .. })
    }
}

/// Result type of the compiler passes.
pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Non-fatal findings collected along a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Auxiliary variables depending on each other without an integrator in between.
    CyclicAuxiliary(Vec<String>),
    /// Auxiliary variables not required for the time evolution.
    UnneededAuxiliary(Vec<String>),
    /// The system has no integrated or differentiated variable at all.
    NoEvolvedVariables,
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::CyclicAuxiliary(names) => write!(
                f,
                "auxiliary variables {} form a feedback loop without an integrator, \
                 their evaluation order is best effort",
                names.join(", ")
            ),
            Warning::UnneededAuxiliary(names) => write!(
                f,
                "auxiliary variables {} are not needed for the time evolution",
                names.join(", ")
            ),
            Warning::NoEvolvedVariables => write!(f, "no variable is evolved in time"),
        }
    }
}
