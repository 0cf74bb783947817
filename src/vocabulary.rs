//! Computing elements known to the compiler.

use std::fmt::Display;

use indexmap::IndexMap;

use crate::frontend::symbol::Atom;

/// A computing element, i.e. the meaning of a compound term head.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Const,
    Neg,
    Div,
    Int,
    Diff,
    Sum,
    Mult,
    DeadUpper,
    DeadLower,
    Min,
    Max,
    Lt,
    Le,
    Gt,
    Ge,
    Sqrt,
    Abs,
    Exp,
    Floor,
    Sign,
    Noise,
    LogicalXor,
    Funcgen,
    Arcsin,
    /// Head not present in the vocabulary in use.
    Unknown(Atom),
}

impl Element {
    /// Name of the element as written in DDA files.
    pub fn name(&self) -> &str {
        match self {
            Element::Const => "const",
            Element::Neg => "neg",
            Element::Div => "div",
            Element::Int => "int",
            Element::Diff => "diff",
            Element::Sum => "sum",
            Element::Mult => "mult",
            Element::DeadUpper => "dead_upper",
            Element::DeadLower => "dead_lower",
            Element::Min => "min",
            Element::Max => "max",
            Element::Lt => "lt",
            Element::Le => "le",
            Element::Gt => "gt",
            Element::Ge => "ge",
            Element::Sqrt => "sqrt",
            Element::Abs => "abs",
            Element::Exp => "exp",
            Element::Floor => "floor",
            Element::Sign => "sign",
            Element::Noise => "noise",
            Element::LogicalXor => "logical_xor",
            Element::Funcgen => "funcgen",
            Element::Arcsin => "arcsin",
            Element::Unknown(head) => head.as_str(),
        }
    }

    /// Integration and differentiation: the variables they define are evolved in time.
    pub fn is_evolving(&self) -> bool {
        matches!(self, Element::Int | Element::Diff)
    }

    /// The literal-constant wrapper.
    pub fn is_constant(&self) -> bool {
        matches!(self, Element::Const)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of arguments an element accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many.
    Exact(usize),
    /// This many or more.
    AtLeast(usize),
}

impl Arity {
    /// Whether `count` arguments are acceptable.
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Immutable table from head names to elements.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    elements: IndexMap<String, (Element, Arity)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl Vocabulary {
    /// A vocabulary without any element.
    pub fn empty() -> Self {
        Self {
            elements: IndexMap::new(),
        }
    }

    /// The well-known DDA elements.
    pub fn standard() -> Self {
        use Arity::*;
        use Element::*;

        [
            (Const, Exact(1)),
            (Neg, Exact(1)),
            (Div, Exact(2)),
            (Int, AtLeast(3)),
            (Diff, AtLeast(3)),
            (Sum, AtLeast(1)),
            (Mult, AtLeast(1)),
            (DeadUpper, Exact(2)),
            (DeadLower, Exact(2)),
            (Min, Exact(2)),
            (Max, Exact(2)),
            (Lt, Exact(4)),
            (Le, Exact(4)),
            (Gt, Exact(4)),
            (Ge, Exact(4)),
            (Sqrt, Exact(1)),
            (Abs, Exact(1)),
            (Exp, Exact(1)),
            (Floor, Exact(1)),
            (Sign, Exact(1)),
            (Noise, Exact(1)),
            (LogicalXor, Exact(2)),
            (Funcgen, AtLeast(1)),
            (Arcsin, Exact(1)),
        ]
        .into_iter()
        .fold(Self::empty(), |vocabulary, (element, arity)| {
            vocabulary.with(element, arity)
        })
    }

    /// Register an element under its own name.
    pub fn with(mut self, element: Element, arity: Arity) -> Self {
        self.elements
            .insert(element.name().to_string(), (element, arity));
        self
    }

    /// Look a head up; unknown heads resolve to [`Element::Unknown`].
    pub fn resolve(&self, head: &Atom) -> Element {
        match self.elements.get(head.as_str()) {
            Some((element, _)) => element.clone(),
            None => Element::Unknown(head.clone()),
        }
    }

    /// Arity of a known element.
    pub fn arity(&self, element: &Element) -> Option<Arity> {
        self.elements.get(element.name()).map(|(_, arity)| *arity)
    }

    /// Names of all known elements, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }
}
