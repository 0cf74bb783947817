use std::collections::HashSet;

use ddac::{
    analysis::{classify, topological_sort},
    frontend::{Atom, EquationSet, Term},
    vocabulary::Vocabulary,
};

const CIRCUITS: &[&str] = &[
    "y = int(mult(-1, neg(y)), 0.05, -1)",
    "x = neg(int(neg(int(neg(mult(1, x), 0.005, 1)), 0.005, 0)))",
    "foo = const(0.7)\nbaz = mult(bar, bar)\nbar = neg(int(neg(baz), foo, 0.3))",
    "a = neg(b)\nb = neg(a)\ny = int(a, 0.1, 0)\nout = sum(y, neg(y), mult(y, y))",
    "k = const(2)\nv = int(mult(k, x), 0.01, 0)\nx = int(v, 0.01, 1)\ne = mult(v, v)",
];

fn parse(source: &str) -> EquationSet {
    source.parse().unwrap()
}

#[test]
fn linearization_is_idempotent() {
    for source in CIRCUITS {
        for strict in [false, true] {
            let once = parse(source).linearize(strict).unwrap();
            let twice = once.linearize(strict).unwrap();
            assert_eq!(once, twice, "strict = {strict}:\n{source}");
        }
    }
}

#[test]
fn linearized_equations_hold_one_element() {
    for source in CIRCUITS {
        let lin = parse(source).linearize(false).unwrap();
        for (name, rhs) in lin.iter() {
            for arg in rhs.tail() {
                if let Some(term) = arg.as_term() {
                    assert!(
                        term.is_variable() || term.head().as_str() == "const",
                        "{name} = {rhs}"
                    );
                }
            }
        }
    }
}

#[test]
fn classification_is_exhaustive_and_disjoint() {
    let vocabulary = Vocabulary::standard();
    for source in CIRCUITS {
        let lin = parse(source).linearize(false).unwrap();
        let c = classify(&lin, &vocabulary).unwrap();
        let mut seen: HashSet<&Atom> = HashSet::new();
        for (category, names) in c.ordering() {
            for name in names {
                assert!(seen.insert(name), "{name} twice, again as {category}");
            }
        }
        assert_eq!(seen.len(), lin.all_variables().len(), "{source}");
        for name in lin.names() {
            assert!(c.where_is(name.as_str()).is_some(), "{name} lost");
        }
    }
}

#[test]
fn sorted_auxiliaries_follow_their_dependencies() {
    let vocabulary = Vocabulary::standard();
    for source in CIRCUITS {
        let lin = parse(source).linearize(false).unwrap();
        let c = classify(&lin, &vocabulary).unwrap();
        let position = |name: &Atom| c.aux_sorted.iter().position(|aux| aux == name);
        for (dependent, dependency) in lin.dependency_graph() {
            if let (Some(i), Some(j)) = (position(&dependent), position(&dependency)) {
                assert!(j < i, "{dependency} must come before {dependent}");
            }
        }
    }
}

#[test]
fn topological_sort_orders_every_acyclic_node() {
    let edges = vec![(1, 2), (1, 3), (2, 4), (3, 4), (4, 5), (6, 5)];
    let sorted = topological_sort(edges.clone());
    assert!(sorted.cyclic.is_empty());
    assert_eq!(sorted.ordered.len(), 6);
    for (dependent, dependency) in edges {
        let i = sorted.ordered.iter().position(|n| *n == dependent).unwrap();
        let j = sorted.ordered.iter().position(|n| *n == dependency).unwrap();
        assert!(j < i);
    }
}

#[test]
fn text_round_trip() {
    for source in CIRCUITS {
        let equations = parse(source);
        let reparsed: EquationSet = equations.to_string().parse().unwrap();
        assert_eq!(equations, reparsed);

        let lin = equations.linearize(true).unwrap();
        let reparsed: EquationSet = lin.to_string().parse().unwrap();
        assert_eq!(lin, reparsed);
    }
}

#[test]
fn text_round_trip_of_unusual_names() {
    let mut equations = EquationSet::new();
    for name in ["x'", "_v.2", "a.b'", "_"] {
        equations
            .define(name, Term::apply("neg", vec![Term::var("z").unwrap().into()]).unwrap())
            .unwrap();
    }
    let reparsed: EquationSet = equations.to_string().parse().unwrap();
    assert_eq!(equations, reparsed);

    for name in ["x#y", "a=b", "1x", "a^b", "a;b"] {
        assert!(equations.clone().define(name, Term::var("z").unwrap()).is_err());
    }
}
