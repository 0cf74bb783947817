use ddac::{
    analysis::{classify, Classification},
    error::Warning,
    frontend::{Atom, EquationSet},
    options::RunOptions,
    runtime::{vm::Simulator, ProgramBuilder, RungeKutta},
    vocabulary::Vocabulary,
    Context,
};

fn classified(source: &str) -> (EquationSet, Classification) {
    let lin = source
        .parse::<EquationSet>()
        .unwrap()
        .linearize(false)
        .unwrap();
    let classification = classify(&lin, &Vocabulary::standard()).unwrap();
    (lin, classification)
}

fn names(atoms: &[Atom]) -> Vec<&str> {
    atoms.iter().map(Atom::as_str).collect()
}

const DECAY: &str = "y = int(mult(-1, neg(y)), 0.05, -1)";

#[test]
fn single_exponential_decay() {
    let (lin, c) = classified(DECAY);
    assert_eq!(names(&c.evolved), vec!["y"]);
    assert!(c.aux_cyclic.is_empty());
    assert!(c.aux_unneeded.is_empty());
    // The hoisted sub-terms are evaluated before the integrator input.
    assert_eq!(names(&c.aux_sorted), vec!["neg_1", "mult_1"]);
    assert_eq!(lin.get("y").unwrap().to_string(), "int(mult_1, 0.05, -1)");

    let program = ProgramBuilder::new(&Vocabulary::standard())
        .build(&lin, &c)
        .unwrap();
    let mut simulator = Simulator::new(program);
    for _ in 0..60 {
        simulator.step(RungeKutta::Euler).unwrap();
    }
    let exact = -(-3.0f64).exp();
    let y = simulator.value("y").unwrap();
    assert!(((y - exact) / exact).abs() < 0.1, "y(3) = {y}, expected {exact}");
}

#[test]
fn feedback_through_integrators() {
    let (_, c) = classified(
        "dt = const(0.1)\na0 = const(1)\nb0 = const(0)\na = int(b, dt, b0)\nb = int(a, dt, a0)",
    );
    assert_eq!(names(&c.evolved), vec!["a", "b"]);
    assert_eq!(names(&c.constants), vec!["a0", "b0", "dt"]);
    assert!(c.aux_cyclic.is_empty());
    assert!(c.warnings().is_empty());
}

#[test]
fn pure_algebraic_cycle() {
    let (_, c) = classified("p = sum(q, 1)\nq = sum(p, 1)");
    let mut cyclic = names(&c.aux_cyclic);
    cyclic.sort();
    assert_eq!(cyclic, vec!["p", "q"]);
    assert!(c
        .warnings()
        .iter()
        .any(|warning| matches!(warning, Warning::CyclicAuxiliary(names) if names.len() == 2)));
}

#[test]
fn unneeded_auxiliary() {
    let (_, c) = classified("dt = const(0.1)\ny = int(1, dt, 0)\nz = mult(y, 2)");
    assert_eq!(names(&c.evolved), vec!["y"]);
    assert_eq!(names(&c.aux_unneeded), vec!["z"]);
    assert!(c.aux_sorted.is_empty());
}

#[test]
fn unneeded_auxiliary_is_still_written() {
    let context = Context::new()
        .add_file("d.dda", "dt = const(0.5)\ny = int(1, dt, 0)\nz = mult(y, 2)")
        .unwrap();
    let options = RunOptions::from_args(["--max_iterations=2", "y", "z"]).unwrap();
    let mut simulator = context.simulator(&options).unwrap();
    let mut out = vec![];
    simulator.run(&options, &mut out).unwrap();
    // dy/dt = -1 with dt = 0.5
    assert_eq!(String::from_utf8(out).unwrap(), "y\tz\n-0.5\t-1\n-1\t-2\n");
}
