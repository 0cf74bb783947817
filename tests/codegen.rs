use ddac::{
    options::{Options, RunOptions},
    runtime::target::{Listing, C},
    Context,
};

const OSCILLATOR: &str = "\
# harmonic oscillator, x'' = -k x
k = const(4)
dt = const(0.001)
v = int(mult(k, x), dt, 0)
x = int(neg(v), dt, 1)
energy = sum(mult(v, v), mult(k, x, x))
";

fn emit<T: ddac::runtime::target::Target>(source: &str) -> String {
    let mut out = vec![];
    Context::new()
        .add_file("oscillator.dda", source)
        .unwrap()
        .output_stream::<T>(&mut out)
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn c_program_layout() {
    let code = emit::<C>(OSCILLATOR);

    // Records, parameters and lookup tables.
    assert!(code.contains("typedef struct {\n    double v;\n    double x;\n} state_t;"));
    assert!(code.contains("constants.k = 4.0;"));
    assert!(code.contains("dt.v = constants.dt;"));
    assert!(code.contains("initial.x = 1.0;"));
    assert!(code.contains("#define N_VARIABLES 9"));

    // Auxiliaries are evaluated before the derivatives reading them.
    let input = code.find("aux->mult_3 = (constants.k * state->x);").unwrap();
    let derivative = code.find("dqdt->v = -(aux->mult_3);").unwrap();
    assert!(input < derivative);
    assert!(code.contains("dqdt->x = -(aux->neg_1);"));
    assert!(code.contains("aux->energy = -(aux->mult_1 + aux->mult_2);"));

    // Command line of the generated program.
    for flag in [
        "max_iterations",
        "modulo_write",
        "rk_order",
        "binary_output",
        "write_initial_conditions",
        "always_compute_aux_before_printing",
        "list_all_variables",
        "--ic:NAME=VALUE",
    ] {
        assert!(code.contains(flag), "{flag}");
    }
}

#[test]
fn listing_uses_circuit_names() {
    let listing = emit::<Listing>(OSCILLATOR);
    assert!(listing.contains("const k = 4;"));
    assert!(listing.contains("state x = 1; // dt = constants.dt"));
    assert!(listing.contains("    // auxiliaries not needed for the time evolution"));
}

#[test]
fn simulated_oscillator_keeps_its_energy() {
    let context = Context::new()
        .set_options(Options::default())
        .add_file("oscillator.dda", OSCILLATOR)
        .unwrap();
    let options = RunOptions::from_args([
        "--max_iterations=1000",
        "--modulo_write=100",
        "--rk_order=4",
        "x",
        "energy",
    ])
    .unwrap();
    let mut simulator = context.simulator(&options).unwrap();
    let mut out = vec![];
    simulator.run(&options, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let rows: Vec<Vec<f64>> = text
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(|v| v.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 10);
    for row in &rows {
        // sum(...) is negated, x(0) = 1 and k = 4
        assert!((row[1] + 4.0).abs() < 1e-6, "{row:?}");
    }
    // x(t) = cos(2t) at t = 1
    let t = 1.0f64;
    let x = simulator.value("x").unwrap();
    assert!((x - (2.0 * t).cos()).abs() < 1e-6, "{x}");
}
