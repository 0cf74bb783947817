//! Standalone C99 simulation program

use anyhow::{anyhow, Result};

use crate::{
    error::CompileError,
    frontend::clean::{Renamer, C_RESERVED},
    options::Options,
    vocabulary::Element,
};

use super::super::{Expr, Group, Operand, Parameter, Program, RungeKutta, Slot};

/// Standalone C99 program integrating the equations in time
///
/// Build with `cc -std=c99 -O2 program.c -lm`.
pub struct C;

/// Names the generated code defines or pulls in from the headers it includes.
const C_DEFINED: &[&str] = &[
    "NULL", "EOF", "NAN", "INFINITY", "HUGE_VAL", "RAND_MAX", "EXIT_SUCCESS", "EXIT_FAILURE",
    "BUFSIZ", "FILENAME_MAX", "M_PI", "M_E", "stdin", "stdout", "stderr", "errno",
    "OUTPUT_PRECISION", "N_STATE", "N_AUX", "N_CONST", "N_VARIABLES",
];

/// Field of records that would otherwise be empty.
const PLACEHOLDER: &str = "_none";

/// Significant digits printed unless configured, the C++ stream default.
const DEFAULT_PRECISION: usize = 6;

impl super::Target for C {
    fn write(mut f: impl std::io::Write, program: &Program, options: &Options) -> Result<()> {
        Self::check_elements(program)?;
        let fields = Fields::new(program)?;

        Self::write_prelude(&mut f)?;
        Self::write_records(&mut f, program, &fields, options)?;
        Self::write_lookup(&mut f, &fields)?;
        Self::write_parameters(&mut f, program, &fields)?;
        Self::write_state_ops(&mut f, &fields)?;
        Self::write_derivative(&mut f, program, &fields)?;
        Self::write_integrate(&mut f)?;
        Self::write_runtime(&mut f)?;
        Ok(())
    }
}

/// Sanitized C field names of the three records.
struct Fields {
    state: Vec<String>,
    aux: Vec<String>,
    constants: Vec<String>,
    names: [Vec<String>; 3],
}

impl Fields {
    fn new(program: &Program) -> Result<Self> {
        let reserved: Vec<&str> = C_RESERVED
            .iter()
            .chain(C_DEFINED)
            .copied()
            .chain([PLACEHOLDER])
            .collect();
        let mut renamer = Renamer::new(&reserved);
        let mut rename = |group: Group| {
            program
                .record(group)
                .fields()
                .iter()
                .map(|name| renamer.rename(name.as_str()))
                .collect::<crate::error::Result<Vec<_>>>()
        };
        let state = rename(Group::State)?;
        let aux = rename(Group::Aux)?;
        let constants = rename(Group::Constant)?;

        let original = |group: Group| -> Vec<String> {
            program
                .record(group)
                .fields()
                .iter()
                .map(|name| name.to_string())
                .collect()
        };
        Ok(Self {
            state,
            aux,
            constants,
            names: [
                original(Group::State),
                original(Group::Aux),
                original(Group::Constant),
            ],
        })
    }

    fn of(&self, group: Group) -> &[String] {
        match group {
            Group::State | Group::Derivative => &self.state,
            Group::Aux => &self.aux,
            Group::Constant => &self.constants,
        }
    }

    fn field(&self, slot: Slot) -> Result<&str> {
        self.of(slot.group)
            .get(slot.index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("no field behind {slot}"))
    }

    /// Fields as laid out in the struct, never empty.
    fn layout(fields: &[String]) -> Vec<&str> {
        if fields.is_empty() {
            vec![PLACEHOLDER]
        } else {
            fields.iter().map(String::as_str).collect()
        }
    }
}

/// A C double literal.
fn number(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INFINITY" } else { "(-INFINITY)" }.to_string()
    } else {
        format!("{value:?}")
    }
}

/// A C string literal.
fn string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn string_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| string(name))
        .chain(["NULL".to_string()])
        .collect::<Vec<_>>()
        .join(", ")
}

/// `k[i]` weighted by `weights`, zero weights skipped.
fn combination(weights: &[f64]) -> Option<String> {
    weights
        .iter()
        .enumerate()
        .filter(|(_, weight)| **weight != 0.0)
        .map(|(i, weight)| {
            if *weight == 1.0 {
                format!("k[{i}]")
            } else {
                format!("state_scale(k[{i}], {})", number(*weight))
            }
        })
        .reduce(|sum, term| format!("state_add({sum}, {term})"))
}

impl C {
    fn check_elements(program: &Program) -> Result<()> {
        for statement in program.statements() {
            if let Expr::Apply { element, .. } = &statement.expr {
                if matches!(element, Element::Funcgen | Element::Unknown(_)) {
                    return Err(CompileError::Unsupported {
                        element: element.to_string(),
                        target: "C".to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    const PRELUDE: &str = r#"
#include <math.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>

static inline double dda_neg(double a) { return -a; }
static inline double dda_div(double a, double b) { return a / b; }
static inline double dda_dead_upper(double a, double b) { return a > b ? a - b : 0; }
static inline double dda_dead_lower(double a, double b) { return a < b ? a - b : 0; }
static inline double dda_min(double a, double b) { return a < b ? a : b; }
static inline double dda_max(double a, double b) { return a > b ? a : b; }
static inline double dda_lt(double a, double b, double c, double d) { return a < b ? c : d; }
static inline double dda_le(double a, double b, double c, double d) { return a <= b ? c : d; }
static inline double dda_gt(double a, double b, double c, double d) { return a > b ? c : d; }
static inline double dda_ge(double a, double b, double c, double d) { return a >= b ? c : d; }
static inline double dda_sqrt(double a) { return sqrt(a); }
static inline double dda_abs(double a) { return fabs(a); }
static inline double dda_exp(double a) { return exp(a); }
static inline double dda_floor(double a) { return trunc(a); }
static inline double dda_sign(double a) { return a > 0 ? 1 : (a < 0 ? -1 : 0); }
static inline double dda_noise(double a) { return a * (2.0 * rand() / RAND_MAX - 1.0); }
static inline double dda_logical_xor(double a, double b) { return (a > 0) != (b > 0); }
static inline double dda_arcsin(double a) { return asin(a); }
"#;

    fn write_prelude(mut f: impl std::io::Write) -> Result<()> {
        writeln!(f, "// Generated by ddac. Build with: cc -std=c99 -O2 <file> -lm")?;
        f.write_all(C::PRELUDE.as_bytes())?;
        Ok(())
    }

    fn write_records(
        mut f: impl std::io::Write,
        program: &Program,
        fields: &Fields,
        options: &Options,
    ) -> Result<()> {
        let precision = options.number_precision.unwrap_or(DEFAULT_PRECISION);
        writeln!(f, "\n#define OUTPUT_PRECISION {precision}")?;

        for (name, group) in [
            ("state_t", Group::State),
            ("aux_t", Group::Aux),
            ("const_t", Group::Constant),
        ] {
            writeln!(f, "\ntypedef struct {{")?;
            for field in Fields::layout(fields.of(group)) {
                writeln!(f, "    double {field};")?;
            }
            writeln!(f, "}} {name};")?;
        }

        write!(
            f,
            r#"
static const_t constants;
static state_t initial, dt;

#define N_STATE {n_state}
static const char *state_names[] = {{ {state_names} }};
#define N_AUX {n_aux}
static const char *aux_names[] = {{ {aux_names} }};
#define N_CONST {n_const}
static const char *const_names[] = {{ {const_names} }};
#define N_VARIABLES {n_variables}
static const char *all_variables[] = {{ {all_variables} }};
"#,
            n_state = fields.state.len(),
            state_names = string_list(&fields.names[0]),
            n_aux = fields.aux.len(),
            aux_names = string_list(&fields.names[1]),
            n_const = fields.constants.len(),
            const_names = string_list(&fields.names[2]),
            n_variables = program.variables.len(),
            all_variables = string_list(
                &program
                    .variables
                    .iter()
                    .map(|name| name.to_string())
                    .collect::<Vec<_>>()
            ),
        )?;
        Ok(())
    }

    fn write_lookup(mut f: impl std::io::Write, fields: &Fields) -> Result<()> {
        for (prefix, record, names, cleaned) in [
            ("state", "state_t", &fields.names[0], &fields.state),
            ("aux", "aux_t", &fields.names[1], &fields.aux),
            ("const", "const_t", &fields.names[2], &fields.constants),
        ] {
            writeln!(
                f,
                "\nstatic double *{prefix}_by_name({record} *record, const char *name) {{"
            )?;
            writeln!(f, "    (void) record;")?;
            for (name, field) in names.iter().zip(cleaned) {
                writeln!(
                    f,
                    "    if (!strcmp(name, {})) return &record->{field};",
                    string(name)
                )?;
            }
            writeln!(f, "    return NULL;")?;
            writeln!(f, "}}")?;
        }

        writeln!(f, "\nstatic void aux_set_nan(aux_t *aux) {{")?;
        for field in Fields::layout(&fields.aux) {
            writeln!(f, "    aux->{field} = NAN;")?;
        }
        writeln!(f, "}}")?;
        Ok(())
    }

    fn parameter(parameter: Parameter, fields: &Fields) -> Result<String> {
        Ok(match parameter {
            Parameter::Number(value) => number(value),
            Parameter::Constant(index) => format!(
                "constants.{}",
                fields.field(Slot::new(Group::Constant, index))?
            ),
        })
    }

    fn write_parameters(mut f: impl std::io::Write, program: &Program, fields: &Fields) -> Result<()> {
        writeln!(f, "\nstatic void init_constants(void) {{")?;
        for (field, value) in fields.constants.iter().zip(&program.constant_values) {
            writeln!(f, "    constants.{field} = {};", number(*value))?;
        }
        writeln!(f, "}}")?;

        // Runs after constant overrides, so parameters naming constants follow them.
        writeln!(f, "\nstatic void init_parameters(void) {{")?;
        for (index, field) in fields.state.iter().enumerate() {
            let initial = program
                .initial
                .get(index)
                .ok_or_else(|| anyhow!("no initial value for `{field}`"))?;
            let dt = program
                .dt
                .get(index)
                .ok_or_else(|| anyhow!("no step size for `{field}`"))?;
            writeln!(f, "    initial.{field} = {};", Self::parameter(*initial, fields)?)?;
            writeln!(f, "    dt.{field} = {};", Self::parameter(*dt, fields)?)?;
        }
        writeln!(f, "}}")?;
        Ok(())
    }

    fn write_state_ops(mut f: impl std::io::Write, fields: &Fields) -> Result<()> {
        let layout = Fields::layout(&fields.state);
        for (signature, body) in [
            ("state_add(state_t a, state_t b)", "a.{} + b.{}"),
            ("state_scale(state_t a, double s)", "a.{} * s"),
            ("state_mul_dt(state_t a)", "a.{} * dt.{}"),
        ] {
            writeln!(f, "\nstatic state_t {signature} {{")?;
            writeln!(f, "    state_t r;")?;
            for field in &layout {
                writeln!(f, "    r.{field} = {};", body.replace("{}", field))?;
            }
            writeln!(f, "    return r;")?;
            writeln!(f, "}}")?;
        }
        Ok(())
    }

    fn slot(slot: Slot, fields: &Fields) -> Result<String> {
        let field = fields.field(slot)?;
        Ok(match slot.group {
            Group::State => format!("state->{field}"),
            Group::Derivative => format!("dqdt->{field}"),
            Group::Aux => format!("aux->{field}"),
            Group::Constant => format!("constants.{field}"),
        })
    }

    fn operand(operand: &Operand, fields: &Fields) -> Result<String> {
        match operand {
            Operand::Number(value) => Ok(number(*value)),
            Operand::Slot(slot) => Self::slot(*slot, fields),
        }
    }

    fn expr(expr: &Expr, fields: &Fields) -> Result<String> {
        let (element, args) = match expr {
            Expr::Copy(operand) => return Self::operand(operand, fields),
            Expr::Apply { element, args } => (element, args),
        };
        let args = args
            .iter()
            .map(|arg| Self::operand(arg, fields))
            .collect::<Result<Vec<_>>>()?;
        Ok(match element {
            Element::Int | Element::Diff | Element::Sum => format!("-({})", args.join(" + ")),
            Element::Mult => format!("({})", args.join(" * ")),
            Element::Const => args.join(""),
            Element::Funcgen | Element::Unknown(_) => {
                return Err(CompileError::Unsupported {
                    element: element.to_string(),
                    target: "C".to_string(),
                }
                .into())
            }
            _ => format!("dda_{}({})", element.name(), args.join(", ")),
        })
    }

    fn write_derivative(mut f: impl std::io::Write, program: &Program, fields: &Fields) -> Result<()> {
        writeln!(
            f,
            "\nstatic void f(const state_t *state, state_t *dqdt, aux_t *aux) {{"
        )?;
        writeln!(f, "    (void) state;")?;
        writeln!(f, "    memset(dqdt, 0, sizeof *dqdt);")?;
        for block in &program.blocks {
            if block.statements.is_empty() {
                continue;
            }
            writeln!(f, "\n    // {}", block.section)?;
            for statement in &block.statements {
                writeln!(
                    f,
                    "    {} = {};  // {}",
                    Self::slot(statement.target, fields)?,
                    Self::expr(&statement.expr, fields)?,
                    statement.description
                )?;
            }
        }
        writeln!(f, "}}")?;
        Ok(())
    }

    fn write_integrate(mut f: impl std::io::Write) -> Result<()> {
        let stages = RungeKutta::ALL
            .iter()
            .map(|scheme| scheme.order())
            .max()
            .unwrap_or(1);
        write!(
            f,
            r#"
static void integrate(state_t *state, aux_t *aux, int rk_order) {{
    state_t k[{stages}], y;
    (void) y;
    switch (rk_order) {{
"#
        )?;

        for scheme in RungeKutta::ALL {
            let tableau = scheme.tableau();
            writeln!(f, "    case {}: // {}", scheme.order(), scheme)?;
            for (i, row) in tableau.a.iter().enumerate() {
                match combination(row) {
                    Some(sum) => {
                        writeln!(f, "        y = state_add(*state, state_mul_dt({sum}));")?;
                        writeln!(f, "        f(&y, &k[{i}], aux);")?;
                    }
                    None => writeln!(f, "        f(state, &k[{i}], aux);")?,
                }
            }
            if let Some(sum) = combination(&tableau.b) {
                writeln!(f, "        *state = state_add(*state, state_mul_dt({sum}));")?;
            }
            writeln!(f, "        break;")?;
        }

        write!(
            f,
            r#"    default:
        fprintf(stderr, "ERR: rk_order must be between 1 and {stages}\n");
        exit(3);
    }}
}}
"#
        )?;
        Ok(())
    }

    const RUNTIME: &str = r#"
static void compute_aux(const state_t *state, aux_t *aux) {
    state_t unused;
    f(state, &unused, aux);
}

static double *lookup(state_t *state, aux_t *aux, const char *name) {
    double *value = state_by_name(state, name);
    if (!value) value = aux_by_name(aux, name);
    if (!value) value = const_by_name(&constants, name);
    return value;
}

static int is_variable(const char *name) {
    for (size_t i = 0; i < N_VARIABLES; i++)
        if (!strcmp(all_variables[i], name)) return 1;
    return 0;
}

typedef struct {
    const char **query;
    size_t n_query;
    int binary_output;
    int always_compute_aux_before_printing;
} writer_t;

static void write_header(const writer_t *writer) {
    if (writer->binary_output) return;
    for (size_t i = 0; i < writer->n_query; i++)
        printf("%s%s", writer->query[i], i + 1 < writer->n_query ? "\t" : "\n");
}

static void write_row(const writer_t *writer, const state_t *state, const aux_t *aux) {
    state_t s = *state;
    aux_t a = *aux;
    if (writer->always_compute_aux_before_printing) compute_aux(&s, &a);
    for (size_t i = 0; i < writer->n_query; i++) {
        double *value = lookup(&s, &a, writer->query[i]);
        if (!value) {
            fprintf(stderr, "ERR: lookup failed for %s\n", writer->query[i]);
            exit(3);
        }
        if (writer->binary_output)
            fwrite(value, sizeof(double), 1, stdout);
        else
            printf("%.*g%s", OUTPUT_PRECISION, *value, i + 1 < writer->n_query ? "\t" : "\n");
    }
}

static void simulate(const writer_t *writer, long max_iterations, long modulo_write,
                     int rk_order, int write_initial_conditions) {
    state_t state = initial;
    aux_t aux;
    memset(&aux, 0, sizeof aux);

    write_header(writer);
    if (write_initial_conditions) {
        aux_set_nan(&aux);
        write_row(writer, &state, &aux);
    }
    for (long iter = 0; iter < max_iterations; iter++) {
        integrate(&state, &aux, rk_order);
        if (iter % modulo_write == 0) write_row(writer, &state, &aux);
    }
    fflush(stdout);
}

static int has_prefix(const char *s, const char *prefix) {
    return !strncmp(s, prefix, strlen(prefix));
}

static double parse_number(const char *arg, const char *value) {
    char *end;
    double x = strtod(value, &end);
    if (end == value || *end) {
        fprintf(stderr, "ERR: not a number in %s\n", arg);
        exit(4);
    }
    return x;
}

static int parse_flag(const char *arg, const char *value) {
    if (!strcmp(value, "1") || !strcmp(value, "true")) return 1;
    if (!strcmp(value, "0") || !strcmp(value, "false")) return 0;
    fprintf(stderr, "ERR: not a boolean in %s\n", arg);
    exit(4);
}

/* Copies the key of "--key=value" into key and returns the value, "1" if absent. */
static const char *split_arg(const char *arg, char *key, size_t size) {
    const char *body = arg + 2;
    const char *eq = strchr(body, '=');
    size_t len = eq ? (size_t) (eq - body) : strlen(body);
    if (len >= size) {
        fprintf(stderr, "ERR: argument too long: %s\n", arg);
        exit(3);
    }
    memcpy(key, body, len);
    key[len] = '\0';
    return eq ? eq + 1 : "1";
}

static void print_names(FILE *out, const char *title, const char **names, size_t n) {
    fprintf(out, "%s:\n", title);
    for (size_t i = 0; i < n; i++) fprintf(out, "  %s\n", names[i]);
}

static void usage(const char *program) {
    fprintf(stderr, "Usage: %s [arguments] [variables to print]\n", program);
    fprintf(stderr, "Integrates a DDA circuit in time, writing one row per step.\n\n");
    fprintf(stderr, "Boolean arguments (--foo, --foo=1 or --foo=0):\n");
    fprintf(stderr, "  --write_initial_conditions (default: 0)\n");
    fprintf(stderr, "  --always_compute_aux_before_printing (default: 1)\n");
    fprintf(stderr, "  --binary_output (default: 0)\n");
    fprintf(stderr, "  --list_all_variables (default: 0)\n");
    fprintf(stderr, "Numeric arguments (--foo=123):\n");
    fprintf(stderr, "  --max_iterations (default: 100)\n");
    fprintf(stderr, "  --modulo_write (default: 1)\n");
    fprintf(stderr, "  --rk_order (default: 1)\n");
    fprintf(stderr, "Overrides: --ic:NAME=VALUE --dt:NAME=VALUE --const:NAME=VALUE\n\n");
    print_names(stderr, "Variables (all are printed if none is given)", all_variables, N_VARIABLES);
}

int main(int argc, char **argv) {
    long max_iterations = 100, modulo_write = 1, rk_order = 1;
    int write_initial_conditions = 0, list_all_variables = 0;
    writer_t writer = { NULL, 0, 0, 1 };
    char key[256];
    size_t n_query = 0;
    const char **query = malloc(sizeof(char *) * (size_t) argc);
    if (!query) return 1;

    init_constants();
    for (int i = 1; i < argc; i++) {
        const char *arg = argv[i];
        if (!strcmp(arg, "--help")) {
            usage(argv[0]);
            return 1;
        }
        if (!has_prefix(arg, "--")) {
            if (!is_variable(arg)) {
                fprintf(stderr, "ERR: %s is not a variable. Try --help\n", arg);
                return 2;
            }
            query[n_query++] = arg;
            continue;
        }

        const char *value = split_arg(arg, key, sizeof key);
        if (has_prefix(key, "ic:") || has_prefix(key, "dt:")) continue;
        if (has_prefix(key, "const:")) {
            double *c = const_by_name(&constants, key + 6);
            if (!c) {
                fprintf(stderr, "ERR: %s is not a constant\n", key + 6);
                return 2;
            }
            *c = parse_number(arg, value);
        }
        else if (!strcmp(key, "max_iterations")) max_iterations = (long) parse_number(arg, value);
        else if (!strcmp(key, "modulo_write")) modulo_write = (long) parse_number(arg, value);
        else if (!strcmp(key, "rk_order")) rk_order = (long) parse_number(arg, value);
        else if (!strcmp(key, "binary_output")) writer.binary_output = parse_flag(arg, value);
        else if (!strcmp(key, "write_initial_conditions")) write_initial_conditions = parse_flag(arg, value);
        else if (!strcmp(key, "always_compute_aux_before_printing"))
            writer.always_compute_aux_before_printing = parse_flag(arg, value);
        else if (!strcmp(key, "list_all_variables")) list_all_variables = parse_flag(arg, value);
        else {
            fprintf(stderr, "ERR: illegal argument %s. Try --help\n", arg);
            return 3;
        }
    }

    init_parameters();
    for (int i = 1; i < argc; i++) {
        if (!has_prefix(argv[i], "--ic:") && !has_prefix(argv[i], "--dt:")) continue;
        const char *value = split_arg(argv[i], key, sizeof key);
        double *p = state_by_name(has_prefix(key, "ic:") ? &initial : &dt, key + 3);
        if (!p) {
            fprintf(stderr, "ERR: %s is not an evolved variable\n", key + 3);
            return 2;
        }
        *p = parse_number(argv[i], value);
    }

    if (list_all_variables) {
        print_names(stdout, "state", state_names, N_STATE);
        print_names(stdout, "aux", aux_names, N_AUX);
        print_names(stdout, "constants", const_names, N_CONST);
        free(query);
        return 0;
    }
    if (modulo_write < 1) {
        fprintf(stderr, "ERR: modulo_write must be positive\n");
        return 3;
    }

    writer.query = n_query ? query : all_variables;
    writer.n_query = n_query ? n_query : N_VARIABLES;
    simulate(&writer, max_iterations, modulo_write, (int) rk_order, write_initial_conditions);

    free(query);
    return 0;
}
"#;

    fn write_runtime(mut f: impl std::io::Write) -> Result<()> {
        f.write_all(C::RUNTIME.as_bytes())?;
        Ok(())
    }
}
