use std::io::{IsTerminal, Read, Write};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colorized::{Color, Colors};
use ddac::{
    error::Warning,
    options::{Options, RunOptions},
    runtime::{
        target::{Listing, C},
        vm::Simulator,
    },
    Context,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Put every equation into `name = element(variables...)` form
    #[clap(long, global = true)]
    strict_naming: bool,

    /// Fail on feedback loops between auxiliary variables
    #[clap(long, global = true)]
    deny_cyclic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetKind {
    /// Standalone C99 program
    C,
    /// Pseudo-code listing
    Listing,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a circuit into a simulation program
    Compile {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Output file, or pass "-" to write to stdout
        #[clap(short, long, value_parser, default_value = "-")]
        output: clio::Output,

        /// Kind of program to emit
        #[clap(short, long, value_enum, default_value_t = TargetKind::C)]
        target: TargetKind,

        /// Significant digits printed by the generated program
        #[clap(long)]
        precision: Option<usize>,
    },

    /// Print the circuit with one computing element per equation
    Linearize {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Name every intermediate, including the outermost element
        #[clap(long)]
        strict: bool,
    },

    /// Print the variables by role, in evaluation order
    Classify {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,
    },

    /// Print the dependency graph in Graphviz dot format
    Graph {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Output file, or pass "-" to write to stdout
        #[clap(short, long, value_parser, default_value = "-")]
        output: clio::Output,
    },

    /// Simulate the circuit in process
    ///
    /// Takes the arguments of generated programs after `--`, for example
    /// `ddac run -f circuit.dda -- --max_iterations=1000 --rk_order=4 y`.
    Run {
        /// Source file, or pass "-" to read from stdin
        #[clap(short, long, value_parser)]
        file: clio::Input,

        /// Simulation arguments and variables to print
        #[clap(last = true)]
        args: Vec<String>,
    },
}

fn read(mut file: clio::Input) -> Result<(String, String)> {
    let mut source = String::new();
    file.read_to_string(&mut source)?;
    Ok((file.path().to_string_lossy().into_owned(), source))
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{}: {}", "warning".color(Colors::YellowFg), warning);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Cli::parse();
    let options = Options::default()
        .strict_naming(args.strict_naming)
        .deny_cyclic(args.deny_cyclic);
    let load = |file: clio::Input, options: Options| -> Result<Context> {
        let (filename, source) = read(file)?;
        Context::new()
            .set_color(std::io::stderr().is_terminal())
            .set_options(options)
            .add_file(&filename, &source)
    };

    match args.command {
        Command::Compile {
            file,
            output,
            target,
            precision,
        } => {
            let context = load(file, options.number_precision(precision))?;
            let compilation = context.compile()?;
            print_warnings(&compilation.warnings);
            let program = &compilation.program;
            match target {
                TargetKind::C => program.write::<C>(output, context.options())?,
                TargetKind::Listing => program.write::<Listing>(output, context.options())?,
            }
        }
        Command::Linearize { file, strict } => {
            let strict = strict || options.strict_naming;
            let context = load(file, options)?;
            let linearized = context.equations().linearize(strict)?;
            print!("{linearized}");
        }
        Command::Classify { file } => {
            let classification = load(file, options)?.classify()?;
            print_warnings(&classification.warnings());
            print!("{classification}");
        }
        Command::Graph { file, mut output } => {
            let context = load(file, options)?;
            write!(output, "{}", context.equations().to_dot())?;
        }
        Command::Run { file, args } => {
            let run = RunOptions::from_args(&args).map_err(anyhow::Error::msg)?;
            let context = load(file, options)?;
            let compilation = context.compile()?;
            print_warnings(&compilation.warnings);

            if run.list_all_variables {
                let program = &compilation.program;
                for (title, record) in [
                    ("state", &program.state),
                    ("aux", &program.aux),
                    ("constants", &program.constants),
                ] {
                    println!("{title}:");
                    for name in record.fields() {
                        println!("  {name}");
                    }
                }
                return Ok(());
            }

            let mut simulator = Simulator::with_overrides(compilation.program, &run)?;
            simulator.run(&run, std::io::stdout().lock())?;
        }
    }

    Ok(())
}
