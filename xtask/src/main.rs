use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the cats API workspace",
    long_about = "A unified CLI for running the test suites and CI checks\n\
                  of the cats API handler and its invocation harness."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests for one crate, or the whole workspace
    Test {
        /// Crate to test
        #[arg(value_enum)]
        package: Option<Package>,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::All)]
        job: CiJob,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Package {
    /// Operation contract, dispatcher, in-memory backend
    Core,
    /// Mock invocation harness
    Harness,
    /// DynamoDB adapter and Lambda handler
    Lambda,
}

impl Package {
    fn crate_name(self) -> &'static str {
        match self {
            Self::Core => "cats_api_core",
            Self::Harness => "lambda_mock",
            Self::Lambda => "cats_api_lambda",
        }
    }
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Workspace tests
    Test,
    /// Run lint + test
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(error) => {
            eprintln!("failed to execute cargo: {error}");
            exit(1);
        }
    }
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_tests(package: Option<Package>) {
    match package {
        Some(package) => {
            step(&format!("Test {}", package.crate_name()));
            run_cargo(&["test", "-p", package.crate_name()]);
        }
        None => {
            step("Test workspace");
            run_cargo(&["test", "--workspace"]);
        }
    }
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--workspace",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Test { package } => run_tests(package),
        Commands::Ci { job } => {
            match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => run_tests(None),
                CiJob::All => {
                    ci_lint();
                    run_tests(None);
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
