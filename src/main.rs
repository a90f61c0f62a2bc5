use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gauntlet::cli::commands::{self, RunOptions};
use gauntlet::suite;

#[derive(Parser)]
#[command(
    name = "gauntlet",
    about = "Dependency-ordered integration-test harness",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the registered suite
    Run {
        /// Run only these groups (plus their prerequisites); repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,

        /// Known-bug table (YAML)
        #[arg(long)]
        known_bugs: Option<PathBuf>,

        /// Test-identity pool (YAML)
        #[arg(long)]
        users: Option<PathBuf>,

        /// Abort the run after this many seconds; always-run teardown
        /// still executes
        #[arg(long)]
        budget: Option<u64>,

        /// Stop scheduling new tests after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Write a run report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Report format: yaml or json
        #[arg(long, default_value = "yaml")]
        format: String,
    },

    /// Print the execution order without running anything
    Plan {
        /// Plan only these groups (plus their prerequisites); repeatable
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },

    /// Check registration and configuration without executing
    Validate {
        #[arg(short, long = "group")]
        groups: Vec<String>,

        #[arg(long)]
        known_bugs: Option<PathBuf>,

        #[arg(long)]
        users: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let registry = suite::smoke_registry();

    match cli.command {
        Some(Commands::Run {
            groups,
            known_bugs,
            users,
            budget,
            fail_fast,
            report,
            format,
        }) => {
            let options = RunOptions {
                groups,
                known_bugs,
                users,
                budget_secs: budget,
                fail_fast,
                report,
                format,
            };
            match commands::run_suite(&registry, &options) {
                Ok(output) => {
                    println!("{}", output.text);
                    std::process::exit(output.exit_code);
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Plan { groups }) => match commands::run_plan(&registry, &groups) {
            Ok(plan) => print!("{plan}"),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        Some(Commands::Validate {
            groups,
            known_bugs,
            users,
        }) => {
            match commands::run_validate(&registry, &groups, known_bugs.as_ref(), users.as_ref()) {
                Ok(result) => println!("{result}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            // No subcommand — clap will show help via the derive
            Cli::parse_from(["gauntlet", "--help"]);
        }
    }
}
