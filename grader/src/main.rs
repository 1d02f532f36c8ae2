//! `grade`: verify and score a student submission against a grading plan.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use grader::cli::{self, ReportFormat, RunOptions};
use grader::config::ConfigOverrides;
use grader::{exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "grade",
    version,
    about = "Verify and score an assignment submission"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a grading plan against a submission directory.
    Run {
        /// Grading plan (TOML).
        #[arg(long)]
        plan: PathBuf,
        /// Submission directory.
        #[arg(long, default_value = ".")]
        submission: PathBuf,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Override the plan's build command timeout, in seconds.
        #[arg(long)]
        command_timeout: Option<u64>,
        /// Override the plan's test binary timeout, in seconds.
        #[arg(long)]
        test_timeout: Option<u64>,
    },
    /// Print SHA-256 digests for pinning files in a plan.
    Hash {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Validate a grading plan.
    CheckPlan { plan: PathBuf },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            plan,
            submission,
            format,
            output,
            command_timeout,
            test_timeout,
        } => cli::grade(&RunOptions {
            plan,
            submission,
            format,
            output,
            overrides: ConfigOverrides {
                command_timeout_secs: command_timeout,
                test_timeout_secs: test_timeout,
            },
        }),
        Command::Hash { files } => {
            cli::hash_files(&files)?;
            Ok(exit_codes::OK)
        }
        Command::CheckPlan { plan } => {
            cli::check_plan(&plan)?;
            Ok(exit_codes::OK)
        }
    }
}
