//! run-z command-line front-end.
//!
//! The argv is interpreted with the same positional grammar as a task line:
//! leading package selectors become the entry's targets, task names become
//! prerequisites, and the option tail goes through the option engine with
//! the top-level option set. Unlike task lines, unknown top-level options
//! are rejected.

use std::process::ExitCode;
use std::sync::Arc;

use runz_kernel::builder::TaskSpecBuilder;
use runz_kernel::options::{OptionParser, OptionReaders};
use runz_kernel::shell::LocalShell;
use runz_kernel::{CallParams, FsDiscovery, Location, Runner, Task};
use runz_types::{Action, Prerequisite, RunError, RunResult, TaskSpec};

/// Exit code for invalid command lines and unknown tasks.
const EXIT_USAGE: u8 = 2;

/// State the top-level option readers mutate.
struct CliState {
    builder: TaskSpecBuilder,
    help: bool,
    version: bool,
}

/// Run the CLI against the given argv tail (everything after the program
/// name) from the given working directory.
pub async fn run(argv: Vec<String>, cwd: &str) -> ExitCode {
    match try_run(argv, cwd).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("run-z: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn try_run(argv: Vec<String>, cwd: &str) -> RunResult<ExitCode> {
    let mut state = CliState {
        builder: TaskSpecBuilder::new(),
        help: false,
        version: false,
    };
    state.builder.parse_tokens(argv)?;
    let tail = state.builder.take_args();
    cli_options().parse(&mut state, &tail)?;

    if state.help {
        print!("{}", usage());
        return Ok(ExitCode::SUCCESS);
    }
    if state.version {
        println!("run-z {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let mut spec = state.builder.spec();
    if matches!(spec.action, Action::Group { .. }) {
        let targets = split_leading_selectors(&mut spec);
        if let Action::Group { targets: spec_targets } = &mut spec.action {
            *spec_targets = targets;
        }
    }

    let runner = Runner::new(Arc::new(FsDiscovery), Arc::new(LocalShell::new()));
    let here = Location::new(cwd);
    let package = runner.package_at(&here).await?;

    if spec.pre.is_empty() && spec.action.is_default() {
        eprint!("{}", usage());
        if let Some(pkg) = &package {
            let label = pkg.name().unwrap_or_else(|| pkg.location().path());
            eprintln!("\nTasks in {label}:");
            for task in pkg.tasks() {
                eprintln!("  {}", task.name());
            }
        }
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    let Some(package) = package else {
        return Err(RunError::UnknownTask {
            target: here.path().to_string(),
            task_name: String::new(),
            message: "no package manifest in the current directory".to_string(),
        });
    };

    let entry = Task::for_package(&package, "run-z", spec);
    runner.run(entry, CallParams::new()).await?;
    Ok(ExitCode::SUCCESS)
}

/// Detach the leading package selectors: they become batching targets
/// rather than in-plan retargeting.
fn split_leading_selectors(spec: &mut TaskSpec) -> Vec<String> {
    let mut targets = Vec::new();
    while let Some(Prerequisite::Selector { host }) = spec.pre.first() {
        targets.push(host.clone());
        spec.pre.remove(0);
    }
    targets
}

/// The top-level option set. `--then`/`--and` mirror the task option set;
/// help and version short-circuit execution. There is no fallback: an
/// unrecognized option is a usage error.
fn cli_options() -> OptionParser<CliState> {
    let mut readers = OptionReaders::new();
    readers
        .read("--help", |state: &mut CliState, ctx| {
            ctx.accept();
            state.help = true;
            Ok(())
        })
        .read("-h", |state: &mut CliState, ctx| {
            ctx.accept();
            state.help = true;
            Ok(())
        })
        .read("--version", |state: &mut CliState, ctx| {
            ctx.accept();
            state.version = true;
            Ok(())
        })
        .read("-V", |state: &mut CliState, ctx| {
            ctx.accept();
            state.version = true;
            Ok(())
        })
        .read("--then", |state: &mut CliState, ctx| {
            let rest = ctx.rest();
            if let Some((command, args)) = rest.split_first() {
                state.builder.action(Action::Command {
                    command: command.clone(),
                    args: args.to_vec(),
                    parallel: false,
                });
            }
            Ok(())
        })
        .read("--and", |state: &mut CliState, ctx| {
            let rest = ctx.rest();
            if let Some((command, args)) = rest.split_first() {
                state.builder.action(Action::Command {
                    command: command.clone(),
                    args: args.to_vec(),
                    parallel: true,
                });
            }
            Ok(())
        });
    OptionParser::new(readers)
}

fn usage() -> String {
    "\
run-z — multi-package task runner

Usage:
  run-z [PACKAGES...] TASK [/ARG|//ARG//|,TASK|...]... [--OPT...]

Options:
  --then CMD ARGS...   Execute a command after the prerequisites
  --and CMD ARGS...    Execute a command in parallel with them
  -h, --help           Show this help
  -V, --version        Show the version

Exit codes: 0 success, 1 task failure, 2 invalid command line or
unknown task.
"
    .to_string()
}
