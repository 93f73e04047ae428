use std::process::ExitCode;

use env_logger::Env;

use object_lifecycle::cli::{self, Invocation};
use object_lifecycle::clock::SystemClock;
use object_lifecycle::lifecycle::ReadOnlySense;
use object_lifecycle::ReadOnlyAfter;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = match cli::parse_args(
        "read-only-after-controller",
        "Make objects read-only based on ReadOnlyAfter and their last modification",
        std::env::args_os(),
    ) {
        Invocation::Run(args) => args,
        Invocation::Exit(code) => return ExitCode::from(code),
    };

    let policy = ReadOnlyAfter::new();
    if policy.sense() == ReadOnlySense::AsRecorded {
        log::warn!(
            "read-only rule fires while last_modification + ReadOnlyAfter >= now, \
             i.e. before the deadline passes"
        );
    }

    ExitCode::from(cli::run_controller(&args, policy, &SystemClock))
}
