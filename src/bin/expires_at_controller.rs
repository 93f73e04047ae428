use std::process::ExitCode;

use env_logger::Env;

use object_lifecycle::cli::{self, Invocation};
use object_lifecycle::clock::SystemClock;
use object_lifecycle::ExpiresAt;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let args = match cli::parse_args(
        "expires-at-controller",
        "Delete every object whose ExpiresAt time has come",
        std::env::args_os(),
    ) {
        Invocation::Run(args) => args,
        Invocation::Exit(code) => return ExitCode::from(code),
    };

    ExitCode::from(cli::run_controller(&args, ExpiresAt::new(), &SystemClock))
}
