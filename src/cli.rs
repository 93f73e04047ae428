//! Command-line surface shared by the controller binaries.

use std::ffi::OsString;
use std::io::{self, Write};

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};

use crate::backend::Identity;
use crate::clock::Clock;
use crate::lifecycle::{LifecycleScanner, ObjectPolicy, ScanStats};
use crate::Error;

pub const EXIT_USAGE: u8 = 1;
pub const EXIT_CONNECT: u8 = 2;
pub const EXIT_FAILURE: u8 = 3;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(disable_help_flag = true)]
pub struct ControllerArgs {
    /// Storage URI
    #[arg(short = 's', value_name = "URI")]
    pub storage: String,

    /// This help message
    #[arg(short = 'h', action = ArgAction::Help)]
    help: Option<bool>,
}

/// What `main` should do after parsing the command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(ControllerArgs),
    Exit(u8),
}

/// Parses controller arguments. Usage goes to stderr for both `-h` and
/// malformed command lines.
pub fn parse_args<I, T>(name: &'static str, about: &'static str, args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut command = ControllerArgs::command().name(name).about(about);
    let parsed = command
        .try_get_matches_from_mut(args)
        .and_then(|matches| ControllerArgs::from_arg_matches(&matches));

    match parsed {
        Ok(args) => Invocation::Run(args),
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            eprint!("{}", command.render_help());
            Invocation::Exit(0)
        }
        Err(err) => {
            if let Some(reason) = err.kind().as_str() {
                eprintln!("error: {reason}");
            }
            eprint!("{}", command.render_help());
            Invocation::Exit(EXIT_USAGE)
        }
    }
}

/// Runs one scan of `policy` against the backend named in `args` and
/// returns the process exit status.
///
/// Diagnostic records go to stdout.
pub fn run_controller<P: ObjectPolicy>(
    args: &ControllerArgs,
    policy: P,
    clock: &dyn Clock,
) -> u8 {
    let mut scanner = LifecycleScanner::new(policy, Identity::default());
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    match scan(&mut scanner, &args.storage, clock, &mut out) {
        Ok(stats) => {
            if stats.has_errors() {
                log::warn!(
                    "{} items skipped; they are retried on the next run",
                    stats.error_count()
                );
            }
            0
        }
        Err(err) => {
            eprintln!("[ERROR] : {err:#}");
            if err.downcast_ref::<Error>().map_or(false, Error::is_fatal) {
                EXIT_CONNECT
            } else {
                EXIT_FAILURE
            }
        }
    }
}

fn scan<P: ObjectPolicy>(
    scanner: &mut LifecycleScanner<P>,
    uri: &str,
    clock: &dyn Clock,
    out: &mut dyn Write,
) -> anyhow::Result<ScanStats> {
    let stats = scanner
        .run(uri, clock, out)
        .with_context(|| format!("failed to open storage backend {uri}"))?;
    out.flush().context("failed to flush diagnostic records")?;
    Ok(stats)
}
