//! Invoke a module function from the command line.
//!
//! Usage: `curlew <module> <function> [args...]`
//!
//! Arguments parse as integer, float, boolean, then string. Module
//! manifests are looked up on the directories in `CURLEW_PATH`
//! (colon-separated) followed by `./modules`. `CURLEW_LOG` selects the log
//! level (`trace`, `debug`, `info`, `warn`, `error`).

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::Level;

use curlew::{Scalar, Session, SessionOptions};

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        let program = args.first().map(String::as_str).unwrap_or("curlew");
        eprintln!("usage: {program} <module> <function> [args...]");
        return ExitCode::from(1);
    }

    let options = SessionOptions {
        search_path: search_path(),
        program_name: args.first().cloned(),
        ..Default::default()
    };
    let session = match Session::initialize(options) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let mut call = session.call(&args[1], &args[2]);
    for raw in &args[3..] {
        call = call.arg(Scalar::parse(raw));
    }

    let status = match call.invoke() {
        Ok(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    };

    // A failed invocation leaves the session reusable; it still must
    // finalize cleanly.
    if let Err(err) = session.finalize() {
        eprintln!("error: {err}");
        return ExitCode::from(120);
    }
    status
}

fn search_path() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = env::var("CURLEW_PATH")
        .map(|raw| raw.split(':').filter(|p| !p.is_empty()).map(PathBuf::from).collect())
        .unwrap_or_default();
    paths.push(PathBuf::from("./modules"));
    paths
}

fn init_logging() {
    let level = match env::var("CURLEW_LOG").ok().as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("error") => Level::ERROR,
        _ => Level::WARN,
    };
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .init();
}
