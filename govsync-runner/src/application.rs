use anyhow::{Context, Result};
use std::process::exit;

/// Create the single-threaded tokio runtime used by the CLI.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")
}

/// Handle a Result, printing the error and exiting with code 1 on failure.
pub fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("govsync-runner error: {}, {:#}", e.root_cause(), e);
            exit(1);
        }
    }
}

/// Print a JSON value to stdout, pretty-printed.
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
