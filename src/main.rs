//! fredtest - replay test harness for the FReD reverse debugger
//!
//! Runs record/replay and reverse-navigation scenarios against FReD on top of
//! DMTCP and prints one result row per scenario iteration.

use clap::Parser;
use fredtest::{cli, commands::Cli, common::logging};

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let log = logging::init(args.show_child_output);

    let code = match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Some(path) = &log.log_file {
                eprintln!("Log file: {}", path.display());
            }
            1
        }
    };

    // Flush the file log before exiting.
    drop(log);
    std::process::exit(code);
}
