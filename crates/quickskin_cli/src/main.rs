//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `quickskin_core` linkage and storage wiring from a terminal.
//! - List the workspaces stored under a data directory.
//!
//! Usage: `quickskin_cli [DATA_DIR]` (defaults to `./Data`).

use quickskin_core::{core_version, init_from_config, CoreConfig, CoreContext};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;

fn main() -> ExitCode {
    println!("quickskin_core version={}", core_version());

    let data_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Data"));
    let data_dir = match std::path::absolute(&data_dir) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("cannot resolve data dir `{}`: {err}", data_dir.display());
            return ExitCode::FAILURE;
        }
    };
    let config = CoreConfig::with_data_dir(data_dir);

    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("cannot start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let context = match CoreContext::open(config, runtime.handle().clone()) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("cannot open registry: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "registry={} workspaces={}",
        context.paths().registry_db().display(),
        context.registry().list().len()
    );
    for workspace in context.registry().list() {
        println!(
            "{}\t{}\t{:?}\t{}",
            workspace.id,
            workspace.name,
            workspace.working_mode,
            workspace.output_path.display()
        );
    }
    ExitCode::SUCCESS
}
