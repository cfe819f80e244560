//! mayadap — debug adapter relaying a DAP client to debugpy inside Maya.

use std::env;
use std::path::PathBuf;

mod adapter;

fn main() {
    let config_path = env::args().nth(1).map(PathBuf::from);

    if let Err(e) = adapter::run_adapter(config_path) {
        eprintln!("mayadap: {:#}", e);
        std::process::exit(1);
    }
}
