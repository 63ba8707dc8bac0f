//! # portal
//!
//! Command-line client for the local document portal store.
//!
//! The binary is a thin shell: argument parsing, logging setup and terminal
//! output live in [`cli`], every operation is delegated to `portalapp`.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
