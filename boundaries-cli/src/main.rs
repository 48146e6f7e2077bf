//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = boundaries_cli::run() {
        eprintln!("boundaries: {err}");
        std::process::exit(1);
    }
}
