//! Entry point for the address lookup server.
#![forbid(unsafe_code)]

use address_cli::CliError;

#[expect(
    clippy::print_stderr,
    reason = "the process boundary reports fatal errors on stderr"
)]
fn main() {
    match address_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("address-server: {err}");
            std::process::exit(1);
        }
    }
}
