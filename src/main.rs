// Entrypoint for the CLI application.
// - Keeps `main` small: parse the arguments and hand them to the command
//   dispatcher.
// - Fatal errors (transport, protocol, validation) are printed with an
//   `error:` prefix and exit 1; service-level failures are formatted by
//   the handlers themselves.

use rentry_cli::cli;

fn main() {
    let cli = cli::parse();
    if let Err(e) = cli::run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
