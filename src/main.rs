use clap::Parser;
use dirsort::cli::{Cli, run};
use dirsort::logging::init_logging;
use dirsort::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli) {
        OutputFormatter::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}
