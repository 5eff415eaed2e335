use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = samanvay_cli::Cli::parse();
    match samanvay_cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::from(error.exit_code())
        }
    }
}
