//! `md2pdf` binary entry point. All logic lives in [`md2pdf::app`].

use std::process::ExitCode;

fn main() -> ExitCode {
    md2pdf::run_cli()
}
