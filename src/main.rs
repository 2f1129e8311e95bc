//! Binary entry point for `bb`.

use bundlework::cli;
use bundlework::ui::output;

fn main() {
    if let Err(err) = cli::run() {
        output::error(format!("{err:#}"));
        std::process::exit(cli::exit_code_for(&err) as i32);
    }
}
