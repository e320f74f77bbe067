//! augusta entry point.

fn main() {
    std::process::exit(augusta::cli::run_cli());
}
