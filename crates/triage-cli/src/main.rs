#![forbid(unsafe_code)]

fn main() {
    std::process::exit(triage_cli::run());
}
