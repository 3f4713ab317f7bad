#![forbid(unsafe_code)]
pub fn main() {
    std::process::exit(energy_cli::run_cli());
}
