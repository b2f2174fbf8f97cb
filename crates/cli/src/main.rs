use std::process::ExitCode;

fn main() -> ExitCode {
    echolab_cli::run()
}
