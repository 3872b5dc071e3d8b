use std::process::ExitCode;

fn main() -> ExitCode {
    match fitcoach_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
