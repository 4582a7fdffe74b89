use std::process::ExitCode;

fn main() -> ExitCode {
    imgpipe::app::run(std::env::args_os())
}
