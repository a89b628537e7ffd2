use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    match cv_curves::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("exiting with {err:?}");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
