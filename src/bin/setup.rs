//! Bootstrap binary — provision binary assets, then launch the UI process.
//!
//! Exit behaviour: non-zero when the OS is unsupported or a required asset
//! cannot be downloaded; the optional player asset only warns.

use piano_to_midi::config::AppPaths;
use piano_to_midi::setup;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let paths = AppPaths::new();

    if let Err(e) = setup::run_setup(&paths) {
        log::error!("setup failed: {e}");
        std::process::exit(1);
    }

    log::info!("setup complete — launching piano-to-midi");
    match setup::launch_app() {
        Ok(status) if status.success() => {}
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(e) => {
            log::error!("failed to launch the application: {e}");
            std::process::exit(1);
        }
    }
}
