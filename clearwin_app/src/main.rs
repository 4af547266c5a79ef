//! Clearwin
//!
//! Opens an 800x600 window centered on the primary monitor and clears it to
//! blue every frame until the window is closed.

use std::process::ExitCode;

use clearwin_engine::foundation::logging;
use clearwin_engine::prelude::*;

fn main() -> ExitCode {
    logging::init();
    logging::info!("Starting Clearwin");

    let config = AppConfig::default();
    let mut platform = GlfwPlatform::new();

    match run(&mut platform, &config) {
        Ok(report) => {
            logging::info!("Clearwin finished after {} frames", report.frames);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
