//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Uses a fixed `Info` filter so the process never reads its environment.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_twice_and_log_through_reexports() {
        super::init();
        super::init();
        super::info!("logging initialized");
        assert!(log::log_enabled!(log::Level::Info));
    }
}
